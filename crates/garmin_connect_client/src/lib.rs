//! `GarminClient` trait and a thin reqwest-based Garmin Connect client.
//!
//! The trait is the seam between the sensor hub and whatever owns the Garmin
//! Connect session. Read methods return the upstream JSON untouched; the hub
//! decides what to keep.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod config;
pub mod http_client;
pub mod utils;

#[derive(Debug, Error)]
pub enum GarminError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("too many requests: {0}")]
    TooManyRequests(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("decoding {what}: {message}")]
    Decode { what: String, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration error: {0}")]
    Config(String),
}

impl GarminError {
    /// Map a non-success HTTP status and a body snippet to an error.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => GarminError::Auth(body),
            404 => GarminError::NotFound(body),
            422 => GarminError::InvalidInput(body),
            429 => GarminError::TooManyRequests(body),
            _ => GarminError::Status { status, body },
        }
    }

    pub fn is_auth(&self) -> bool {
        match self {
            GarminError::Auth(_) => true,
            GarminError::Http(e) => e
                .status()
                .is_some_and(|s| s.as_u16() == 401 || s.as_u16() == 403),
            _ => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        match self {
            GarminError::TooManyRequests(_) => true,
            GarminError::Http(e) => e.status().is_some_and(|s| s.as_u16() == 429),
            _ => false,
        }
    }
}

/// A weigh-in with optional body composition fields. Masses are kilograms.
/// The timestamp carries its offset so both local and GMT times can be sent.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BodyComposition {
    pub timestamp: DateTime<FixedOffset>,
    pub weight: f64,
    pub percent_fat: Option<f64>,
    pub percent_hydration: Option<f64>,
    pub visceral_fat_mass: Option<f64>,
    pub bone_mass: Option<f64>,
    pub muscle_mass: Option<f64>,
    pub basal_met: Option<f64>,
    pub active_met: Option<f64>,
    pub physique_rating: Option<f64>,
    pub metabolic_age: Option<f64>,
    pub visceral_fat_rating: Option<f64>,
    pub bmi: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BloodPressure {
    pub timestamp: DateTime<FixedOffset>,
    pub systolic: u16,
    pub diastolic: u16,
    pub pulse: u16,
    pub notes: Option<String>,
}

/// A manually entered activity.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManualActivity {
    pub activity_name: String,
    pub type_key: String,
    /// Local start time, `YYYY-MM-DDTHH:MM:SS.000`.
    pub start_time_local: String,
    pub time_zone: String,
    pub duration_min: u32,
    pub distance_km: f64,
}

#[async_trait]
pub trait GarminClient: Send + Sync + 'static {
    /// Establish (or re-validate) the session. `mfa_code` is only consulted
    /// when the session owner asks for a second factor.
    async fn login(&self, mfa_code: Option<&str>) -> Result<(), GarminError>;

    // === Daily summary & steps ===

    async fn get_user_summary(&self, date: &str) -> Result<serde_json::Value, GarminError>;
    async fn get_daily_steps(
        &self,
        start: &str,
        end: &str,
    ) -> Result<serde_json::Value, GarminError>;

    // === Body ===

    async fn get_body_composition(&self, date: &str) -> Result<serde_json::Value, GarminError>;
    async fn get_hydration_data(&self, date: &str) -> Result<serde_json::Value, GarminError>;
    async fn get_blood_pressure(
        &self,
        start: &str,
        end: &str,
    ) -> Result<serde_json::Value, GarminError>;
    async fn get_fitnessage_data(&self, date: &str) -> Result<serde_json::Value, GarminError>;

    // === Activities & training ===

    async fn get_activities_by_date(
        &self,
        start: &str,
        end: &str,
    ) -> Result<serde_json::Value, GarminError>;
    async fn get_workouts(&self, start: u32, limit: u32)
    -> Result<serde_json::Value, GarminError>;
    async fn get_activity_types(&self) -> Result<serde_json::Value, GarminError>;
    async fn get_training_readiness(&self, date: &str) -> Result<serde_json::Value, GarminError>;
    async fn get_training_status(&self, date: &str) -> Result<serde_json::Value, GarminError>;
    async fn get_lactate_threshold(&self) -> Result<serde_json::Value, GarminError>;
    async fn get_endurance_score(&self, date: &str) -> Result<serde_json::Value, GarminError>;
    async fn get_hill_score(&self, date: &str) -> Result<serde_json::Value, GarminError>;

    // === Recovery ===

    async fn get_sleep_data(&self, date: &str) -> Result<serde_json::Value, GarminError>;
    async fn get_hrv_data(&self, date: &str) -> Result<serde_json::Value, GarminError>;
    async fn get_menstrual_data_for_date(
        &self,
        date: &str,
    ) -> Result<serde_json::Value, GarminError>;

    // === Device & gamification ===

    async fn get_device_alarms(&self) -> Result<serde_json::Value, GarminError>;
    async fn get_earned_badges(&self) -> Result<serde_json::Value, GarminError>;

    // === Gear ===

    async fn get_gear(&self, user_profile_id: &str) -> Result<serde_json::Value, GarminError>;
    async fn get_gear_stats(&self, gear_uuid: &str) -> Result<serde_json::Value, GarminError>;
    async fn get_gear_defaults(
        &self,
        user_profile_id: &str,
    ) -> Result<serde_json::Value, GarminError>;

    // === Writes ===

    async fn add_body_composition(&self, entry: &BodyComposition) -> Result<(), GarminError>;
    async fn set_blood_pressure(&self, entry: &BloodPressure) -> Result<(), GarminError>;
    /// Mark (or unmark) a gear item as the default for an activity type.
    async fn set_gear_default(
        &self,
        activity_type_id: i64,
        gear_uuid: &str,
        default: bool,
    ) -> Result<(), GarminError>;
    async fn create_manual_activity(
        &self,
        activity: &ManualActivity,
    ) -> Result<serde_json::Value, GarminError>;
    async fn upload_activity(
        &self,
        file_path: &std::path::Path,
    ) -> Result<serde_json::Value, GarminError>;
    async fn add_gear_to_activity(
        &self,
        gear_uuid: &str,
        activity_id: u64,
    ) -> Result<(), GarminError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_status_maps_auth_and_rate_limit() {
        assert!(GarminError::from_status(401, "nope".into()).is_auth());
        assert!(GarminError::from_status(403, "nope".into()).is_auth());
        assert!(GarminError::from_status(429, "slow down".into()).is_rate_limited());
        assert!(matches!(
            GarminError::from_status(404, String::new()),
            GarminError::NotFound(_)
        ));
        assert!(matches!(
            GarminError::from_status(503, String::new()),
            GarminError::Status { status: 503, .. }
        ));
    }

    #[test]
    fn blood_pressure_serializes_camel_case() {
        let bp = BloodPressure {
            timestamp: DateTime::parse_from_rfc3339("2025-03-01T08:30:00+01:00").unwrap(),
            systolic: 120,
            diastolic: 80,
            pulse: 60,
            notes: None,
        };
        let v = serde_json::to_value(&bp).expect("serialize");
        assert_eq!(v["systolic"], 120);
        assert_eq!(v["timestamp"], "2025-03-01T08:30:00+01:00");
        assert!(v.get("notes").is_some());
    }
}
