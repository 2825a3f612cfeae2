//! Logging layer around a `GarminClient`.
//!
//! Every upstream call is timed and logged at debug level; the session and
//! coordinator never see the difference.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use garmin_connect_client::{BloodPressure, BodyComposition, GarminClient, GarminError, ManualActivity};
use serde_json::Value;
use tracing::debug;

#[derive(Clone)]
pub struct LoggingMiddleware<C: GarminClient> {
    inner: Arc<C>,
}

impl<C: GarminClient> LoggingMiddleware<C> {
    pub fn new(client: C) -> Self {
        Self {
            inner: Arc::new(client),
        }
    }

    async fn with_logging<F, Fut, T>(&self, operation: F, name: &str) -> Result<T, GarminError>
    where
        F: FnOnce(Arc<C>) -> Fut,
        Fut: std::future::Future<Output = Result<T, GarminError>>,
    {
        let start = Instant::now();
        debug!(operation = name, "upstream call started");

        let result = operation(self.inner.clone()).await;

        let elapsed = start.elapsed();
        match &result {
            Ok(_) => debug!(operation = name, ?elapsed, "upstream call finished"),
            Err(e) => debug!(operation = name, ?elapsed, error = %e, "upstream call failed"),
        }
        result
    }
}

#[async_trait::async_trait]
impl<C: GarminClient> GarminClient for LoggingMiddleware<C> {
    async fn login(&self, mfa_code: Option<&str>) -> Result<(), GarminError> {
        self.with_logging(|client| async move { client.login(mfa_code).await }, "login")
            .await
    }

    async fn get_user_summary(&self, date: &str) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_user_summary(date).await },
            "get_user_summary",
        )
        .await
    }

    async fn get_daily_steps(&self, start: &str, end: &str) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_daily_steps(start, end).await },
            "get_daily_steps",
        )
        .await
    }

    async fn get_body_composition(&self, date: &str) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_body_composition(date).await },
            "get_body_composition",
        )
        .await
    }

    async fn get_hydration_data(&self, date: &str) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_hydration_data(date).await },
            "get_hydration_data",
        )
        .await
    }

    async fn get_blood_pressure(&self, start: &str, end: &str) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_blood_pressure(start, end).await },
            "get_blood_pressure",
        )
        .await
    }

    async fn get_fitnessage_data(&self, date: &str) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_fitnessage_data(date).await },
            "get_fitnessage_data",
        )
        .await
    }

    async fn get_activities_by_date(&self, start: &str, end: &str) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_activities_by_date(start, end).await },
            "get_activities_by_date",
        )
        .await
    }

    async fn get_workouts(&self, start: u32, limit: u32) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_workouts(start, limit).await },
            "get_workouts",
        )
        .await
    }

    async fn get_activity_types(&self) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_activity_types().await },
            "get_activity_types",
        )
        .await
    }

    async fn get_training_readiness(&self, date: &str) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_training_readiness(date).await },
            "get_training_readiness",
        )
        .await
    }

    async fn get_training_status(&self, date: &str) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_training_status(date).await },
            "get_training_status",
        )
        .await
    }

    async fn get_lactate_threshold(&self) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_lactate_threshold().await },
            "get_lactate_threshold",
        )
        .await
    }

    async fn get_endurance_score(&self, date: &str) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_endurance_score(date).await },
            "get_endurance_score",
        )
        .await
    }

    async fn get_hill_score(&self, date: &str) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_hill_score(date).await },
            "get_hill_score",
        )
        .await
    }

    async fn get_sleep_data(&self, date: &str) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_sleep_data(date).await },
            "get_sleep_data",
        )
        .await
    }

    async fn get_hrv_data(&self, date: &str) -> Result<Value, GarminError> {
        self.with_logging(|client| async move { client.get_hrv_data(date).await }, "get_hrv_data")
            .await
    }

    async fn get_menstrual_data_for_date(&self, date: &str) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_menstrual_data_for_date(date).await },
            "get_menstrual_data_for_date",
        )
        .await
    }

    async fn get_device_alarms(&self) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_device_alarms().await },
            "get_device_alarms",
        )
        .await
    }

    async fn get_earned_badges(&self) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_earned_badges().await },
            "get_earned_badges",
        )
        .await
    }

    async fn get_gear(&self, user_profile_id: &str) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_gear(user_profile_id).await },
            "get_gear",
        )
        .await
    }

    async fn get_gear_stats(&self, gear_uuid: &str) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_gear_stats(gear_uuid).await },
            "get_gear_stats",
        )
        .await
    }

    async fn get_gear_defaults(&self, user_profile_id: &str) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.get_gear_defaults(user_profile_id).await },
            "get_gear_defaults",
        )
        .await
    }

    async fn add_body_composition(&self, entry: &BodyComposition) -> Result<(), GarminError> {
        self.with_logging(
            |client| async move { client.add_body_composition(entry).await },
            "add_body_composition",
        )
        .await
    }

    async fn set_blood_pressure(&self, entry: &BloodPressure) -> Result<(), GarminError> {
        self.with_logging(
            |client| async move { client.set_blood_pressure(entry).await },
            "set_blood_pressure",
        )
        .await
    }

    async fn set_gear_default(
        &self,
        activity_type_id: i64,
        gear_uuid: &str,
        default: bool,
    ) -> Result<(), GarminError> {
        self.with_logging(
            |client| async move { client.set_gear_default(activity_type_id, gear_uuid, default).await },
            "set_gear_default",
        )
        .await
    }

    async fn create_manual_activity(&self, activity: &ManualActivity) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.create_manual_activity(activity).await },
            "create_manual_activity",
        )
        .await
    }

    async fn upload_activity(&self, file_path: &Path) -> Result<Value, GarminError> {
        self.with_logging(
            |client| async move { client.upload_activity(file_path).await },
            "upload_activity",
        )
        .await
    }

    async fn add_gear_to_activity(&self, gear_uuid: &str, activity_id: u64) -> Result<(), GarminError> {
        self.with_logging(
            |client| async move { client.add_gear_to_activity(gear_uuid, activity_id).await },
            "add_gear_to_activity",
        )
        .await
    }
}
