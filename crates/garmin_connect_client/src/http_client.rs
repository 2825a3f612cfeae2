//! HTTP client implementation for the Garmin Connect REST API.
//!
//! This module provides a reqwest-based implementation of the [`GarminClient`](crate::GarminClient) trait.
//! It carries a session token issued by an external login flow; it never performs
//! the SSO exchange itself.

use crate::config::Config;
use crate::utils::format_millis;
use crate::{BloodPressure, BodyComposition, GarminClient, GarminError, ManualActivity};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tokio::sync::RwLock;

/// Client for the Garmin Connect API using reqwest.
#[derive(Debug)]
pub struct ReqwestGarminClient {
    base_url: String,
    token: Option<SecretString>,
    client: reqwest::Client,
    display_name: RwLock<Option<String>>,
}

impl ReqwestGarminClient {
    /// Create a new client instance.
    ///
    /// # Arguments
    /// * `base_url` - API root, e.g. "https://connectapi.garmin.com"
    /// * `token` - OAuth bearer token from the external login flow
    pub fn new(base_url: &str, token: Option<SecretString>) -> Result<Self, GarminError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("garmin-connect-hub/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
            display_name: RwLock::new(None),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, GarminError> {
        Self::new(&cfg.base_url, cfg.token.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Build an authenticated GET request.
    fn get_request(&self, path: &str) -> reqwest::RequestBuilder {
        self.authed(self.client.get(self.url(path)))
    }

    /// Build an authenticated POST request.
    fn post_request(&self, path: &str) -> reqwest::RequestBuilder {
        self.authed(self.client.post(self.url(path)))
    }

    /// Build an authenticated PUT request.
    fn put_request(&self, path: &str) -> reqwest::RequestBuilder {
        self.authed(self.client.put(self.url(path)))
    }

    /// Build an authenticated DELETE request.
    fn delete_request(&self, path: &str) -> reqwest::RequestBuilder {
        self.authed(self.client.delete(self.url(path)))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, GarminError> {
        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                metrics::counter!("garmin_connect_upstream_calls_total", "outcome" => "transport_error")
                    .increment(1);
                return Err(e.into());
            }
        };
        if !resp.status().is_success() {
            metrics::counter!("garmin_connect_upstream_calls_total", "outcome" => "error")
                .increment(1);
            return Err(self.error_from_response(resp).await);
        }
        metrics::counter!("garmin_connect_upstream_calls_total", "outcome" => "ok").increment(1);
        Ok(resp)
    }

    /// Execute a request and expect a JSON response. An empty body
    /// (Garmin answers 204 for days without data) decodes to `null`.
    async fn execute_json(&self, request: reqwest::RequestBuilder) -> Result<Value, GarminError> {
        let resp = self.send(request).await?;
        let url = resp.url().path().to_string();
        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| GarminError::Decode {
            what: url,
            message: e.to_string(),
        })
    }

    /// Execute a request with no expected response body.
    async fn execute_empty(&self, request: reqwest::RequestBuilder) -> Result<(), GarminError> {
        self.send(request).await.map(|_| ())
    }

    /// Extract error information from a failed response.
    async fn error_from_response(&self, resp: reqwest::Response) -> GarminError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let body_snippet: String = body.chars().take(256).collect();
        GarminError::from_status(status, body_snippet)
    }

    /// Display name of the account, fetched once from the social profile.
    async fn display_name(&self) -> Result<String, GarminError> {
        if let Some(name) = self.display_name.read().await.as_ref() {
            return Ok(name.clone());
        }
        let profile = self
            .execute_json(self.get_request("/userprofile-service/socialProfile"))
            .await?;
        let name = profile
            .get("displayName")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GarminError::Decode {
                what: "socialProfile".into(),
                message: "missing displayName".into(),
            })?
            .to_string();
        *self.display_name.write().await = Some(name.clone());
        Ok(name)
    }

    fn gmt_millis(ts: &DateTime<FixedOffset>) -> String {
        format_millis(&ts.with_timezone(&Utc).naive_utc())
    }
}

/// Fold the raw lactate threshold history into the latest speed and heart rate.
fn fold_lactate_threshold(entries: &Value) -> Value {
    let mut latest = serde_json::Map::new();
    for entry in entries.as_array().into_iter().flatten() {
        for key in [
            "userProfilePK",
            "calendarDate",
            "sequence",
            "speed",
            "heartRate",
            "heartRateCycling",
        ] {
            if let Some(v) = entry.get(key).filter(|v| !v.is_null()) {
                latest.insert(key.to_string(), v.clone());
            }
        }
    }
    json!({ "speed_and_heart_rate": Value::Object(latest) })
}

#[async_trait]
impl GarminClient for ReqwestGarminClient {
    async fn login(&self, _mfa_code: Option<&str>) -> Result<(), GarminError> {
        if self.token.is_none() {
            return Err(GarminError::Auth(
                "no session token configured; complete the Garmin login flow first".into(),
            ));
        }
        *self.display_name.write().await = None;
        let name = self.display_name().await?;
        tracing::debug!(display_name = %name, "garmin session validated");
        Ok(())
    }

    async fn get_user_summary(&self, date: &str) -> Result<Value, GarminError> {
        let name = self.display_name().await?;
        let path = format!("/usersummary-service/usersummary/daily/{name}");
        self.execute_json(self.get_request(&path).query(&[("calendarDate", date)]))
            .await
    }

    async fn get_daily_steps(&self, start: &str, end: &str) -> Result<Value, GarminError> {
        let path = format!("/usersummary-service/stats/steps/daily/{start}/{end}");
        self.execute_json(self.get_request(&path)).await
    }

    async fn get_body_composition(&self, date: &str) -> Result<Value, GarminError> {
        self.execute_json(
            self.get_request("/weight-service/weight/dateRange")
                .query(&[("startDate", date), ("endDate", date)]),
        )
        .await
    }

    async fn get_hydration_data(&self, date: &str) -> Result<Value, GarminError> {
        let path = format!("/usersummary-service/usersummary/hydration/daily/{date}");
        self.execute_json(self.get_request(&path)).await
    }

    async fn get_blood_pressure(&self, start: &str, end: &str) -> Result<Value, GarminError> {
        let path = format!("/bloodpressure-service/bloodpressure/range/{start}/{end}");
        self.execute_json(self.get_request(&path).query(&[("includeAll", "true")]))
            .await
    }

    async fn get_fitnessage_data(&self, date: &str) -> Result<Value, GarminError> {
        let path = format!("/fitnessage-service/fitnessage/{date}");
        self.execute_json(self.get_request(&path)).await
    }

    async fn get_activities_by_date(&self, start: &str, end: &str) -> Result<Value, GarminError> {
        self.execute_json(
            self.get_request("/activitylist-service/activities/search/activities")
                .query(&[
                    ("startDate", start),
                    ("endDate", end),
                    ("start", "0"),
                    ("limit", "20"),
                ]),
        )
        .await
    }

    async fn get_workouts(&self, start: u32, limit: u32) -> Result<Value, GarminError> {
        self.execute_json(
            self.get_request("/workout-service/workouts")
                .query(&[("start", start), ("limit", limit)]),
        )
        .await
    }

    async fn get_activity_types(&self) -> Result<Value, GarminError> {
        self.execute_json(self.get_request("/activity-service/activity/activityTypes"))
            .await
    }

    async fn get_training_readiness(&self, date: &str) -> Result<Value, GarminError> {
        let path = format!("/metrics-service/metrics/trainingreadiness/{date}");
        self.execute_json(self.get_request(&path)).await
    }

    async fn get_training_status(&self, date: &str) -> Result<Value, GarminError> {
        let path = format!("/metrics-service/metrics/trainingstatus/aggregated/{date}");
        self.execute_json(self.get_request(&path)).await
    }

    async fn get_lactate_threshold(&self) -> Result<Value, GarminError> {
        let raw = self
            .execute_json(self.get_request("/biometric-service/biometric/latestLactateThreshold"))
            .await?;
        Ok(fold_lactate_threshold(&raw))
    }

    async fn get_endurance_score(&self, date: &str) -> Result<Value, GarminError> {
        self.execute_json(
            self.get_request("/metrics-service/metrics/endurancescore")
                .query(&[("calendarDate", date)]),
        )
        .await
    }

    async fn get_hill_score(&self, date: &str) -> Result<Value, GarminError> {
        self.execute_json(
            self.get_request("/metrics-service/metrics/hillscore")
                .query(&[("calendarDate", date)]),
        )
        .await
    }

    async fn get_sleep_data(&self, date: &str) -> Result<Value, GarminError> {
        let name = self.display_name().await?;
        let path = format!("/wellness-service/wellness/dailySleepData/{name}");
        self.execute_json(
            self.get_request(&path)
                .query(&[("date", date), ("nonSleepBufferMinutes", "60")]),
        )
        .await
    }

    async fn get_hrv_data(&self, date: &str) -> Result<Value, GarminError> {
        let path = format!("/hrv-service/hrv/{date}");
        self.execute_json(self.get_request(&path)).await
    }

    async fn get_menstrual_data_for_date(&self, date: &str) -> Result<Value, GarminError> {
        let path = format!("/periodichealth-service/menstrualcycle/dayview/{date}");
        self.execute_json(self.get_request(&path)).await
    }

    async fn get_device_alarms(&self) -> Result<Value, GarminError> {
        let devices = self
            .execute_json(self.get_request("/device-service/deviceregistration/devices"))
            .await?;
        let mut alarms = Vec::new();
        for device in devices.as_array().into_iter().flatten() {
            let Some(device_id) = device.get("deviceId").filter(|v| !v.is_null()) else {
                continue;
            };
            let path = format!("/device-service/deviceservice/device-info/settings/{device_id}");
            let settings = self.execute_json(self.get_request(&path)).await?;
            if let Some(list) = settings.get("alarms").and_then(Value::as_array) {
                alarms.extend(list.iter().cloned());
            }
        }
        Ok(Value::Array(alarms))
    }

    async fn get_earned_badges(&self) -> Result<Value, GarminError> {
        self.execute_json(self.get_request("/badge-service/badge/earned"))
            .await
    }

    async fn get_gear(&self, user_profile_id: &str) -> Result<Value, GarminError> {
        self.execute_json(
            self.get_request("/gear-service/gear/filterGear")
                .query(&[("userProfilePk", user_profile_id)]),
        )
        .await
    }

    async fn get_gear_stats(&self, gear_uuid: &str) -> Result<Value, GarminError> {
        let path = format!("/userstats-service/gears/{gear_uuid}");
        self.execute_json(self.get_request(&path)).await
    }

    async fn get_gear_defaults(&self, user_profile_id: &str) -> Result<Value, GarminError> {
        let path = format!("/gear-service/gear/user/{user_profile_id}/activityTypes");
        self.execute_json(self.get_request(&path)).await
    }

    async fn add_body_composition(&self, entry: &BodyComposition) -> Result<(), GarminError> {
        let mut body = json!({
            "dateTimestamp": format_millis(&entry.timestamp.naive_local()),
            "gmtTimestamp": Self::gmt_millis(&entry.timestamp),
            "unitKey": "kg",
            "sourceType": "MANUAL",
            "value": entry.weight,
        });
        let extras = [
            ("percentFat", entry.percent_fat),
            ("percentHydration", entry.percent_hydration),
            ("visceralFatMass", entry.visceral_fat_mass),
            ("boneMass", entry.bone_mass),
            ("muscleMass", entry.muscle_mass),
            ("basalMet", entry.basal_met),
            ("activeMet", entry.active_met),
            ("physiqueRating", entry.physique_rating),
            ("metabolicAge", entry.metabolic_age),
            ("visceralFatRating", entry.visceral_fat_rating),
            ("bmi", entry.bmi),
        ];
        if let Some(obj) = body.as_object_mut() {
            for (key, value) in extras {
                if let Some(v) = value {
                    obj.insert(key.into(), json!(v));
                }
            }
        }
        self.execute_empty(self.post_request("/weight-service/user-weight").json(&body))
            .await
    }

    async fn set_blood_pressure(&self, entry: &BloodPressure) -> Result<(), GarminError> {
        let body = json!({
            "measurementTimestampLocal": format_millis(&entry.timestamp.naive_local()),
            "measurementTimestampGMT": Self::gmt_millis(&entry.timestamp),
            "systolic": entry.systolic,
            "diastolic": entry.diastolic,
            "pulse": entry.pulse,
            "sourceType": "MANUAL",
            "notes": entry.notes.clone().unwrap_or_default(),
        });
        self.execute_empty(
            self.post_request("/bloodpressure-service/bloodpressure")
                .json(&body),
        )
        .await
    }

    async fn set_gear_default(
        &self,
        activity_type_id: i64,
        gear_uuid: &str,
        default: bool,
    ) -> Result<(), GarminError> {
        let path = format!("/gear-service/gear/{gear_uuid}/activityType/{activity_type_id}");
        let request = if default {
            self.put_request(&format!("{path}/default/true"))
        } else {
            self.delete_request(&path)
        };
        self.execute_empty(request).await
    }

    async fn create_manual_activity(
        &self,
        activity: &ManualActivity,
    ) -> Result<Value, GarminError> {
        let body = json!({
            "activityTypeDTO": { "typeKey": activity.type_key },
            "accessControlRuleDTO": { "typeId": 2, "typeKey": "private" },
            "timeZoneUnitDTO": { "unitKey": activity.time_zone },
            "activityName": activity.activity_name,
            "metadataDTO": { "autoCalcCalories": true },
            "summaryDTO": {
                "startTimeLocal": activity.start_time_local,
                "distance": activity.distance_km * 1000.0,
                "duration": f64::from(activity.duration_min) * 60.0,
            },
        });
        self.execute_json(self.post_request("/activity-service/activity").json(&body))
            .await
    }

    async fn upload_activity(&self, file_path: &std::path::Path) -> Result<Value, GarminError> {
        let bytes = tokio::fs::read(file_path).await?;
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                GarminError::InvalidInput(format!("not a file: {}", file_path.display()))
            })?;
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("file", part);
        self.execute_json(self.post_request("/upload-service/upload").multipart(form))
            .await
    }

    async fn add_gear_to_activity(&self, gear_uuid: &str, activity_id: u64) -> Result<(), GarminError> {
        let path = format!("/gear-service/gear/link/{gear_uuid}/activity/{activity_id}");
        self.execute_empty(self.put_request(&path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_new_trims_trailing_slash() {
        let client = ReqwestGarminClient::new("http://localhost/", None).unwrap();
        assert_eq!(client.url("/x"), "http://localhost/x");
    }

    #[tokio::test]
    async fn login_without_token_is_auth_error() {
        let client = ReqwestGarminClient::new("http://localhost", None).unwrap();
        let err = client.login(None).await.unwrap_err();
        assert!(err.is_auth());
    }

    #[test]
    fn lactate_threshold_keeps_latest_non_null_values() {
        let raw = json!([
            {"calendarDate": "2025-01-01", "speed": 0.31, "heartRate": null},
            {"calendarDate": "2025-01-05", "speed": null, "heartRate": 168},
        ]);
        let folded = fold_lactate_threshold(&raw);
        let shr = &folded["speed_and_heart_rate"];
        assert_eq!(shr["speed"], 0.31);
        assert_eq!(shr["heartRate"], 168);
        assert_eq!(shr["calendarDate"], "2025-01-05");
    }

    #[test]
    fn lactate_threshold_handles_non_array() {
        let folded = fold_lactate_threshold(&Value::Null);
        assert!(folded["speed_and_heart_rate"].as_object().unwrap().is_empty());
    }
}
