//! Shared test utilities: a scriptable in-memory `GarminClient`.
#![cfg(test)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use garmin_connect_client::{BloodPressure, BodyComposition, GarminClient, GarminError, ManualActivity};
use serde_json::{Value, json};
use tokio::sync::Mutex;

type Failure = Arc<dyn Fn() -> GarminError + Send + Sync>;

#[derive(Default)]
struct FakeState {
    responses: HashMap<String, Value>,
    keyed: HashMap<(String, String), Value>,
    failures: HashMap<String, Failure>,
    delays: HashMap<String, Duration>,
    calls: HashMap<String, usize>,
    writes: Vec<(String, Value)>,
    login_codes: Vec<Option<String>>,
    fail_login: bool,
}

/// Reads answer with the scripted response (or `null`); writes are recorded.
#[derive(Default)]
pub struct FakeClient {
    state: Mutex<FakeState>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn respond(&self, method: &str, value: Value) {
        self.state.lock().await.responses.insert(method.into(), value);
    }

    /// Response used only when the first argument equals `arg`.
    pub async fn respond_for(&self, method: &str, arg: &str, value: Value) {
        self.state
            .lock()
            .await
            .keyed
            .insert((method.into(), arg.into()), value);
    }

    pub async fn fail<F>(&self, method: &str, f: F)
    where
        F: Fn() -> GarminError + Send + Sync + 'static,
    {
        self.state.lock().await.failures.insert(method.into(), Arc::new(f));
    }

    pub async fn clear_failure(&self, method: &str) {
        self.state.lock().await.failures.remove(method);
    }

    pub async fn delay(&self, method: &str, by: Duration) {
        self.state.lock().await.delays.insert(method.into(), by);
    }

    pub async fn fail_login(&self, fail: bool) {
        self.state.lock().await.fail_login = fail;
    }

    pub async fn login_codes(&self) -> Vec<Option<String>> {
        self.state.lock().await.login_codes.clone()
    }

    pub async fn calls(&self, method: &str) -> usize {
        self.state.lock().await.calls.get(method).copied().unwrap_or(0)
    }

    pub async fn writes(&self) -> Vec<(String, Value)> {
        self.state.lock().await.writes.clone()
    }

    async fn enter(&self, method: &str) -> Result<(), GarminError> {
        let delay = {
            let mut state = self.state.lock().await;
            *state.calls.entry(method.into()).or_default() += 1;
            state.delays.get(method).copied()
        };
        if let Some(by) = delay {
            tokio::time::sleep(by).await;
        }
        let state = self.state.lock().await;
        match state.failures.get(method) {
            Some(f) => Err(f()),
            None => Ok(()),
        }
    }

    async fn read(&self, method: &str, arg: Option<&str>) -> Result<Value, GarminError> {
        self.enter(method).await?;
        let state = self.state.lock().await;
        if let Some(arg) = arg
            && let Some(value) = state.keyed.get(&(method.to_string(), arg.to_string()))
        {
            return Ok(value.clone());
        }
        Ok(state.responses.get(method).cloned().unwrap_or(Value::Null))
    }

    async fn write(&self, method: &str, payload: Value) -> Result<Value, GarminError> {
        self.enter(method).await?;
        let mut state = self.state.lock().await;
        state.writes.push((method.into(), payload));
        Ok(state
            .responses
            .get(method)
            .cloned()
            .unwrap_or_else(|| json!({})))
    }
}

#[async_trait]
impl GarminClient for FakeClient {
    async fn login(&self, mfa_code: Option<&str>) -> Result<(), GarminError> {
        let mut state = self.state.lock().await;
        state.login_codes.push(mfa_code.map(str::to_string));
        if state.fail_login {
            return Err(GarminError::Auth("bad credentials".into()));
        }
        Ok(())
    }

    async fn get_user_summary(&self, date: &str) -> Result<Value, GarminError> {
        self.read("get_user_summary", Some(date)).await
    }

    async fn get_daily_steps(&self, start: &str, _end: &str) -> Result<Value, GarminError> {
        self.read("get_daily_steps", Some(start)).await
    }

    async fn get_body_composition(&self, date: &str) -> Result<Value, GarminError> {
        self.read("get_body_composition", Some(date)).await
    }

    async fn get_hydration_data(&self, date: &str) -> Result<Value, GarminError> {
        self.read("get_hydration_data", Some(date)).await
    }

    async fn get_blood_pressure(&self, start: &str, _end: &str) -> Result<Value, GarminError> {
        self.read("get_blood_pressure", Some(start)).await
    }

    async fn get_fitnessage_data(&self, date: &str) -> Result<Value, GarminError> {
        self.read("get_fitnessage_data", Some(date)).await
    }

    async fn get_activities_by_date(&self, start: &str, _end: &str) -> Result<Value, GarminError> {
        self.read("get_activities_by_date", Some(start)).await
    }

    async fn get_workouts(&self, _start: u32, _limit: u32) -> Result<Value, GarminError> {
        self.read("get_workouts", None).await
    }

    async fn get_activity_types(&self) -> Result<Value, GarminError> {
        self.read("get_activity_types", None).await
    }

    async fn get_training_readiness(&self, date: &str) -> Result<Value, GarminError> {
        self.read("get_training_readiness", Some(date)).await
    }

    async fn get_training_status(&self, date: &str) -> Result<Value, GarminError> {
        self.read("get_training_status", Some(date)).await
    }

    async fn get_lactate_threshold(&self) -> Result<Value, GarminError> {
        self.read("get_lactate_threshold", None).await
    }

    async fn get_endurance_score(&self, date: &str) -> Result<Value, GarminError> {
        self.read("get_endurance_score", Some(date)).await
    }

    async fn get_hill_score(&self, date: &str) -> Result<Value, GarminError> {
        self.read("get_hill_score", Some(date)).await
    }

    async fn get_sleep_data(&self, date: &str) -> Result<Value, GarminError> {
        self.read("get_sleep_data", Some(date)).await
    }

    async fn get_hrv_data(&self, date: &str) -> Result<Value, GarminError> {
        self.read("get_hrv_data", Some(date)).await
    }

    async fn get_menstrual_data_for_date(&self, date: &str) -> Result<Value, GarminError> {
        self.read("get_menstrual_data_for_date", Some(date)).await
    }

    async fn get_device_alarms(&self) -> Result<Value, GarminError> {
        self.read("get_device_alarms", None).await
    }

    async fn get_earned_badges(&self) -> Result<Value, GarminError> {
        self.read("get_earned_badges", None).await
    }

    async fn get_gear(&self, user_profile_id: &str) -> Result<Value, GarminError> {
        self.read("get_gear", Some(user_profile_id)).await
    }

    async fn get_gear_stats(&self, gear_uuid: &str) -> Result<Value, GarminError> {
        self.read("get_gear_stats", Some(gear_uuid)).await
    }

    async fn get_gear_defaults(&self, user_profile_id: &str) -> Result<Value, GarminError> {
        self.read("get_gear_defaults", Some(user_profile_id)).await
    }

    async fn add_body_composition(&self, entry: &BodyComposition) -> Result<(), GarminError> {
        let payload = serde_json::to_value(entry).unwrap();
        self.write("add_body_composition", payload).await.map(|_| ())
    }

    async fn set_blood_pressure(&self, entry: &BloodPressure) -> Result<(), GarminError> {
        let payload = serde_json::to_value(entry).unwrap();
        self.write("set_blood_pressure", payload).await.map(|_| ())
    }

    async fn set_gear_default(
        &self,
        activity_type_id: i64,
        gear_uuid: &str,
        default: bool,
    ) -> Result<(), GarminError> {
        let payload = json!({
            "activity_type_id": activity_type_id,
            "gear_uuid": gear_uuid,
            "default": default,
        });
        self.write("set_gear_default", payload).await.map(|_| ())
    }

    async fn create_manual_activity(&self, activity: &ManualActivity) -> Result<Value, GarminError> {
        let payload = serde_json::to_value(activity).unwrap();
        self.write("create_manual_activity", payload).await
    }

    async fn upload_activity(&self, file_path: &Path) -> Result<Value, GarminError> {
        let payload = json!({ "file": file_path.display().to_string() });
        self.write("upload_activity", payload).await
    }

    async fn add_gear_to_activity(&self, gear_uuid: &str, activity_id: u64) -> Result<(), GarminError> {
        let payload = json!({ "gear_uuid": gear_uuid, "activity_id": activity_id });
        self.write("add_gear_to_activity", payload).await.map(|_| ())
    }
}
