//! User-invoked actions that write to Garmin Connect.
//!
//! Every payload is deserialized into a request type (unknown fields are
//! rejected) and validated before the session is touched, so a rejected call
//! never reaches upstream.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use chrono_tz::Tz;
use garmin_connect_client::utils::{format_millis, parse_local_datetime};
use garmin_connect_client::{BloodPressure, BodyComposition, GarminError, ManualActivity};
use regex::Regex;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::{RwLock, watch};

use crate::catalog;
use crate::coordinator::{Clock, CoordinatorState};
use crate::entities::EntityRegistry;
use crate::error::{IntegrationError, IntegrationResult};
use crate::session::{Session, SessionGuard};
use crate::snapshot::{Snapshot, profile_id};

static ACTIVITY_TYPE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9_]*$").expect("static activity type pattern")
});

const UPLOAD_EXTENSIONS: [&str; 3] = ["fit", "gpx", "tcx"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    AddBodyComposition,
    AddBloodPressure,
    SetActiveGear,
    CreateActivity,
    UploadActivity,
    AddGearToActivity,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        ActionKind::AddBodyComposition,
        ActionKind::AddBloodPressure,
        ActionKind::SetActiveGear,
        ActionKind::CreateActivity,
        ActionKind::UploadActivity,
        ActionKind::AddGearToActivity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::AddBodyComposition => "add_body_composition",
            ActionKind::AddBloodPressure => "add_blood_pressure",
            ActionKind::SetActiveGear => "set_active_gear",
            ActionKind::CreateActivity => "create_activity",
            ActionKind::UploadActivity => "upload_activity",
            ActionKind::AddGearToActivity => "add_gear_to_activity",
        }
    }

    /// JSON schema of the action's payload.
    pub fn schema(self) -> Value {
        let schema = match self {
            ActionKind::AddBodyComposition => schemars::schema_for!(AddBodyCompositionRequest),
            ActionKind::AddBloodPressure => schemars::schema_for!(AddBloodPressureRequest),
            ActionKind::SetActiveGear => schemars::schema_for!(SetActiveGearRequest),
            ActionKind::CreateActivity => schemars::schema_for!(CreateActivityRequest),
            ActionKind::UploadActivity => schemars::schema_for!(UploadActivityRequest),
            ActionKind::AddGearToActivity => schemars::schema_for!(AddGearToActivityRequest),
        };
        serde_json::to_value(schema).unwrap_or(Value::Null)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = IntegrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| IntegrationError::Reference(format!("unknown action '{s}'")))
    }
}

// === Requests ===

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AddBodyCompositionRequest {
    /// Weight in kilograms.
    pub weight: f64,
    /// When omitted, the time of the call.
    pub timestamp: Option<String>,
    pub bmi: Option<f64>,
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
    /// A body composition sensor the reading belongs to.
    pub entity_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AddBloodPressureRequest {
    /// mmHg
    pub systolic: u16,
    /// mmHg
    pub diastolic: u16,
    /// bpm
    pub pulse: u16,
    pub timestamp: Option<String>,
    pub notes: Option<String>,
    pub entity_id: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActiveGearActivityType {
    Running,
    Cycling,
    Hiking,
    Other,
    Walking,
    Swimming,
}

impl ActiveGearActivityType {
    pub fn type_key(self) -> &'static str {
        match self {
            ActiveGearActivityType::Running => "running",
            ActiveGearActivityType::Cycling => "cycling",
            ActiveGearActivityType::Hiking => "hiking",
            ActiveGearActivityType::Other => "other",
            ActiveGearActivityType::Walking => "walking",
            ActiveGearActivityType::Swimming => "swimming",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum GearSetting {
    #[serde(rename = "set as default")]
    SetAsDefault,
    #[serde(rename = "unset default")]
    UnsetDefault,
    #[serde(rename = "set this as default, unset others")]
    OnlyThis,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SetActiveGearRequest {
    pub activity_type: ActiveGearActivityType,
    pub setting: GearSetting,
    /// Gear entity id, e.g. `gear_<uuid>`.
    pub entity_id: Option<String>,
    pub gear_uuid: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateActivityRequest {
    pub activity_name: String,
    /// Garmin activity type key, e.g. `running`.
    pub activity_type: String,
    /// Local start, `YYYY-MM-DDTHH:MM:SS`.
    pub start_datetime: String,
    pub duration_min: u32,
    pub distance_km: f64,
    /// IANA zone; defaults to the account zone.
    pub time_zone: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UploadActivityRequest {
    /// Path to a `.fit`, `.gpx` or `.tcx` file.
    pub file_path: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AddGearToActivityRequest {
    pub activity_id: u64,
    pub gear_uuid: String,
}

// === Validation helpers ===

fn invalid(msg: impl Into<String>) -> IntegrationError {
    IntegrationError::Validation(msg.into())
}

fn positive(field: &str, value: f64) -> IntegrationResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{field} must be a positive number")))
    }
}

fn non_negative(field: &str, value: Option<f64>) -> IntegrationResult<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => {
            Err(invalid(format!("{field} must be a non-negative number")))
        }
        _ => Ok(()),
    }
}

fn percent(field: &str, value: Option<f64>) -> IntegrationResult<()> {
    match value {
        Some(v) if !(0.0..=100.0).contains(&v) => {
            Err(invalid(format!("{field} must be between 0 and 100")))
        }
        _ => Ok(()),
    }
}

fn in_range(field: &str, value: u16, min: u16, max: u16) -> IntegrationResult<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{field} must be between {min} and {max}")))
    }
}

/// Resolve an optional user timestamp. Naive values are wall-clock time in
/// the account zone.
pub fn resolve_timestamp(
    input: Option<&str>,
    tz: Tz,
    now: DateTime<Utc>,
) -> IntegrationResult<DateTime<FixedOffset>> {
    let Some(raw) = input.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(now.with_timezone(&tz).fixed_offset());
    };
    if let Ok(aware) = DateTime::parse_from_rfc3339(raw) {
        return Ok(aware);
    }
    let naive = parse_local_datetime(raw).ok_or_else(|| invalid(format!("invalid timestamp '{raw}'")))?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|at| at.fixed_offset())
        .ok_or_else(|| invalid(format!("timestamp '{raw}' does not exist in {}", tz.name())))
}

fn parse<T: DeserializeOwned>(payload: Value) -> IntegrationResult<T> {
    Ok(serde_json::from_value(payload)?)
}

fn action_err(err: GarminError) -> IntegrationError {
    IntegrationError::from_action(err)
}

fn find_type_id(types: &[Value], type_key: &str) -> Option<i64> {
    types
        .iter()
        .find(|t| t.get("typeKey").and_then(Value::as_str) == Some(type_key))
        .and_then(|t| t.get("typeId"))
        .and_then(Value::as_i64)
}

fn ok() -> Value {
    json!({ "status": "ok" })
}

// === Handlers ===

pub struct ActionHandlers {
    session: Arc<Session>,
    registry: Arc<RwLock<EntityRegistry>>,
    state: watch::Receiver<CoordinatorState>,
    time_zone: Tz,
    clock: Clock,
}

impl ActionHandlers {
    pub fn new(
        session: Arc<Session>,
        registry: Arc<RwLock<EntityRegistry>>,
        state: watch::Receiver<CoordinatorState>,
        time_zone: Tz,
    ) -> Self {
        Self {
            session,
            registry,
            state,
            time_zone,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.state.borrow().snapshot.clone()
    }

    /// Run an action by name with a JSON payload.
    pub async fn dispatch(&self, name: &str, payload: Value) -> IntegrationResult<Value> {
        let kind: ActionKind = name.parse()?;
        let result = self.run(kind, payload).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.kind().as_str(),
        };
        metrics::counter!("garmin_connect_action_total", "action" => kind.as_str(), "outcome" => outcome)
            .increment(1);
        match &result {
            Ok(_) => tracing::info!(action = kind.as_str(), "action completed"),
            Err(err) => tracing::warn!(action = kind.as_str(), error = %err, "action failed"),
        }
        result
    }

    async fn run(&self, kind: ActionKind, payload: Value) -> IntegrationResult<Value> {
        match kind {
            ActionKind::AddBodyComposition => self.add_body_composition(parse(payload)?).await,
            ActionKind::AddBloodPressure => self.add_blood_pressure(parse(payload)?).await,
            ActionKind::SetActiveGear => self.set_active_gear(parse(payload)?).await,
            ActionKind::CreateActivity => self.create_activity(parse(payload)?).await,
            ActionKind::UploadActivity => self.upload_activity(parse(payload)?).await,
            ActionKind::AddGearToActivity => self.add_gear_to_activity(parse(payload)?).await,
        }
    }

    async fn upstream(&self) -> IntegrationResult<SessionGuard<'_>> {
        let mut guard = self.session.lock().await;
        guard.ensure_login().await.map_err(action_err)?;
        Ok(guard)
    }

    async fn check_entity<F>(&self, entity_id: Option<&str>, accepts: F) -> IntegrationResult<()>
    where
        F: Fn(&str) -> bool,
    {
        let Some(entity_id) = entity_id else {
            return Ok(());
        };
        let registry = self.registry.read().await;
        match registry.sensor_key(entity_id) {
            Some(key) if accepts(key) => Ok(()),
            Some(_) => Err(IntegrationError::Reference(format!(
                "entity '{entity_id}' does not accept this action"
            ))),
            None => Err(IntegrationError::Reference(format!("unknown entity '{entity_id}'"))),
        }
    }

    async fn check_gear(&self, uuid: &str) -> IntegrationResult<()> {
        let registry = self.registry.read().await;
        if registry.gear_enabled() && !registry.has_gear(uuid) {
            return Err(IntegrationError::Reference(format!("unknown gear '{uuid}'")));
        }
        Ok(())
    }

    pub async fn add_body_composition(&self, req: AddBodyCompositionRequest) -> IntegrationResult<Value> {
        positive("weight", req.weight)?;
        percent("percent_fat", req.percent_fat)?;
        percent("percent_hydration", req.percent_hydration)?;
        for (field, value) in [
            ("bmi", req.bmi),
            ("visceral_fat_mass", req.visceral_fat_mass),
            ("bone_mass", req.bone_mass),
            ("muscle_mass", req.muscle_mass),
            ("basal_met", req.basal_met),
            ("active_met", req.active_met),
            ("physique_rating", req.physique_rating),
            ("metabolic_age", req.metabolic_age),
            ("visceral_fat_rating", req.visceral_fat_rating),
        ] {
            non_negative(field, value)?;
        }
        let timestamp = resolve_timestamp(req.timestamp.as_deref(), self.time_zone, (self.clock)())?;
        self.check_entity(req.entity_id.as_deref(), |key| {
            catalog::BODY_COMPOSITION.iter().any(|d| d.key == key)
        })
        .await?;

        let entry = BodyComposition {
            timestamp,
            weight: req.weight,
            percent_fat: req.percent_fat,
            percent_hydration: req.percent_hydration,
            visceral_fat_mass: req.visceral_fat_mass,
            bone_mass: req.bone_mass,
            muscle_mass: req.muscle_mass,
            basal_met: req.basal_met,
            active_met: req.active_met,
            physique_rating: req.physique_rating,
            metabolic_age: req.metabolic_age,
            visceral_fat_rating: req.visceral_fat_rating,
            bmi: req.bmi,
        };
        let guard = self.upstream().await?;
        guard
            .timed("add_body_composition", guard.client().add_body_composition(&entry))
            .await
            .map_err(action_err)?;
        Ok(ok())
    }

    pub async fn add_blood_pressure(&self, req: AddBloodPressureRequest) -> IntegrationResult<Value> {
        in_range("systolic", req.systolic, 1, 300)?;
        in_range("diastolic", req.diastolic, 1, 300)?;
        in_range("pulse", req.pulse, 1, 300)?;
        let timestamp = resolve_timestamp(req.timestamp.as_deref(), self.time_zone, (self.clock)())?;
        self.check_entity(req.entity_id.as_deref(), |key| key.starts_with("bp"))
            .await?;

        let entry = BloodPressure {
            timestamp,
            systolic: req.systolic,
            diastolic: req.diastolic,
            pulse: req.pulse,
            notes: req.notes,
        };
        let guard = self.upstream().await?;
        guard
            .timed("set_blood_pressure", guard.client().set_blood_pressure(&entry))
            .await
            .map_err(action_err)?;
        Ok(ok())
    }

    async fn target_gear(&self, req: &SetActiveGearRequest) -> IntegrationResult<String> {
        let from_entity = match req.entity_id.as_deref() {
            Some(entity_id) => {
                let registry = self.registry.read().await;
                let uuid = registry
                    .gear_uuid(entity_id)
                    .ok_or_else(|| IntegrationError::Reference(format!("unknown gear entity '{entity_id}'")))?;
                Some(uuid.to_string())
            }
            None => None,
        };
        match (from_entity, req.gear_uuid.as_deref()) {
            (Some(a), Some(b)) if a != b => Err(invalid("entity_id and gear_uuid refer to different gear")),
            (Some(uuid), _) => Ok(uuid),
            (None, Some(uuid)) => {
                self.check_gear(uuid).await?;
                Ok(uuid.to_string())
            }
            (None, None) => Err(invalid("one of entity_id or gear_uuid is required")),
        }
    }

    pub async fn set_active_gear(&self, req: SetActiveGearRequest) -> IntegrationResult<Value> {
        let uuid = self.target_gear(&req).await?;
        let type_key = req.activity_type.type_key();
        let snapshot = self.snapshot();

        let guard = self.upstream().await?;
        let known = snapshot
            .as_ref()
            .and_then(|s| s.activity_types())
            .and_then(|types| find_type_id(types, type_key));
        let type_id = match known {
            Some(id) => id,
            None => {
                let types = guard
                    .timed("get_activity_types", guard.client().get_activity_types())
                    .await
                    .map_err(action_err)?;
                find_type_id(types.as_array().map(Vec::as_slice).unwrap_or_default(), type_key)
                    .ok_or_else(|| IntegrationError::Reference(format!("unknown activity type '{type_key}'")))?
            }
        };

        if req.setting != GearSetting::OnlyThis {
            let default = req.setting == GearSetting::SetAsDefault;
            guard
                .timed("set_gear_default", guard.client().set_gear_default(type_id, &uuid, default))
                .await
                .map_err(action_err)?;
            return Ok(ok());
        }

        let profile = match snapshot.as_ref().and_then(|s| s.user_profile_id()) {
            Some(id) => id,
            None => {
                let today = (self.clock)().with_timezone(&self.time_zone).date_naive();
                let summary = guard
                    .timed(
                        "get_user_summary",
                        guard.client().get_user_summary(&today.format("%Y-%m-%d").to_string()),
                    )
                    .await
                    .map_err(action_err)?;
                profile_id(summary.get("userProfileId"))
                    .ok_or_else(|| IntegrationError::Upstream("user profile id unavailable".into()))?
            }
        };
        let defaults = guard
            .timed("get_gear_defaults", guard.client().get_gear_defaults(&profile))
            .await
            .map_err(action_err)?;

        let others: Vec<String> = defaults
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter(|d| d.get("activityTypePk").and_then(Value::as_i64) == Some(type_id))
            .filter_map(|d| d.get("uuid").and_then(Value::as_str))
            .filter(|other| *other != uuid)
            .map(str::to_string)
            .collect();
        for other in &others {
            tracing::debug!(gear = %other, type_key, "clearing previous default gear");
            guard
                .timed("set_gear_default", guard.client().set_gear_default(type_id, other, false))
                .await
                .map_err(action_err)?;
        }
        guard
            .timed("set_gear_default", guard.client().set_gear_default(type_id, &uuid, true))
            .await
            .map_err(action_err)?;
        Ok(json!({ "status": "ok", "unset": others }))
    }

    pub async fn create_activity(&self, req: CreateActivityRequest) -> IntegrationResult<Value> {
        if req.activity_name.trim().is_empty() {
            return Err(invalid("activity_name must not be empty"));
        }
        if !ACTIVITY_TYPE_KEY.is_match(&req.activity_type) {
            return Err(invalid(format!("invalid activity_type '{}'", req.activity_type)));
        }
        if req.duration_min == 0 {
            return Err(invalid("duration_min must be positive"));
        }
        non_negative("distance_km", Some(req.distance_km))?;
        let tz = match req.time_zone.as_deref() {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| invalid(format!("unknown time zone '{name}'")))?,
            None => self.time_zone,
        };
        let start = parse_local_datetime(&req.start_datetime)
            .ok_or_else(|| invalid(format!("invalid start_datetime '{}'", req.start_datetime)))?;

        let activity = ManualActivity {
            activity_name: req.activity_name,
            type_key: req.activity_type,
            start_time_local: format_millis(&start),
            time_zone: tz.name().to_string(),
            duration_min: req.duration_min,
            distance_km: req.distance_km,
        };
        let guard = self.upstream().await?;
        guard
            .timed("create_manual_activity", guard.client().create_manual_activity(&activity))
            .await
            .map_err(action_err)
    }

    pub async fn upload_activity(&self, req: UploadActivityRequest) -> IntegrationResult<Value> {
        let path = PathBuf::from(&req.file_path);
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !UPLOAD_EXTENSIONS.contains(&extension.as_str()) {
            return Err(invalid(format!(
                "unsupported file type '{}', expected one of {}",
                req.file_path,
                UPLOAD_EXTENSIONS.join(", ")
            )));
        }
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| invalid(format!("cannot read {}: {e}", req.file_path)))?;
        match file.metadata().await {
            Ok(meta) if meta.is_file() => {}
            _ => return Err(invalid(format!("not a regular file: {}", req.file_path))),
        }
        drop(file);

        let guard = self.upstream().await?;
        guard
            .timed("upload_activity", guard.client().upload_activity(&path))
            .await
            .map_err(action_err)
    }

    pub async fn add_gear_to_activity(&self, req: AddGearToActivityRequest) -> IntegrationResult<Value> {
        if req.gear_uuid.trim().is_empty() {
            return Err(invalid("gear_uuid must not be empty"));
        }
        self.check_gear(&req.gear_uuid).await?;
        let guard = self.upstream().await?;
        guard
            .timed(
                "add_gear_to_activity",
                guard.client().add_gear_to_activity(&req.gear_uuid, req.activity_id),
            )
            .await
            .map_err(action_err)?;
        Ok(ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::RefreshStatus;
    use crate::error::ErrorKind;
    use crate::test_utils::FakeClient;
    use chrono::NaiveDate;
    use std::time::Duration;

    struct Harness {
        client: Arc<FakeClient>,
        handlers: ActionHandlers,
        _state_tx: watch::Sender<CoordinatorState>,
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 5, 11, 0, 0).unwrap()
    }

    async fn harness(data: Value) -> Harness {
        let client = Arc::new(FakeClient::new());
        let session = Arc::new(Session::new(client.clone(), Duration::from_secs(5), None));
        let Value::Object(map) = data else {
            panic!("object expected")
        };
        let tz = chrono_tz::Europe::Amsterdam;
        let snapshot = Arc::new(Snapshot::new(now(), NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(), tz, map));
        let state = CoordinatorState {
            snapshot: Some(snapshot),
            status: RefreshStatus::Ok,
            last_success: Some(now()),
            last_attempt: Some(now()),
        };
        let mut registry = EntityRegistry::builder().build();
        registry.apply(&state);
        let (state_tx, state_rx) = watch::channel(state);
        let handlers = ActionHandlers::new(session, Arc::new(RwLock::new(registry)), state_rx, tz)
            .with_clock(Arc::new(now));
        Harness {
            client,
            handlers,
            _state_tx: state_tx,
        }
    }

    fn gear_data() -> Value {
        json!({
            "userProfileId": 42,
            "gear": [{"uuid": "g1", "displayName": "Pegasus"}, {"uuid": "g2", "displayName": "Vomero"}],
            "gearStats": [{"uuid": "g1", "totalDistance": 1.0}, {"uuid": "g2", "totalDistance": 1.0}],
            "activityTypes": [{"typeKey": "running", "typeId": 1}, {"typeKey": "cycling", "typeId": 2}]
        })
    }

    #[tokio::test]
    async fn blood_pressure_defaults_to_now_in_account_zone() {
        let h = harness(json!({})).await;
        h.handlers
            .dispatch(
                "add_blood_pressure",
                json!({"systolic": 120, "diastolic": 80, "pulse": 60}),
            )
            .await
            .unwrap();
        let writes = h.client.writes().await;
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1["timestamp"], "2025-03-05T12:00:00+01:00");
    }

    #[tokio::test]
    async fn blood_pressure_out_of_range_is_rejected_before_upstream() {
        let h = harness(json!({})).await;
        let err = h
            .handlers
            .dispatch("add_blood_pressure", json!({"systolic": 0, "diastolic": 80, "pulse": 60}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(h.client.writes().await.is_empty());
        assert!(h.client.login_codes().await.is_empty());

        let err = h
            .handlers
            .dispatch("add_blood_pressure", json!({"diastolic": 80, "pulse": 60}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(h.client.login_codes().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_fields_are_rejected() {
        let h = harness(json!({})).await;
        let err = h
            .handlers
            .dispatch("add_body_composition", json!({"weight": 70.0, "height": 180}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn body_composition_entity_must_be_a_body_sensor() {
        let h = harness(json!({})).await;
        let err = h
            .handlers
            .dispatch("add_body_composition", json!({"weight": 70.0, "entity_id": "total_steps"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);

        h.handlers
            .dispatch("add_body_composition", json!({"weight": 70.0, "entity_id": "weight"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn set_active_gear_rejects_unlisted_activity_type() {
        let h = harness(gear_data()).await;
        let err = h
            .handlers
            .dispatch(
                "set_active_gear",
                json!({"activity_type": "skiing", "setting": "set this as default, unset others",
                       "gear_uuid": "g1"}),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn set_active_gear_unsets_others_first() {
        let h = harness(gear_data()).await;
        h.client
            .respond(
                "get_gear_defaults",
                json!([
                    {"uuid": "g2", "activityTypePk": 1, "defaultGear": true},
                    {"uuid": "g2", "activityTypePk": 2, "defaultGear": true},
                    {"uuid": "g1", "activityTypePk": 1, "defaultGear": false}
                ]),
            )
            .await;
        h.handlers
            .dispatch(
                "set_active_gear",
                json!({"activity_type": "running", "setting": "set this as default, unset others",
                       "entity_id": "gear_g1"}),
            )
            .await
            .unwrap();

        let writes = h.client.writes().await;
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].1, json!({"activity_type_id": 1, "gear_uuid": "g2", "default": false}));
        assert_eq!(writes[1].1, json!({"activity_type_id": 1, "gear_uuid": "g1", "default": true}));
        assert_eq!(h.client.calls("get_activity_types").await, 0);
    }

    #[tokio::test]
    async fn set_active_gear_unknown_gear_is_reference_error() {
        let h = harness(gear_data()).await;
        let err = h
            .handlers
            .dispatch(
                "set_active_gear",
                json!({"activity_type": "running", "setting": "set as default", "gear_uuid": "nope"}),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
    }

    #[tokio::test]
    async fn create_activity_sends_millisecond_start() {
        let h = harness(json!({})).await;
        h.handlers
            .dispatch(
                "create_activity",
                json!({"activity_name": "Lunch walk", "activity_type": "walking",
                       "start_datetime": "2025-03-05T12:15:00", "duration_min": 30,
                       "distance_km": 2.5}),
            )
            .await
            .unwrap();
        let writes = h.client.writes().await;
        assert_eq!(writes[0].1["startTimeLocal"], "2025-03-05T12:15:00.000");
        assert_eq!(writes[0].1["timeZone"], "Europe/Amsterdam");
    }

    #[tokio::test]
    async fn upload_requires_existing_supported_file() {
        let h = harness(json!({})).await;
        let err = h
            .handlers
            .dispatch("upload_activity", json!({"file_path": "/tmp/does-not-exist.fit"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = h
            .handlers
            .dispatch("upload_activity", json!({"file_path": "notes.txt"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn upload_rejects_directories_and_unreadable_files() {
        let h = harness(json!({})).await;
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("ride.fit");
        std::fs::create_dir(&folder).unwrap();
        let err = h
            .handlers
            .dispatch("upload_activity", json!({"file_path": folder.display().to_string()}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let locked = dir.path().join("locked.fit");
            std::fs::write(&locked, b".FIT").unwrap();
            std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
            // Privileged users can still open it, in which case there is nothing to check.
            if std::fs::File::open(&locked).is_err() {
                let err = h
                    .handlers
                    .dispatch("upload_activity", json!({"file_path": locked.display().to_string()}))
                    .await
                    .unwrap_err();
                assert_eq!(err.kind(), ErrorKind::Validation);
            }
        }
        assert_eq!(h.client.calls("upload_activity").await, 0);
    }

    #[tokio::test]
    async fn upstream_rejection_is_reported() {
        let h = harness(gear_data()).await;
        h.client
            .fail("add_gear_to_activity", || GarminError::Status { status: 400, body: "bad link".into() })
            .await;
        let err = h
            .handlers
            .dispatch("add_gear_to_activity", json!({"activity_id": 99, "gear_uuid": "g1"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert!(err.to_string().contains("bad link"));
    }

    #[tokio::test]
    async fn unknown_action_is_reference_error() {
        let h = harness(json!({})).await;
        let err = h.handlers.dispatch("reboot_watch", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
    }

    #[test]
    fn resolve_naive_timestamp_in_zone() {
        let ts = resolve_timestamp(Some("2025-07-01 08:00:00"), chrono_tz::Europe::Amsterdam, now()).unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-07-01T08:00:00+02:00");
        assert!(resolve_timestamp(Some("soon"), chrono_tz::UTC, now()).is_err());
    }

    #[test]
    fn every_action_has_a_schema() {
        for kind in ActionKind::ALL {
            assert!(kind.schema().is_object(), "{kind}");
        }
    }
}
