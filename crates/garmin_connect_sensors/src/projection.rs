//! Project a snapshot onto sensor values.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use garmin_connect_client::utils::parse_local_datetime;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::catalog::{DeviceClass, Extract, SensorDefinition, capitalize};
use crate::snapshot::Snapshot;

/// Projected state of one sensor.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SensorState {
    Available {
        value: Value,
        attributes: Map<String, Value>,
    },
    Unavailable,
}

impl SensorState {
    pub fn is_available(&self) -> bool {
        matches!(self, SensorState::Available { .. })
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            SensorState::Available { value, .. } => Some(value),
            SensorState::Unavailable => None,
        }
    }
}

pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Round floats to two decimals; integers pass through.
fn normalize_number(value: Value) -> Value {
    match &value {
        Value::Number(n) if n.is_f64() => n
            .as_f64()
            .and_then(|f| Number::from_f64(round2(f)))
            .map(Value::Number)
            .unwrap_or(value),
        _ => value,
    }
}

fn scaled(value: Option<&Value>, divisor: f64) -> Option<Value> {
    let raw = value?.as_f64()?;
    Number::from_f64(round2(raw / divisor)).map(Value::Number)
}

/// Resolve a JSON pointer whose first segment is a snapshot field.
fn resolve_pointer<'a>(snapshot: &'a Snapshot, pointer: &str) -> Option<&'a Value> {
    let path = pointer.strip_prefix('/')?;
    match path.split_once('/') {
        Some((head, rest)) => snapshot
            .get(head)?
            .pointer(&format!("/{rest}"))
            .filter(|v| !v.is_null()),
        None => snapshot.get(path),
    }
}

/// Convert an upstream timestamp into an aware RFC 3339 string.
///
/// Naive values are taken as UTC when the field name ends in `GMT`,
/// otherwise as wall-clock time in the account zone. Numbers are epoch
/// milliseconds.
pub fn localize_timestamp(value: &Value, field: &str, tz: Tz) -> Option<String> {
    match value {
        Value::String(s) => {
            if let Ok(aware) = DateTime::parse_from_rfc3339(s) {
                return Some(aware.to_rfc3339());
            }
            let naive: NaiveDateTime = parse_local_datetime(s)?;
            if field.ends_with("GMT") {
                Some(Utc.from_utc_datetime(&naive).to_rfc3339())
            } else {
                tz.from_local_datetime(&naive)
                    .earliest()
                    .map(|at| at.to_rfc3339())
            }
        }
        Value::Number(n) => {
            let millis = n.as_i64()?;
            DateTime::<Utc>::from_timestamp_millis(millis).map(|at| at.to_rfc3339())
        }
        _ => None,
    }
}

fn extract_value(def: &SensorDefinition, snapshot: &Snapshot) -> Option<Value> {
    match def.extract {
        Extract::Field => snapshot.get(def.key).cloned(),
        Extract::Minutes => scaled(snapshot.get(def.key), 60.0),
        Extract::Kilograms => scaled(snapshot.get(def.key), 1000.0),
        Extract::Capitalized => snapshot
            .get(def.key)?
            .as_str()
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(capitalize(s))),
        Extract::Pointer(pointer) => resolve_pointer(snapshot, pointer).cloned(),
        Extract::Count(field) => snapshot
            .get(field)?
            .as_array()
            .map(|list| Value::from(list.len())),
        Extract::With(f) => f(snapshot).filter(|v| !v.is_null()),
    }
}

/// Project one sensor. Missing upstream data makes it unavailable; a zero
/// stays a zero.
pub fn project(def: &SensorDefinition, snapshot: &Snapshot) -> SensorState {
    let Some(raw) = extract_value(def, snapshot) else {
        return SensorState::Unavailable;
    };

    let value = if def.device_class == Some(DeviceClass::Timestamp) {
        match localize_timestamp(&raw, def.key, snapshot.time_zone) {
            Some(ts) => Value::String(ts),
            None => {
                tracing::debug!(sensor = def.key, value = %raw, "unparseable timestamp");
                return SensorState::Unavailable;
            }
        }
    } else {
        normalize_number(raw)
    };

    let attributes = def.attributes.map(|f| f(snapshot)).unwrap_or_default();
    SensorState::Available { value, attributes }
}
