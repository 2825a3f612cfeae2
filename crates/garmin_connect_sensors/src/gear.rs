//! Dynamic gear entities keyed by gear UUID.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::projection::{SensorState, round2};
use crate::snapshot::Snapshot;

pub const GEAR_UNIT: &str = "km";
const DEFAULT_GEAR_ICON: &str = "mdi:shoe-print";

/// Misses in a row before a gear entity is retired.
const RETIRE_AFTER: u8 = 2;

pub fn gear_icon(gear_type: &str) -> &'static str {
    match gear_type {
        "Shoes" => "mdi:shoe-sneaker",
        "Bike" => "mdi:bike",
        "Other" => "mdi:basketball",
        "Golf Clubs" => "mdi:golf",
        _ => DEFAULT_GEAR_ICON,
    }
}

fn str_field<'a>(item: &'a Value, key: &str) -> Option<&'a str> {
    item.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GearEntity {
    pub uuid: String,
    pub name: String,
    pub gear_type: String,
    pub icon: &'static str,
}

impl GearEntity {
    fn from_item(item: &Value) -> Option<Self> {
        let uuid = str_field(item, "uuid")?.to_string();
        let name = str_field(item, "displayName")
            .or_else(|| str_field(item, "customMakeModel"))
            .unwrap_or(&uuid)
            .to_string();
        let gear_type = str_field(item, "gearTypeName").unwrap_or("Other").to_string();
        Some(Self {
            icon: gear_icon(&gear_type),
            uuid,
            name,
            gear_type,
        })
    }

    pub fn entity_id(&self) -> String {
        format!("gear_{}", self.uuid)
    }
}

/// What changed in the index after observing a snapshot.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct GearChanges {
    pub added: Vec<GearEntity>,
    pub retired: Vec<String>,
}

impl GearChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.retired.is_empty()
    }
}

#[derive(Debug)]
struct Tracked {
    entity: GearEntity,
    misses: u8,
}

#[derive(Debug, Default)]
pub struct GearIndex {
    entries: BTreeMap<String, Tracked>,
}

impl GearIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create entities for new UUIDs and retire the ones missing from two
    /// gear lists in a row. A snapshot without a gear list changes nothing.
    pub fn observe(&mut self, snapshot: &Snapshot) -> GearChanges {
        let mut changes = GearChanges::default();
        let Some(items) = snapshot.gear() else {
            return changes;
        };

        let seen: Vec<GearEntity> = items.iter().filter_map(GearEntity::from_item).collect();

        for tracked in self.entries.values_mut() {
            if seen.iter().any(|g| g.uuid == tracked.entity.uuid) {
                tracked.misses = 0;
            } else {
                tracked.misses += 1;
            }
        }
        self.entries.retain(|uuid, tracked| {
            if tracked.misses >= RETIRE_AFTER {
                changes.retired.push(uuid.clone());
                false
            } else {
                true
            }
        });

        for entity in seen {
            if let Some(tracked) = self.entries.get_mut(&entity.uuid) {
                tracked.entity = entity;
                continue;
            }
            tracing::debug!(uuid = %entity.uuid, name = %entity.name, "new gear");
            changes.added.push(entity.clone());
            self.entries.insert(entity.uuid.clone(), Tracked { entity, misses: 0 });
        }
        changes
    }

    pub fn get(&self, uuid: &str) -> Option<&GearEntity> {
        self.entries.get(uuid).map(|t| &t.entity)
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.entries.contains_key(uuid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GearEntity> {
        self.entries.values().map(|t| &t.entity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn find_by_uuid<'a>(list: Option<&'a Value>, uuid: &str) -> Option<&'a Value> {
    list?
        .as_array()?
        .iter()
        .find(|item| item.get("uuid").and_then(Value::as_str) == Some(uuid))
}

/// Activity type keys this gear is the default for, joined, or `"None"`.
fn default_for_activity(snapshot: &Snapshot, uuid: &str) -> String {
    let type_ids: Vec<i64> = snapshot
        .get("gearDefaults")
        .and_then(Value::as_array)
        .map(|defaults| {
            defaults
                .iter()
                .filter(|d| d.get("uuid").and_then(Value::as_str) == Some(uuid))
                .filter(|d| d.get("defaultGear").and_then(Value::as_bool) == Some(true))
                .filter_map(|d| d.get("activityTypePk").and_then(Value::as_i64))
                .collect()
        })
        .unwrap_or_default();

    let names: Vec<&str> = snapshot
        .activity_types()
        .unwrap_or_default()
        .iter()
        .filter(|t| {
            t.get("typeId")
                .and_then(Value::as_i64)
                .is_some_and(|id| type_ids.contains(&id))
        })
        .filter_map(|t| t.get("typeKey").and_then(Value::as_str))
        .collect();

    if names.is_empty() {
        "None".to_string()
    } else {
        names.join(", ")
    }
}

/// Project one gear entity: total distance in kilometres plus gear details.
pub fn project_gear(uuid: &str, snapshot: &Snapshot) -> SensorState {
    let Some(item) = find_by_uuid(snapshot.get("gear"), uuid) else {
        return SensorState::Unavailable;
    };
    let Some(stats) = find_by_uuid(snapshot.get("gearStats"), uuid) else {
        return SensorState::Unavailable;
    };
    let Some(distance) = stats.get("totalDistance").and_then(Value::as_f64) else {
        return SensorState::Unavailable;
    };
    let Some(value) = Number::from_f64(round2(distance / 1000.0)).map(Value::Number) else {
        return SensorState::Unavailable;
    };

    let field = |source: &Value, key: &str| source.get(key).cloned().unwrap_or(Value::Null);
    let mut attributes = Map::new();
    attributes.insert(
        "last_synced".into(),
        snapshot.get("lastSyncTimestampGMT").cloned().unwrap_or(Value::Null),
    );
    attributes.insert("total_activities".into(), field(stats, "totalActivities"));
    attributes.insert("create_date".into(), field(stats, "createDate"));
    attributes.insert("update_date".into(), field(stats, "updateDate"));
    attributes.insert("date_begin".into(), field(item, "dateBegin"));
    attributes.insert("date_end".into(), field(item, "dateEnd"));
    attributes.insert("gear_make_name".into(), field(item, "gearMakeName"));
    attributes.insert("gear_model_name".into(), field(item, "gearModelName"));
    attributes.insert("gear_status_name".into(), field(item, "gearStatusName"));
    attributes.insert("custom_make_model".into(), field(item, "customMakeModel"));
    attributes.insert("maximum_meters".into(), field(item, "maximumMeters"));
    attributes.insert(
        "default_for_activity".into(),
        Value::String(default_for_activity(snapshot, uuid)),
    );

    SensorState::Available { value, attributes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use serde_json::json;

    fn snapshot(data: Value) -> Snapshot {
        let Value::Object(map) = data else {
            panic!("object expected")
        };
        Snapshot::new(
            Utc::now(),
            NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(),
            chrono_tz::UTC,
            map,
        )
    }

    fn with_gear(uuids: &[&str]) -> Snapshot {
        let gear: Vec<Value> = uuids
            .iter()
            .map(|u| json!({"uuid": u, "displayName": format!("Shoe {u}"), "gearTypeName": "Shoes"}))
            .collect();
        snapshot(json!({"gear": gear}))
    }

    #[test]
    fn icons_by_type() {
        assert_eq!(gear_icon("Bike"), "mdi:bike");
        assert_eq!(gear_icon("Skis"), DEFAULT_GEAR_ICON);
    }

    #[test]
    fn retire_only_after_two_consecutive_misses() {
        let mut index = GearIndex::new();
        let first = index.observe(&with_gear(&["a", "b"]));
        assert_eq!(first.added.len(), 2);

        let miss1 = index.observe(&with_gear(&["a"]));
        assert!(miss1.is_empty());
        assert!(index.contains("b"));

        let miss2 = index.observe(&with_gear(&["a"]));
        assert_eq!(miss2.retired, vec!["b".to_string()]);
        assert!(!index.contains("b"));
    }

    #[test]
    fn reappearance_resets_the_miss_count() {
        let mut index = GearIndex::new();
        index.observe(&with_gear(&["a"]));
        index.observe(&with_gear(&[]));
        index.observe(&with_gear(&["a"]));
        let changes = index.observe(&with_gear(&[]));
        assert!(changes.retired.is_empty());
        assert!(index.contains("a"));
    }

    #[test]
    fn snapshot_without_gear_list_is_not_a_miss() {
        let mut index = GearIndex::new();
        index.observe(&with_gear(&["a"]));
        index.observe(&with_gear(&[]));
        assert!(index.observe(&snapshot(json!({}))).is_empty());
        assert!(index.contains("a"));
    }

    #[test]
    fn project_distance_and_defaults() {
        let snap = snapshot(json!({
            "lastSyncTimestampGMT": "2025-03-05T06:00:00.0",
            "gear": [{"uuid": "a", "displayName": "Pegasus", "gearTypeName": "Shoes",
                      "gearMakeName": "Nike", "maximumMeters": 800000}],
            "gearStats": [{"uuid": "a", "totalDistance": 412345.6, "totalActivities": 51}],
            "gearDefaults": [
                {"uuid": "a", "activityTypePk": 1, "defaultGear": true},
                {"uuid": "a", "activityTypePk": 3, "defaultGear": false},
                {"uuid": "b", "activityTypePk": 9, "defaultGear": true}
            ],
            "activityTypes": [
                {"typeId": 1, "typeKey": "running"},
                {"typeId": 3, "typeKey": "hiking"},
                {"typeId": 9, "typeKey": "walking"}
            ]
        }));
        let SensorState::Available { value, attributes } = project_gear("a", &snap) else {
            panic!("expected a value")
        };
        assert_eq!(value, json!(412.35));
        assert_eq!(attributes["default_for_activity"], "running");
        assert_eq!(attributes["total_activities"], 51);
        assert_eq!(attributes["gear_make_name"], "Nike");

        assert_eq!(project_gear("zzz", &snap), SensorState::Unavailable);
    }

    #[test]
    fn no_defaults_reads_none() {
        let snap = snapshot(json!({
            "gear": [{"uuid": "a"}],
            "gearStats": [{"uuid": "a", "totalDistance": 0}]
        }));
        let SensorState::Available { value, attributes } = project_gear("a", &snap) else {
            panic!("expected a value")
        };
        assert_eq!(value, json!(0.0));
        assert_eq!(attributes["default_for_activity"], "None");
    }
}
