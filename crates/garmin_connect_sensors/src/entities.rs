//! Entity registry: the set of live sensor entities and their last state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{RwLock, watch};

use crate::catalog::{DeviceClass, SensorDefinition, StateClass};
use crate::coordinator::{CoordinatorState, RefreshStatus};
use crate::gear::{GEAR_UNIT, GearEntity, GearIndex, project_gear};
use crate::groups::{SensorGroup, get_sensors_for_groups};
use crate::projection::{SensorState, project};
use crate::snapshot::Snapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Sensor,
    Gear,
}

/// Serializable view of one entity.
#[derive(Clone, Debug, Serialize)]
pub struct EntityView {
    pub entity_id: String,
    pub name: String,
    pub kind: EntityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gear_uuid: Option<String>,
    pub unit: Option<&'static str>,
    pub device_class: Option<DeviceClass>,
    pub state_class: Option<StateClass>,
    pub icon: &'static str,
    pub enabled: bool,
    pub diagnostic: bool,
    pub available: bool,
    pub value: Value,
    pub attributes: Map<String, Value>,
}

#[derive(Clone, Debug, Default)]
struct Slot {
    available: bool,
    value: Option<Value>,
    attributes: Map<String, Value>,
}

impl Slot {
    fn store(&mut self, state: SensorState, preserve: bool) {
        match state {
            SensorState::Available { value, attributes } => {
                self.available = true;
                self.value = Some(value);
                self.attributes = attributes;
            }
            SensorState::Unavailable if preserve && self.value.is_some() => {
                self.available = true;
            }
            SensorState::Unavailable => {
                self.available = false;
                self.value = None;
                self.attributes.clear();
            }
        }
    }
}

#[derive(Debug)]
struct SensorEntity {
    def: &'static SensorDefinition,
    order: usize,
    enabled: bool,
    slot: Slot,
}

/// Gear entities are enabled unless an override turns them off.
fn gear_override(overrides: &HashMap<String, bool>, entity_id: &str) -> bool {
    overrides.get(entity_id).copied().unwrap_or(true)
}

#[derive(Debug)]
struct GearSlot {
    entity: GearEntity,
    slot: Slot,
}

/// Entity ids added and removed by one update.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RegistryChanges {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

pub struct RegistryBuilder {
    groups: Option<Vec<SensorGroup>>,
    overrides: HashMap<String, bool>,
}

impl RegistryBuilder {
    pub fn groups(mut self, groups: Option<Vec<SensorGroup>>) -> Self {
        self.groups = groups;
        self
    }

    /// Per-entity enable/disable overrides, keyed by entity id.
    pub fn overrides(mut self, overrides: HashMap<String, bool>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn build(self) -> EntityRegistry {
        let defs = get_sensors_for_groups(self.groups.as_deref());
        let gear_enabled = self
            .groups
            .as_deref()
            .map_or(SensorGroup::Gear.enabled_by_default(), |g| {
                g.contains(&SensorGroup::Gear)
            });

        let menstrual: Vec<&str> = SensorGroup::MenstrualCycle
            .sensors()
            .iter()
            .map(|d| d.key)
            .collect();

        let mut sensors = Vec::new();
        let mut pending = Vec::new();
        for (order, def) in defs.into_iter().enumerate() {
            let enabled = self
                .overrides
                .get(def.entity_id())
                .copied()
                .unwrap_or(def.enabled_by_default);
            let entity = SensorEntity {
                def,
                order,
                enabled,
                slot: Slot::default(),
            };
            if menstrual.contains(&def.key) {
                pending.push(entity);
            } else {
                sensors.push(entity);
            }
        }

        EntityRegistry {
            sensors,
            pending_menstrual: pending,
            gear_enabled,
            gear_index: GearIndex::new(),
            gear: BTreeMap::new(),
            overrides: self.overrides,
            healthy: false,
            last_snapshot: None,
        }
    }
}

pub struct EntityRegistry {
    sensors: Vec<SensorEntity>,
    pending_menstrual: Vec<SensorEntity>,
    gear_enabled: bool,
    gear_index: GearIndex,
    gear: BTreeMap<String, GearSlot>,
    overrides: HashMap<String, bool>,
    healthy: bool,
    last_snapshot: Option<Arc<Snapshot>>,
}

impl EntityRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            groups: None,
            overrides: HashMap::new(),
        }
    }

    pub fn gear_enabled(&self) -> bool {
        self.gear_enabled
    }

    /// Catalog key of a static sensor entity.
    pub fn sensor_key(&self, entity_id: &str) -> Option<&'static str> {
        self.sensors
            .iter()
            .find(|s| s.def.entity_id() == entity_id)
            .map(|s| s.def.key)
    }

    /// Gear UUID behind a gear entity id.
    pub fn gear_uuid(&self, entity_id: &str) -> Option<&str> {
        self.gear
            .values()
            .find(|g| g.entity.entity_id() == entity_id)
            .map(|g| g.entity.uuid.as_str())
    }

    pub fn has_gear(&self, uuid: &str) -> bool {
        self.gear.contains_key(uuid)
    }

    pub fn len(&self) -> usize {
        self.sensors.len() + self.gear.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fold the coordinator's latest state into the entities.
    pub fn apply(&mut self, state: &CoordinatorState) -> RegistryChanges {
        let mut changes = RegistryChanges::default();
        self.healthy = state.status == RefreshStatus::Ok;

        let Some(snapshot) = state.snapshot.as_ref() else {
            return changes;
        };
        if !self.healthy {
            self.publish_gauge();
            return changes;
        }
        let fresh = self
            .last_snapshot
            .as_ref()
            .is_none_or(|last| !Arc::ptr_eq(last, snapshot));
        if !fresh {
            return changes;
        }
        self.last_snapshot = Some(snapshot.clone());

        if !self.pending_menstrual.is_empty() && snapshot.menstrual_tracking() {
            tracing::info!("menstrual cycle tracking detected, adding cycle sensors");
            for entity in self.pending_menstrual.drain(..) {
                changes.added.push(entity.def.entity_id().to_string());
                self.sensors.push(entity);
            }
            self.sensors.sort_by_key(|s| s.order);
        }

        for entity in &mut self.sensors {
            if entity.enabled {
                entity
                    .slot
                    .store(project(entity.def, snapshot), entity.def.preserve_value);
            }
        }

        if self.gear_enabled {
            self.apply_gear(snapshot, &mut changes);
        }

        self.publish_gauge();
        changes
    }

    fn apply_gear(&mut self, snapshot: &Snapshot, changes: &mut RegistryChanges) {
        let gear_changes = self.gear_index.observe(snapshot);
        for uuid in gear_changes.retired {
            if let Some(removed) = self.gear.remove(&uuid) {
                tracing::info!(uuid = %uuid, name = %removed.entity.name, "gear retired");
                changes.removed.push(removed.entity.entity_id());
            }
        }
        for entity in gear_changes.added {
            changes.added.push(entity.entity_id());
            self.gear.insert(
                entity.uuid.clone(),
                GearSlot {
                    entity,
                    slot: Slot::default(),
                },
            );
        }

        let present = |uuid: &str| {
            snapshot.gear().is_some_and(|items| {
                items
                    .iter()
                    .any(|g| g.get("uuid").and_then(Value::as_str) == Some(uuid))
            })
        };
        for (uuid, gear) in &mut self.gear {
            if let Some(current) = self.gear_index.get(uuid) {
                gear.entity = current.clone();
            }
            if !gear_override(&self.overrides, &gear.entity.entity_id()) {
                continue;
            }
            // Missing once: keep the last state until the index retires it.
            if !present(uuid) && gear.slot.value.is_some() {
                continue;
            }
            gear.slot.store(project_gear(uuid, snapshot), false);
        }
    }

    fn publish_gauge(&self) {
        metrics::gauge!("garmin_connect_active_entities").set(self.len() as f64);
    }

    pub fn views(&self) -> Vec<EntityView> {
        let mut out: Vec<EntityView> = self
            .sensors
            .iter()
            .map(|s| EntityView {
                entity_id: s.def.entity_id().to_string(),
                name: s.def.display_name(),
                kind: EntityKind::Sensor,
                key: Some(s.def.key),
                gear_uuid: None,
                unit: s.def.unit,
                device_class: s.def.device_class,
                state_class: s.def.state_class,
                icon: s.def.icon,
                enabled: s.enabled,
                diagnostic: s.def.diagnostic,
                available: self.healthy && s.enabled && s.slot.available,
                value: s.slot.value.clone().unwrap_or(Value::Null),
                attributes: s.slot.attributes.clone(),
            })
            .collect();

        out.extend(self.gear.values().map(|g| {
            let entity_id = g.entity.entity_id();
            let enabled = gear_override(&self.overrides, &entity_id);
            EntityView {
                enabled,
                name: g.entity.name.clone(),
                kind: EntityKind::Gear,
                key: None,
                gear_uuid: Some(g.entity.uuid.clone()),
                unit: Some(GEAR_UNIT),
                device_class: Some(DeviceClass::Distance),
                state_class: Some(StateClass::Total),
                icon: g.entity.icon,
                diagnostic: false,
                available: self.healthy && enabled && g.slot.available,
                value: g.slot.value.clone().unwrap_or(Value::Null),
                attributes: g.slot.attributes.clone(),
                entity_id,
            }
        }));
        out
    }

    pub fn view(&self, entity_id: &str) -> Option<EntityView> {
        self.views().into_iter().find(|v| v.entity_id == entity_id)
    }
}

/// Apply every coordinator publication to the registry until the coordinator
/// goes away.
pub async fn follow(registry: Arc<RwLock<EntityRegistry>>, mut updates: watch::Receiver<CoordinatorState>) {
    loop {
        let state = updates.borrow_and_update().clone();
        let changes = registry.write().await.apply(&state);
        if !changes.added.is_empty() || !changes.removed.is_empty() {
            tracing::info!(added = ?changes.added, removed = ?changes.removed, "entity set changed");
        }
        if updates.changed().await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::{NaiveDate, Utc};
    use serde_json::json;

    fn state(data: Value) -> CoordinatorState {
        let Value::Object(map) = data else {
            panic!("object expected")
        };
        let snapshot = Snapshot::new(
            Utc::now(),
            NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(),
            chrono_tz::UTC,
            map,
        );
        CoordinatorState {
            snapshot: Some(Arc::new(snapshot)),
            status: RefreshStatus::Ok,
            last_success: Some(Utc::now()),
            last_attempt: Some(Utc::now()),
        }
    }

    fn failed(previous: &CoordinatorState) -> CoordinatorState {
        CoordinatorState {
            status: RefreshStatus::Failed {
                kind: ErrorKind::TransientFetch,
                message: "timed out".into(),
            },
            ..previous.clone()
        }
    }

    #[test]
    fn failure_marks_unavailable_but_keeps_values() {
        let mut registry = EntityRegistry::builder().build();
        let ok = state(json!({"totalSteps": 5000}));
        registry.apply(&ok);
        assert!(registry.view("total_steps").unwrap().available);

        registry.apply(&failed(&ok));
        let view = registry.view("total_steps").unwrap();
        assert!(!view.available);
        assert_eq!(view.value, json!(5000));
    }

    #[test]
    fn preserve_value_survives_missing_field() {
        let mut registry = EntityRegistry::builder().build();
        registry.apply(&state(json!({"weight": 80000.0, "totalSteps": 1})));
        registry.apply(&state(json!({"totalSteps": 2})));
        let weight = registry.view("weight").unwrap();
        assert!(weight.available);
        assert_eq!(weight.value, json!(80.0));

        let steps_goal = registry.view("daily_step_goal").unwrap();
        assert!(!steps_goal.available);
    }

    #[test]
    fn menstrual_sensors_only_after_tracking_seen() {
        let mut registry = EntityRegistry::builder().build();
        registry.apply(&state(json!({"menstrualData": {}})));
        assert!(registry.view("menstrual_cycle_day").is_none());

        let changes = registry.apply(&state(json!({"menstrualData": {"dayOfCycle": 12}})));
        assert_eq!(changes.added.len(), 5);
        assert_eq!(registry.view("menstrual_cycle_day").unwrap().value, json!(12));
    }

    #[test]
    fn disabled_by_default_unless_overridden() {
        let registry = EntityRegistry::builder()
            .overrides(HashMap::from([("consumed_calories".to_string(), true)]))
            .build();
        assert!(registry.view("consumed_calories").unwrap().enabled);
        assert!(!registry.view("remaining_calories").unwrap().enabled);
    }

    #[test]
    fn gear_entities_follow_the_index() {
        let mut registry = EntityRegistry::builder().build();
        let with = json!({
            "gear": [{"uuid": "g1", "displayName": "Road bike", "gearTypeName": "Bike"}],
            "gearStats": [{"uuid": "g1", "totalDistance": 1500.0}]
        });
        let changes = registry.apply(&state(with));
        assert_eq!(changes.added, vec!["gear_g1".to_string()]);
        assert_eq!(registry.gear_uuid("gear_g1"), Some("g1"));

        registry.apply(&state(json!({"gear": [], "gearStats": []})));
        let view = registry.view("gear_g1").unwrap();
        assert!(view.available);
        assert_eq!(view.value, json!(1.5));

        let changes = registry.apply(&state(json!({"gear": [], "gearStats": []})));
        assert_eq!(changes.removed, vec!["gear_g1".to_string()]);
        assert!(registry.view("gear_g1").is_none());
    }

    #[test]
    fn disabled_gear_entity_is_not_projected() {
        let mut registry = EntityRegistry::builder()
            .overrides(HashMap::from([("gear_g1".to_string(), false)]))
            .build();
        registry.apply(&state(json!({
            "gear": [{"uuid": "g1", "displayName": "Road bike"}, {"uuid": "g2", "displayName": "Trail shoe"}],
            "gearStats": [
                {"uuid": "g1", "totalDistance": 1500.0},
                {"uuid": "g2", "totalDistance": 2500.0}
            ]
        })));

        let view = registry.view("gear_g1").unwrap();
        assert!(!view.enabled);
        assert!(!view.available);
        assert_eq!(view.value, Value::Null);
        assert_eq!(registry.view("gear_g2").unwrap().value, json!(2.5));
    }

    #[test]
    fn no_gear_when_group_not_selected() {
        let mut registry = EntityRegistry::builder()
            .groups(Some(vec![SensorGroup::Calories]))
            .build();
        assert!(!registry.gear_enabled());
        registry.apply(&state(json!({"gear": [{"uuid": "g1"}]})));
        assert!(registry.views().iter().all(|v| v.kind == EntityKind::Sensor));
    }

    #[tokio::test]
    async fn follow_applies_published_states() {
        let registry = Arc::new(RwLock::new(EntityRegistry::builder().build()));
        let (tx, rx) = watch::channel(CoordinatorState::default());
        let task = tokio::spawn(follow(registry.clone(), rx));

        tx.send_replace(state(json!({"totalSteps": 42})));
        for _ in 0..50 {
            if registry.read().await.view("total_steps").is_some_and(|v| v.available) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(registry.read().await.view("total_steps").unwrap().value, json!(42));

        drop(tx);
        task.await.unwrap();
    }
}
