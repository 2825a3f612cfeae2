//! Sensor groups: user-facing toggles over the catalog.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::catalog::{self, SensorDefinition};
use crate::snapshot::Category;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SensorGroup {
    ActivitySteps,
    Calories,
    HeartRate,
    Stress,
    Sleep,
    BodyBattery,
    BodyComposition,
    Hydration,
    HealthMonitoring,
    FitnessPerformance,
    MenstrualCycle,
    Gear,
    ActivityTracking,
    Advanced,
}

impl SensorGroup {
    pub const ALL: [SensorGroup; 14] = [
        SensorGroup::ActivitySteps,
        SensorGroup::Calories,
        SensorGroup::HeartRate,
        SensorGroup::Stress,
        SensorGroup::Sleep,
        SensorGroup::BodyBattery,
        SensorGroup::BodyComposition,
        SensorGroup::Hydration,
        SensorGroup::HealthMonitoring,
        SensorGroup::FitnessPerformance,
        SensorGroup::MenstrualCycle,
        SensorGroup::Gear,
        SensorGroup::ActivityTracking,
        SensorGroup::Advanced,
    ];

    pub fn id(self) -> &'static str {
        match self {
            SensorGroup::ActivitySteps => "activity_steps",
            SensorGroup::Calories => "calories",
            SensorGroup::HeartRate => "heart_rate",
            SensorGroup::Stress => "stress",
            SensorGroup::Sleep => "sleep",
            SensorGroup::BodyBattery => "body_battery",
            SensorGroup::BodyComposition => "body_composition",
            SensorGroup::Hydration => "hydration",
            SensorGroup::HealthMonitoring => "health_monitoring",
            SensorGroup::FitnessPerformance => "fitness_performance",
            SensorGroup::MenstrualCycle => "menstrual_cycle",
            SensorGroup::Gear => "gear",
            SensorGroup::ActivityTracking => "activity_tracking",
            SensorGroup::Advanced => "advanced",
        }
    }

    pub fn enabled_by_default(self) -> bool {
        !matches!(self, SensorGroup::Advanced)
    }

    /// Static sensors of the group. Gear entities are dynamic, so the gear
    /// group has none.
    pub fn sensors(self) -> &'static [SensorDefinition] {
        match self {
            SensorGroup::ActivitySteps => catalog::ACTIVITY_STEPS,
            SensorGroup::Calories => catalog::CALORIES,
            SensorGroup::HeartRate => catalog::HEART_RATE,
            SensorGroup::Stress => catalog::STRESS,
            SensorGroup::Sleep => catalog::SLEEP,
            SensorGroup::BodyBattery => catalog::BODY_BATTERY,
            SensorGroup::BodyComposition => catalog::BODY_COMPOSITION,
            SensorGroup::Hydration => catalog::HYDRATION,
            SensorGroup::HealthMonitoring => catalog::HEALTH_MONITORING,
            SensorGroup::FitnessPerformance => catalog::FITNESS_PERFORMANCE,
            SensorGroup::MenstrualCycle => catalog::MENSTRUAL_CYCLE,
            SensorGroup::Gear => &[],
            SensorGroup::ActivityTracking => catalog::ACTIVITY_TRACKING,
            SensorGroup::Advanced => catalog::ADVANCED,
        }
    }

    pub fn default_groups() -> Vec<SensorGroup> {
        Self::ALL
            .into_iter()
            .filter(|g| g.enabled_by_default())
            .collect()
    }
}

impl fmt::Display for SensorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for SensorGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|g| g.id() == wanted)
            .ok_or_else(|| format!("unknown sensor group '{wanted}'"))
    }
}

/// Sensors for the given groups, in catalog order. `None` selects the
/// groups that are on by default.
pub fn get_sensors_for_groups(groups: Option<&[SensorGroup]>) -> Vec<&'static SensorDefinition> {
    let defaults;
    let groups = match groups {
        Some(g) => g,
        None => {
            defaults = SensorGroup::default_groups();
            &defaults
        }
    };
    SensorGroup::ALL
        .into_iter()
        .filter(|g| groups.contains(g))
        .flat_map(|g| g.sensors().iter())
        .collect()
}

/// Upstream categories needed to serve the given groups.
pub fn categories_for_groups(groups: &[SensorGroup]) -> Vec<Category> {
    let mut categories: Vec<Category> = get_sensors_for_groups(Some(groups))
        .into_iter()
        .map(|def| def.source)
        .collect();
    if groups.contains(&SensorGroup::Gear) {
        categories.push(Category::Gear);
    }
    categories.sort();
    categories.dedup();
    categories
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_selection_excludes_advanced() {
        let defaults = get_sensors_for_groups(None);
        assert!(defaults.iter().all(|d| d.key != "stressPercentage"));
        assert!(defaults.iter().any(|d| d.key == "totalSteps"));
        assert_eq!(defaults[0].key, "totalSteps");
    }

    #[test]
    fn default_selection_is_every_default_group_in_order() {
        let expected: Vec<&str> = SensorGroup::ALL
            .into_iter()
            .filter(|g| g.enabled_by_default())
            .flat_map(|g| g.sensors().iter().map(|d| d.key))
            .collect();
        let defaults: Vec<&str> = get_sensors_for_groups(None).iter().map(|d| d.key).collect();
        assert_eq!(defaults, expected);
        assert_eq!(defaults.len(), 105);
        assert_eq!(SensorGroup::Advanced.sensors().len(), 20);
    }

    #[test]
    fn enabled_sensors_never_sit_in_opt_in_groups() {
        for group in SensorGroup::ALL {
            for def in group.sensors() {
                assert!(
                    !def.enabled_by_default || group.enabled_by_default(),
                    "{} is enabled by default but lives in {group}",
                    def.key
                );
            }
        }
    }

    #[test]
    fn explicit_selection_keeps_catalog_order() {
        let picked = get_sensors_for_groups(Some(&[SensorGroup::Sleep, SensorGroup::Calories]));
        assert_eq!(picked[0].key, "totalKilocalories");
        assert_eq!(picked.last().map(|d| d.key), Some("awakeSleepSeconds"));
    }

    #[test]
    fn gear_group_has_no_static_sensors() {
        assert!(get_sensors_for_groups(Some(&[SensorGroup::Gear])).is_empty());
        let categories = categories_for_groups(&[SensorGroup::Gear]);
        assert_eq!(categories, vec![Category::Gear]);
    }

    #[test]
    fn parse_group_ids() {
        assert_eq!("heart_rate".parse::<SensorGroup>(), Ok(SensorGroup::HeartRate));
        assert_eq!(" gear ".parse::<SensorGroup>(), Ok(SensorGroup::Gear));
        assert!("hearts".parse::<SensorGroup>().is_err());
    }

    #[test]
    fn categories_follow_selected_sensors() {
        let categories = categories_for_groups(&[SensorGroup::HeartRate]);
        assert_eq!(categories, vec![Category::Summary, Category::Hrv]);
    }
}
