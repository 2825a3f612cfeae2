//! Static sensor catalog.
//!
//! One slice per [`SensorGroup`](crate::groups::SensorGroup); the order of
//! entries is the entity order and must stay stable.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::snapshot::{Category, Snapshot};

/// Keys kept when an activity is exposed as an attribute.
pub const ACTIVITY_ESSENTIAL_KEYS: [&str; 25] = [
    "activityId",
    "activityName",
    "startTimeLocal",
    "startTimeGMT",
    "duration",
    "movingDuration",
    "elapsedDuration",
    "distance",
    "averageSpeed",
    "maxSpeed",
    "locationName",
    "startLatitude",
    "startLongitude",
    "endLatitude",
    "endLongitude",
    "averageHR",
    "maxHR",
    "calories",
    "steps",
    "elevationGain",
    "elevationLoss",
    "averageRunningCadenceInStepsPerMinute",
    "maxRunningCadenceInStepsPerMinute",
    "activityType",
    "activityTypeDTO",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Distance,
    Duration,
    Weight,
    Timestamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    Measurement,
    Total,
}

/// How a sensor's value is read from a snapshot.
#[derive(Clone, Copy, Debug)]
pub enum Extract {
    /// The snapshot field named by the sensor key.
    Field,
    /// The keyed field, seconds converted to minutes.
    Minutes,
    /// The keyed field, grams converted to kilograms.
    Kilograms,
    /// The keyed string field with its first letter upper-cased.
    Capitalized,
    /// A JSON pointer into the snapshot, e.g. `/hrvStatus/weeklyAvg`.
    Pointer(&'static str),
    /// Length of the array stored under the given field.
    Count(&'static str),
    With(fn(&Snapshot) -> Option<Value>),
}

pub type AttributesFn = fn(&Snapshot) -> Map<String, Value>;

#[derive(Clone, Copy, Debug)]
pub struct SensorDefinition {
    pub key: &'static str,
    pub translation_key: &'static str,
    pub unit: Option<&'static str>,
    pub device_class: Option<DeviceClass>,
    pub state_class: Option<StateClass>,
    pub icon: &'static str,
    pub source: Category,
    pub extract: Extract,
    pub attributes: Option<AttributesFn>,
    pub enabled_by_default: bool,
    pub preserve_value: bool,
    pub diagnostic: bool,
}

const fn sensor(key: &'static str, translation_key: &'static str, source: Category) -> SensorDefinition {
    SensorDefinition {
        key,
        translation_key,
        unit: None,
        device_class: None,
        state_class: None,
        icon: "mdi:information-outline",
        source,
        extract: Extract::Field,
        attributes: None,
        enabled_by_default: true,
        preserve_value: false,
        diagnostic: false,
    }
}

impl SensorDefinition {
    const fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    const fn icon(mut self, icon: &'static str) -> Self {
        self.icon = icon;
        self
    }

    const fn class(mut self, class: DeviceClass) -> Self {
        self.device_class = Some(class);
        self
    }

    const fn measurement(mut self) -> Self {
        self.state_class = Some(StateClass::Measurement);
        self
    }

    const fn total(mut self) -> Self {
        self.state_class = Some(StateClass::Total);
        self
    }

    const fn extract(mut self, extract: Extract) -> Self {
        self.extract = extract;
        self
    }

    const fn attributes(mut self, f: AttributesFn) -> Self {
        self.attributes = Some(f);
        self
    }

    const fn disabled(mut self) -> Self {
        self.enabled_by_default = false;
        self
    }

    const fn preserve(mut self) -> Self {
        self.preserve_value = true;
        self
    }

    const fn diagnostic(mut self) -> Self {
        self.diagnostic = true;
        self
    }

    /// Stable entity id.
    pub fn entity_id(&self) -> &'static str {
        self.translation_key
    }

    /// Human-readable name derived from the translation key.
    pub fn display_name(&self) -> String {
        let spaced = self.translation_key.replace('_', " ");
        capitalize(&spaced)
    }

    // Minute durations.
    const fn minutes(self) -> Self {
        self.class(DeviceClass::Duration)
            .total()
            .unit(MINUTES)
            .extract(Extract::Minutes)
    }

    const fn timestamp(self) -> Self {
        self.class(DeviceClass::Timestamp)
    }
}

pub(crate) fn capitalize(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

const STEPS: &str = "steps";
const METERS: &str = "m";
const KCAL: &str = "kcal";
const BPM: &str = "bpm";
const MS: &str = "ms";
const MINUTES: &str = "min";
const PERCENT: &str = "%";
const KG: &str = "kg";
const ML: &str = "mL";
const YEARS: &str = "years";
const DAYS: &str = "days";
const FLOORS: &str = "floors";

use Category as C;
use DeviceClass::{Distance, Weight};

// === Attribute helpers ===

fn object_without(snapshot: &Snapshot, key: &str, exclude: &str) -> Map<String, Value> {
    snapshot
        .get(key)
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter(|(k, _)| k.as_str() != exclude)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
}

fn object_at(snapshot: &Snapshot, key: &str) -> Map<String, Value> {
    snapshot
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// Reduce an activity to its essential keys, with the type as its key string.
pub fn trim_activity(activity: &Value) -> Value {
    let Some(obj) = activity.as_object() else {
        return json!({});
    };
    let mut trimmed: Map<String, Value> = obj
        .iter()
        .filter(|(k, _)| ACTIVITY_ESSENTIAL_KEYS.contains(&k.as_str()) && k.as_str() != "activityTypeDTO")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if let Some(kind) = trimmed.get_mut("activityType")
        && kind.is_object()
    {
        let key = kind
            .get("typeKey")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        *kind = Value::String(key);
    }
    Value::Object(trimmed)
}

fn hrv_status_value(snapshot: &Snapshot) -> Option<Value> {
    let status = snapshot
        .get("hrvStatus")?
        .get("status")?
        .as_str()
        .filter(|s| !s.is_empty())?;
    Some(Value::String(capitalize(status)))
}

fn hrv_status_attributes(snapshot: &Snapshot) -> Map<String, Value> {
    object_without(snapshot, "hrvStatus", "status")
}

fn hrv_baseline_attributes(snapshot: &Snapshot) -> Map<String, Value> {
    snapshot
        .get("hrvStatus")
        .and_then(|s| s.get("baseline"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn endurance_attributes(snapshot: &Snapshot) -> Map<String, Value> {
    object_without(snapshot, "enduranceScore", "overallScore")
}

fn hill_attributes(snapshot: &Snapshot) -> Map<String, Value> {
    object_without(snapshot, "hillScore", "overallScore")
}

fn next_alarm_attributes(snapshot: &Snapshot) -> Map<String, Value> {
    let mut attrs = Map::new();
    attrs.insert(
        "next_alarms".into(),
        snapshot.get("nextAlarm").cloned().unwrap_or(Value::Null),
    );
    attrs
}

fn last_activity_attributes(snapshot: &Snapshot) -> Map<String, Value> {
    match snapshot.get("lastActivity").map(trim_activity) {
        Some(Value::Object(obj)) => obj,
        _ => Map::new(),
    }
}

fn last_activities_attributes(snapshot: &Snapshot) -> Map<String, Value> {
    let mut list: Vec<&Value> = snapshot
        .get("lastActivities")
        .and_then(Value::as_array)
        .map(|l| l.iter().collect())
        .unwrap_or_default();
    list.sort_by_key(|a| a.get("activityId").and_then(Value::as_i64).unwrap_or(0));
    let start = list.len().saturating_sub(10);
    let trimmed: Vec<Value> = list[start..].iter().map(|a| trim_activity(a)).collect();
    let mut attrs = Map::new();
    attrs.insert("last_activities".into(), Value::Array(trimmed));
    attrs
}

fn last_workout_attributes(snapshot: &Snapshot) -> Map<String, Value> {
    object_at(snapshot, "lastWorkout")
}

fn last_workouts_attributes(snapshot: &Snapshot) -> Map<String, Value> {
    let list = snapshot
        .get("workouts")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let start = list.len().saturating_sub(10);
    let mut attrs = Map::new();
    attrs.insert("last_workouts".into(), Value::Array(list[start..].to_vec()));
    attrs
}

/// Training readiness arrives either as an object or as a list of entries.
fn training_readiness_entry(snapshot: &Snapshot) -> Option<&Value> {
    match snapshot.get("trainingReadiness")? {
        Value::Array(list) => list.first(),
        obj @ Value::Object(_) => Some(obj),
        _ => None,
    }
}

fn training_readiness_value(snapshot: &Snapshot) -> Option<Value> {
    training_readiness_entry(snapshot)?
        .get("score")
        .filter(|v| !v.is_null())
        .cloned()
}

fn training_readiness_attributes(snapshot: &Snapshot) -> Map<String, Value> {
    training_readiness_entry(snapshot)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn training_status_attributes(snapshot: &Snapshot) -> Map<String, Value> {
    object_at(snapshot, "trainingStatus")
}

fn lactate_threshold_attributes(snapshot: &Snapshot) -> Map<String, Value> {
    object_at(snapshot, "lactateThreshold")
}

fn badges_attributes(snapshot: &Snapshot) -> Map<String, Value> {
    let mut list: Vec<Value> = snapshot
        .get("badges")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    list.sort_by(|a, b| {
        let date = |v: &Value| {
            v.get("badgeEarnedDate")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        date(a).cmp(&date(b))
    });
    let start = list.len().saturating_sub(10);
    let mut attrs = Map::new();
    attrs.insert("badges".into(), Value::Array(list.split_off(start)));
    attrs
}

fn menstrual_phase_attributes(snapshot: &Snapshot) -> Map<String, Value> {
    object_without(snapshot, "menstrualData", "currentPhase")
}

// === Groups ===

pub static ACTIVITY_STEPS: &[SensorDefinition] = &[
    sensor("totalSteps", "total_steps", C::Summary).total().unit(STEPS).icon("mdi:walk"),
    sensor("dailyStepGoal", "daily_step_goal", C::Summary).total().unit(STEPS).icon("mdi:target"),
    sensor("yesterdaySteps", "yesterday_steps", C::DailySteps).total().unit(STEPS).icon("mdi:walk"),
    sensor("weeklyStepAvg", "weekly_step_avg", C::DailySteps).measurement().unit(STEPS).icon("mdi:chart-line"),
    sensor("yesterdayDistance", "yesterday_distance", C::DailySteps)
        .class(Distance)
        .total()
        .unit(METERS)
        .icon("mdi:map-marker-distance"),
    sensor("weeklyDistanceAvg", "weekly_distance_avg", C::DailySteps)
        .class(Distance)
        .measurement()
        .unit(METERS)
        .icon("mdi:chart-line"),
    sensor("totalDistanceMeters", "total_distance", C::Summary)
        .class(Distance)
        .total()
        .unit(METERS)
        .icon("mdi:walk"),
    sensor("floorsAscended", "floors_ascended", C::Summary).total().unit(FLOORS).icon("mdi:stairs-up"),
    sensor("floorsDescended", "floors_descended", C::Summary).total().unit(FLOORS).icon("mdi:stairs-down"),
    sensor("userFloorsAscendedGoal", "floors_ascended_goal", C::Summary).total().unit(FLOORS).icon("mdi:target"),
    sensor("activeSeconds", "active_time", C::Summary).minutes().icon("mdi:fire"),
    sensor("highlyActiveSeconds", "highly_active_time", C::Summary).minutes().icon("mdi:fire").disabled(),
    sensor("sedentarySeconds", "sedentary_time", C::Summary).minutes().icon("mdi:seat"),
    sensor("moderateIntensityMinutes", "moderate_intensity", C::Summary)
        .class(DeviceClass::Duration)
        .total()
        .unit(MINUTES)
        .icon("mdi:flash-alert")
        .disabled(),
    sensor("vigorousIntensityMinutes", "vigorous_intensity", C::Summary)
        .class(DeviceClass::Duration)
        .total()
        .unit(MINUTES)
        .icon("mdi:run-fast")
        .disabled(),
    sensor("intensityMinutesGoal", "intensity_goal", C::Summary)
        .class(DeviceClass::Duration)
        .total()
        .unit(MINUTES)
        .icon("mdi:target")
        .disabled(),
];

pub static CALORIES: &[SensorDefinition] = &[
    sensor("totalKilocalories", "total_calories", C::Summary).total().unit(KCAL).icon("mdi:fire"),
    sensor("activeKilocalories", "active_calories", C::Summary).total().unit(KCAL).icon("mdi:fire"),
    sensor("bmrKilocalories", "bmr_calories", C::Summary).total().unit(KCAL).icon("mdi:fire-circle"),
    sensor("burnedKilocalories", "burned_calories", C::Summary).total().unit(KCAL).icon("mdi:fire"),
    sensor("consumedKilocalories", "consumed_calories", C::Summary).total().unit(KCAL).icon("mdi:food").disabled(),
    sensor("remainingKilocalories", "remaining_calories", C::Summary).total().unit(KCAL).icon("mdi:food").disabled(),
];

pub static HEART_RATE: &[SensorDefinition] = &[
    sensor("restingHeartRate", "resting_heart_rate", C::Summary).measurement().unit(BPM).icon("mdi:heart-pulse"),
    sensor("maxHeartRate", "max_heart_rate", C::Summary).measurement().unit(BPM).icon("mdi:heart-pulse"),
    sensor("minHeartRate", "min_heart_rate", C::Summary).measurement().unit(BPM).icon("mdi:heart-pulse"),
    sensor("lastSevenDaysAvgRestingHeartRate", "last_7_days_avg_resting_heart_rate", C::Summary)
        .measurement()
        .unit(BPM)
        .icon("mdi:heart-pulse")
        .disabled(),
    sensor("hrvStatus", "hrv_status", C::Hrv)
        .icon("mdi:heart-pulse")
        .extract(Extract::With(hrv_status_value))
        .attributes(hrv_status_attributes),
    sensor("hrvWeeklyAvg", "hrv_weekly_avg", C::Hrv)
        .measurement()
        .unit(MS)
        .icon("mdi:heart-pulse")
        .extract(Extract::Pointer("/hrvStatus/weeklyAvg")),
    sensor("hrvLastNightAvg", "hrv_last_night_avg", C::Hrv)
        .measurement()
        .unit(MS)
        .icon("mdi:heart-pulse")
        .extract(Extract::Pointer("/hrvStatus/lastNightAvg")),
    sensor("hrvLastNight5MinHigh", "hrv_last_night_5min_high", C::Hrv)
        .measurement()
        .unit(MS)
        .icon("mdi:heart-pulse")
        .extract(Extract::Pointer("/hrvStatus/lastNight5MinHigh")),
    sensor("hrvBaseline", "hrv_baseline", C::Hrv)
        .measurement()
        .unit(MS)
        .icon("mdi:heart-pulse")
        .extract(Extract::Pointer("/hrvStatus/baseline/lowUpper"))
        .attributes(hrv_baseline_attributes),
];

pub static STRESS: &[SensorDefinition] = &[
    sensor("averageStressLevel", "avg_stress_level", C::Summary).measurement().unit("level").icon("mdi:gauge"),
    sensor("maxStressLevel", "max_stress_level", C::Summary).measurement().unit("level").icon("mdi:gauge-full"),
    sensor("stressQualifier", "stress_qualifier", C::Summary)
        .icon("mdi:emoticon")
        .extract(Extract::Capitalized)
        .disabled(),
    sensor("totalStressDuration", "total_stress_duration", C::Summary).minutes().icon("mdi:timer"),
    sensor("restStressDuration", "rest_stress_duration", C::Summary).minutes().icon("mdi:timer-pause"),
    sensor("activityStressDuration", "activity_stress_duration", C::Summary).minutes().icon("mdi:timer-play"),
    sensor("lowStressDuration", "low_stress_duration", C::Summary).minutes().icon("mdi:timer-check"),
    sensor("mediumStressDuration", "medium_stress_duration", C::Summary).minutes().icon("mdi:timer-alert"),
    sensor("highStressDuration", "high_stress_duration", C::Summary).minutes().icon("mdi:timer-remove"),
];

pub static SLEEP: &[SensorDefinition] = &[
    sensor("sleepingSeconds", "sleeping_time", C::Summary).minutes().icon("mdi:sleep"),
    sensor("sleepTimeSeconds", "total_sleep_duration", C::Sleep).minutes().icon("mdi:sleep"),
    sensor("measurableAsleepDuration", "sleep_duration", C::Summary).minutes().icon("mdi:sleep"),
    sensor("measurableAwakeDuration", "awake_duration", C::Summary).minutes().icon("mdi:sleep-off"),
    sensor("sleepScore", "sleep_score", C::Sleep).measurement().icon("mdi:sleep"),
    sensor("deepSleepSeconds", "deep_sleep", C::Sleep).minutes().icon("mdi:sleep"),
    sensor("lightSleepSeconds", "light_sleep", C::Sleep).minutes().icon("mdi:sleep"),
    sensor("remSleepSeconds", "rem_sleep", C::Sleep).minutes().icon("mdi:sleep"),
    sensor("awakeSleepSeconds", "awake_sleep", C::Sleep).minutes().icon("mdi:sleep-off"),
];

pub static BODY_BATTERY: &[SensorDefinition] = &[
    sensor("bodyBatteryMostRecentValue", "body_battery_most_recent", C::Summary)
        .measurement()
        .unit(PERCENT)
        .icon("mdi:battery-heart"),
    sensor("bodyBatteryHighestValue", "body_battery_highest", C::Summary)
        .measurement()
        .unit(PERCENT)
        .icon("mdi:battery-charging-100"),
    sensor("bodyBatteryLowestValue", "body_battery_lowest", C::Summary)
        .measurement()
        .unit(PERCENT)
        .icon("mdi:battery-heart-outline"),
    sensor("bodyBatteryChargedValue", "body_battery_charged", C::Summary)
        .total()
        .unit(PERCENT)
        .icon("mdi:battery-plus"),
    sensor("bodyBatteryDrainedValue", "body_battery_drained", C::Summary)
        .total()
        .unit(PERCENT)
        .icon("mdi:battery-minus"),
];

pub static BODY_COMPOSITION: &[SensorDefinition] = &[
    sensor("weight", "weight", C::BodyComposition)
        .class(Weight)
        .measurement()
        .unit(KG)
        .icon("mdi:weight-kilogram")
        .extract(Extract::Kilograms)
        .preserve(),
    sensor("bmi", "bmi", C::BodyComposition).measurement().unit("BMI").icon("mdi:human").preserve(),
    sensor("bodyFat", "body_fat", C::BodyComposition).measurement().unit(PERCENT).icon("mdi:percent").preserve(),
    sensor("bodyWater", "body_water", C::BodyComposition)
        .measurement()
        .unit(PERCENT)
        .icon("mdi:water-percent")
        .preserve(),
    sensor("boneMass", "bone_mass", C::BodyComposition)
        .class(Weight)
        .measurement()
        .unit(KG)
        .icon("mdi:bone")
        .extract(Extract::Kilograms)
        .preserve(),
    sensor("muscleMass", "muscle_mass", C::BodyComposition)
        .class(Weight)
        .measurement()
        .unit(KG)
        .icon("mdi:dumbbell")
        .extract(Extract::Kilograms)
        .preserve(),
];

pub static HYDRATION: &[SensorDefinition] = &[
    sensor("valueInML", "hydration", C::Hydration).measurement().unit(ML).icon("mdi:water"),
    sensor("goalInML", "hydration_goal", C::Hydration).measurement().unit(ML).icon("mdi:water-check"),
    sensor("dailyAverageInML", "hydration_daily_average", C::Hydration).measurement().unit(ML).icon("mdi:water-sync"),
    sensor("sweatLossInML", "hydration_sweat_loss", C::Hydration).measurement().unit(ML).icon("mdi:water-minus"),
    sensor("activityIntakeInML", "hydration_activity_intake", C::Hydration)
        .measurement()
        .unit(ML)
        .icon("mdi:water-plus"),
];

pub static HEALTH_MONITORING: &[SensorDefinition] = &[
    sensor("averageSpo2", "avg_spo2", C::Summary).measurement().unit(PERCENT).icon("mdi:diabetes"),
    sensor("lowestSpo2", "lowest_spo2", C::Summary).measurement().unit(PERCENT).icon("mdi:diabetes"),
    sensor("latestSpo2", "latest_spo2", C::Summary).measurement().unit(PERCENT).icon("mdi:diabetes"),
    sensor("latestSpo2ReadingTimeLocal", "latest_spo2_time", C::Summary)
        .timestamp()
        .icon("mdi:clock")
        .disabled(),
    sensor("highestRespirationValue", "highest_respiration", C::Summary)
        .measurement()
        .unit("brpm")
        .icon("mdi:progress-clock")
        .disabled(),
    sensor("lowestRespirationValue", "lowest_respiration", C::Summary)
        .measurement()
        .unit("brpm")
        .icon("mdi:progress-clock")
        .disabled(),
    sensor("latestRespirationValue", "latest_respiration", C::Summary)
        .measurement()
        .unit("brpm")
        .icon("mdi:progress-clock")
        .disabled(),
    sensor("latestRespirationTimeGMT", "latest_respiration_time", C::Summary)
        .timestamp()
        .icon("mdi:clock")
        .disabled(),
    sensor("averageMonitoringEnvironmentAltitude", "avg_altitude", C::Summary)
        .measurement()
        .unit(METERS)
        .icon("mdi:image-filter-hdr")
        .disabled(),
    sensor("bpSystolic", "bp_systolic", C::BloodPressure).measurement().unit("mmHg").icon("mdi:heart-pulse").preserve(),
    sensor("bpDiastolic", "bp_diastolic", C::BloodPressure).measurement().unit("mmHg").icon("mdi:heart-pulse").preserve(),
    sensor("bpPulse", "bp_pulse", C::BloodPressure).measurement().unit(BPM).icon("mdi:heart").preserve(),
    sensor("bpMeasurementTime", "bp_measurement_time", C::BloodPressure)
        .timestamp()
        .icon("mdi:clock-outline")
        .preserve(),
];

pub static FITNESS_PERFORMANCE: &[SensorDefinition] = &[
    sensor("chronologicalAge", "chronological_age", C::FitnessAge).measurement().unit(YEARS).icon("mdi:calendar-heart"),
    sensor("fitnessAge", "fitness_age", C::FitnessAge).measurement().unit(YEARS).icon("mdi:calendar-heart"),
    sensor("achievableFitnessAge", "achievable_fitness_age", C::FitnessAge)
        .measurement()
        .unit(YEARS)
        .icon("mdi:calendar-heart"),
    sensor("previousFitnessAge", "previous_fitness_age", C::FitnessAge)
        .measurement()
        .unit(YEARS)
        .icon("mdi:calendar-heart"),
    sensor("metabolicAge", "metabolic_age", C::BodyComposition)
        .measurement()
        .unit(YEARS)
        .icon("mdi:calendar-heart")
        .preserve(),
    sensor("enduranceScore", "endurance_score", C::EnduranceScore)
        .measurement()
        .icon("mdi:run")
        .extract(Extract::Pointer("/enduranceScore/overallScore"))
        .attributes(endurance_attributes)
        .disabled(),
    sensor("hillScore", "hill_score", C::HillScore)
        .measurement()
        .icon("mdi:terrain")
        .extract(Extract::Pointer("/hillScore/overallScore"))
        .attributes(hill_attributes),
    sensor("physiqueRating", "physique_rating", C::BodyComposition).measurement().icon("mdi:numeric").preserve(),
    sensor("visceralFat", "visceral_fat", C::BodyComposition).measurement().unit(PERCENT).icon("mdi:food").preserve(),
];

pub static MENSTRUAL_CYCLE: &[SensorDefinition] = &[
    sensor("menstrualCyclePhase", "menstrual_cycle_phase", C::Menstrual)
        .icon("mdi:calendar-heart")
        .extract(Extract::Pointer("/menstrualData/currentPhase"))
        .attributes(menstrual_phase_attributes),
    sensor("menstrualCycleDay", "menstrual_cycle_day", C::Menstrual)
        .measurement()
        .icon("mdi:calendar-today")
        .extract(Extract::Pointer("/menstrualData/dayOfCycle")),
    sensor("menstrualPeriodDay", "menstrual_period_day", C::Menstrual)
        .measurement()
        .icon("mdi:water")
        .extract(Extract::Pointer("/menstrualData/dayOfPeriod")),
    sensor("menstrualCycleLength", "menstrual_cycle_length", C::Menstrual)
        .measurement()
        .unit(DAYS)
        .icon("mdi:calendar-range")
        .extract(Extract::Pointer("/menstrualData/cycleLength")),
    sensor("menstrualPeriodLength", "menstrual_period_length", C::Menstrual)
        .measurement()
        .unit(DAYS)
        .icon("mdi:calendar-clock")
        .extract(Extract::Pointer("/menstrualData/periodLength")),
];

pub static ACTIVITY_TRACKING: &[SensorDefinition] = &[
    sensor("nextAlarm", "next_alarm", C::Alarms)
        .timestamp()
        .icon("mdi:alarm")
        .extract(Extract::Pointer("/nextAlarm/0"))
        .attributes(next_alarm_attributes),
    sensor("lastActivity", "last_activity", C::Activities)
        .icon("mdi:walk")
        .extract(Extract::Pointer("/lastActivity/activityName"))
        .attributes(last_activity_attributes)
        .disabled(),
    sensor("lastActivities", "last_activities", C::Activities)
        .total()
        .icon("mdi:numeric")
        .extract(Extract::Count("lastActivities"))
        .attributes(last_activities_attributes)
        .disabled(),
    sensor("lastWorkout", "last_workout", C::Workouts)
        .icon("mdi:dumbbell")
        .extract(Extract::Pointer("/lastWorkout/workoutName"))
        .attributes(last_workout_attributes)
        .disabled(),
    sensor("lastWorkouts", "last_workouts", C::Workouts)
        .total()
        .icon("mdi:dumbbell")
        .extract(Extract::Count("workouts"))
        .attributes(last_workouts_attributes)
        .disabled(),
    sensor("trainingReadiness", "training_readiness", C::TrainingReadiness)
        .unit(PERCENT)
        .icon("mdi:run-fast")
        .extract(Extract::With(training_readiness_value))
        .attributes(training_readiness_attributes)
        .disabled(),
    sensor("trainingStatus", "training_status", C::TrainingStatus)
        .icon("mdi:chart-line")
        .extract(Extract::Pointer("/trainingStatus/trainingStatusPhrase"))
        .attributes(training_status_attributes)
        .disabled(),
    sensor("lactateThresholdHeartRate", "lactate_threshold_hr", C::LactateThreshold)
        .unit(BPM)
        .icon("mdi:heart-pulse")
        .extract(Extract::Pointer("/lactateThreshold/speed_and_heart_rate/heartRate"))
        .attributes(lactate_threshold_attributes)
        .disabled(),
    sensor("lactateThresholdSpeed", "lactate_threshold_speed", C::LactateThreshold)
        .unit("m/s")
        .icon("mdi:speedometer")
        .extract(Extract::Pointer("/lactateThreshold/speed_and_heart_rate/speed"))
        .attributes(lactate_threshold_attributes)
        .disabled(),
    sensor("badges", "badges", C::Badges)
        .total()
        .icon("mdi:medal")
        .extract(Extract::Count("badges"))
        .attributes(badges_attributes)
        .disabled(),
    sensor("userPoints", "user_points", C::Badges).total().icon("mdi:counter").disabled(),
    sensor("userLevel", "user_level", C::Badges).total().icon("mdi:star-four-points-circle").disabled(),
    sensor("lastSyncTimestampGMT", "device_last_synced", C::Summary)
        .timestamp()
        .icon("mdi:sync")
        .diagnostic(),
];

pub static ADVANCED: &[SensorDefinition] = &[
    sensor("minAvgHeartRate", "min_avg_heart_rate", C::Summary).measurement().unit(BPM).icon("mdi:heart-pulse").disabled(),
    sensor("maxAvgHeartRate", "max_avg_heart_rate", C::Summary).measurement().unit(BPM).icon("mdi:heart-pulse").disabled(),
    sensor("abnormalHeartRateAlertsCount", "abnormal_hr_alerts", C::Summary).total().icon("mdi:heart-pulse").disabled(),
    sensor("stressPercentage", "stress_percentage", C::Summary).measurement().unit(PERCENT).icon("mdi:flash-alert").disabled(),
    sensor("restStressPercentage", "rest_stress_percentage", C::Summary)
        .measurement()
        .unit(PERCENT)
        .icon("mdi:flash-alert")
        .disabled(),
    sensor("activityStressPercentage", "activity_stress_percentage", C::Summary)
        .measurement()
        .unit(PERCENT)
        .icon("mdi:flash-alert")
        .disabled(),
    sensor("uncategorizedStressPercentage", "uncategorized_stress_percentage", C::Summary)
        .measurement()
        .unit(PERCENT)
        .icon("mdi:flash-alert")
        .disabled(),
    sensor("lowStressPercentage", "low_stress_percentage", C::Summary)
        .measurement()
        .unit(PERCENT)
        .icon("mdi:flash-alert")
        .disabled(),
    sensor("mediumStressPercentage", "medium_stress_percentage", C::Summary)
        .measurement()
        .unit(PERCENT)
        .icon("mdi:flash-alert")
        .disabled(),
    sensor("highStressPercentage", "high_stress_percentage", C::Summary)
        .measurement()
        .unit(PERCENT)
        .icon("mdi:flash-alert")
        .disabled(),
    sensor("uncategorizedStressDuration", "uncategorized_stress_duration", C::Summary)
        .minutes()
        .icon("mdi:flash-alert")
        .disabled(),
    sensor("stressDuration", "stress_duration", C::Summary).minutes().icon("mdi:flash-alert").disabled(),
    sensor("floorsAscendedInMeters", "floors_ascended_meters", C::Summary)
        .class(Distance)
        .total()
        .unit(METERS)
        .icon("mdi:stairs-up")
        .disabled(),
    sensor("floorsDescendedInMeters", "floors_descended_meters", C::Summary)
        .class(Distance)
        .total()
        .unit(METERS)
        .icon("mdi:stairs-down")
        .disabled(),
    sensor("wellnessStartTimeLocal", "wellness_start_time", C::Summary).timestamp().icon("mdi:clock").disabled(),
    sensor("wellnessEndTimeLocal", "wellness_end_time", C::Summary).timestamp().icon("mdi:clock").disabled(),
    sensor("wellnessDescription", "wellness_description", C::Summary).icon("mdi:text").disabled(),
    sensor("wellnessDistanceMeters", "wellness_distance", C::Summary)
        .class(Distance)
        .total()
        .unit(METERS)
        .icon("mdi:walk")
        .disabled(),
    sensor("wellnessActiveKilocalories", "wellness_active_calories", C::Summary).total().unit(KCAL).icon("mdi:fire").disabled(),
    sensor("wellnessKilocalories", "wellness_calories", C::Summary).total().unit(KCAL).icon("mdi:fire").disabled(),
];
