//! The immutable per-poll data snapshot and the rules that assemble it.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::{Map, Value, json};

use crate::alarms::next_active_alarms;

/// Badge points needed to reach each Garmin Connect level.
pub const LEVEL_POINTS: [(u32, i64); 10] = [
    (1, 0),
    (2, 20),
    (3, 60),
    (4, 140),
    (5, 300),
    (6, 620),
    (7, 1260),
    (8, 2540),
    (9, 5100),
    (10, 10220),
];

/// Upstream metric categories a poll can request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Summary,
    DailySteps,
    BodyComposition,
    Activities,
    Workouts,
    Badges,
    TrainingReadiness,
    TrainingStatus,
    LactateThreshold,
    Alarms,
    ActivityTypes,
    Sleep,
    Hrv,
    EnduranceScore,
    HillScore,
    Menstrual,
    Gear,
    FitnessAge,
    Hydration,
    BloodPressure,
}

impl Category {
    pub const ALL: [Category; 20] = [
        Category::Summary,
        Category::DailySteps,
        Category::BodyComposition,
        Category::Activities,
        Category::Workouts,
        Category::Badges,
        Category::TrainingReadiness,
        Category::TrainingStatus,
        Category::LactateThreshold,
        Category::Alarms,
        Category::ActivityTypes,
        Category::Sleep,
        Category::Hrv,
        Category::EnduranceScore,
        Category::HillScore,
        Category::Menstrual,
        Category::Gear,
        Category::FitnessAge,
        Category::Hydration,
        Category::BloodPressure,
    ];

    /// Optional categories may fail without failing the whole poll.
    pub fn is_optional(self) -> bool {
        matches!(
            self,
            Category::Workouts
                | Category::TrainingReadiness
                | Category::TrainingStatus
                | Category::LactateThreshold
                | Category::Menstrual
                | Category::BloodPressure
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Summary => "summary",
            Category::DailySteps => "daily_steps",
            Category::BodyComposition => "body_composition",
            Category::Activities => "activities",
            Category::Workouts => "workouts",
            Category::Badges => "badges",
            Category::TrainingReadiness => "training_readiness",
            Category::TrainingStatus => "training_status",
            Category::LactateThreshold => "lactate_threshold",
            Category::Alarms => "alarms",
            Category::ActivityTypes => "activity_types",
            Category::Sleep => "sleep",
            Category::Hrv => "hrv",
            Category::EnduranceScore => "endurance_score",
            Category::HillScore => "hill_score",
            Category::Menstrual => "menstrual",
            Category::Gear => "gear",
            Category::FitnessAge => "fitness_age",
            Category::Hydration => "hydration",
            Category::BloodPressure => "blood_pressure",
        }
    }
}

/// The set of categories a poll has to fetch.
///
/// The daily summary is always part of the plan: it carries the user
/// profile id and the last sync time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchPlan {
    categories: BTreeSet<Category>,
}

impl FetchPlan {
    pub fn full() -> Self {
        Self::from_categories(Category::ALL)
    }

    pub fn from_categories(categories: impl IntoIterator<Item = Category>) -> Self {
        let mut categories: BTreeSet<Category> = categories.into_iter().collect();
        categories.insert(Category::Summary);
        if categories.contains(&Category::Gear) {
            categories.insert(Category::ActivityTypes);
        }
        Self { categories }
    }

    pub fn contains(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        self.categories.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Raw upstream payloads from one poll, before merging.
#[derive(Clone, Debug, Default)]
pub struct RawFetch {
    pub summary: Option<Value>,
    pub daily_steps: Option<Value>,
    pub body_composition: Option<Value>,
    pub activities: Option<Value>,
    pub workouts: Option<Value>,
    pub badges: Option<Value>,
    pub training_readiness: Option<Value>,
    pub training_status: Option<Value>,
    pub lactate_threshold: Option<Value>,
    pub alarms: Option<Value>,
    pub activity_types: Option<Value>,
    pub sleep: Option<Value>,
    pub hrv: Option<Value>,
    pub endurance_score: Option<Value>,
    pub hill_score: Option<Value>,
    pub menstrual: Option<Value>,
    pub gear: Option<Value>,
    pub gear_stats: Vec<Value>,
    pub gear_defaults: Option<Value>,
    pub fitness_age: Option<Value>,
    pub hydration: Option<Value>,
    pub blood_pressure: Option<Value>,
}

/// Immutable aggregate of one poll cycle.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub fetched_at: DateTime<Utc>,
    pub date: NaiveDate,
    pub time_zone: Tz,
    data: Map<String, Value>,
}

impl Snapshot {
    pub fn new(
        fetched_at: DateTime<Utc>,
        date: NaiveDate,
        time_zone: Tz,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            fetched_at,
            date,
            time_zone,
            data,
        }
    }

    /// Field lookup; `null` counts as missing.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key).filter(|v| !v.is_null())
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn user_profile_id(&self) -> Option<String> {
        profile_id(self.get("userProfileId"))
    }

    /// Gear list, or `None` when this poll did not carry one.
    pub fn gear(&self) -> Option<&[Value]> {
        self.get("gear").and_then(Value::as_array).map(Vec::as_slice)
    }

    pub fn activity_types(&self) -> Option<&[Value]> {
        self.get("activityTypes")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
    }

    /// Cycle tracking is on when the account returned menstrual data.
    pub fn menstrual_tracking(&self) -> bool {
        self.get("menstrualData")
            .and_then(Value::as_object)
            .is_some_and(|m| !m.is_empty())
    }
}

pub(crate) fn profile_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn merge_object(data: &mut Map<String, Value>, source: Option<&Value>) {
    if let Some(obj) = source.and_then(Value::as_object) {
        for (k, v) in obj {
            data.insert(k.clone(), v.clone());
        }
    }
}

fn user_level(points: i64) -> u32 {
    LEVEL_POINTS
        .iter()
        .filter(|(_, needed)| points >= *needed)
        .map(|(level, _)| *level)
        .last()
        .unwrap_or(0)
}

fn as_f64(v: Option<&Value>) -> f64 {
    v.and_then(Value::as_f64).unwrap_or(0.0)
}

fn merge_daily_steps(data: &mut Map<String, Value>, steps: &Value) {
    let Some(days) = steps.as_array().filter(|d| !d.is_empty()) else {
        return;
    };
    if let Some(last) = days.last() {
        data.insert(
            "yesterdaySteps".into(),
            last.get("totalSteps").cloned().unwrap_or(Value::Null),
        );
        data.insert(
            "yesterdayDistance".into(),
            last.get("totalDistance").cloned().unwrap_or(Value::Null),
        );
    }
    let count = days.len() as f64;
    let steps: f64 = days.iter().map(|d| as_f64(d.get("totalSteps"))).sum();
    let distance: f64 = days.iter().map(|d| as_f64(d.get("totalDistance"))).sum();
    data.insert("weeklyStepAvg".into(), json!((steps / count).round() as i64));
    data.insert(
        "weeklyDistanceAvg".into(),
        json!((distance / count).round() as i64),
    );
}

fn merge_sleep(data: &mut Map<String, Value>, sleep: &Value) {
    let dto = sleep.get("dailySleepDTO");
    let score = dto
        .and_then(|d| d.pointer("/sleepScores/overall/value"))
        .cloned()
        .unwrap_or(Value::Null);
    data.insert("sleepScore".into(), score);
    for key in [
        "sleepTimeSeconds",
        "deepSleepSeconds",
        "lightSleepSeconds",
        "remSleepSeconds",
        "awakeSleepSeconds",
    ] {
        let value = dto.and_then(|d| d.get(key)).cloned().unwrap_or(Value::Null);
        data.insert(key.into(), value);
    }
}

/// Object with `overallScore`, or a placeholder with a null score.
fn score_object(source: &Value) -> Value {
    match source.as_object() {
        Some(obj) if obj.contains_key("overallScore") => source.clone(),
        _ => json!({ "overallScore": null }),
    }
}

fn latest_blood_pressure(bp: &Value) -> Option<Map<String, Value>> {
    let latest = bp
        .get("measurementSummaries")?
        .as_array()?
        .last()?
        .get("measurements")?
        .as_array()?
        .last()?;
    let field = |k: &str| latest.get(k).cloned().unwrap_or(Value::Null);
    let mut out = Map::new();
    out.insert("bpSystolic".into(), field("systolic"));
    out.insert("bpDiastolic".into(), field("diastolic"));
    out.insert("bpPulse".into(), field("pulse"));
    out.insert("bpMeasurementTime".into(), field("measurementTimestampLocal"));
    Some(out)
}

/// Merge one poll's payloads into a snapshot for the local day of `now`.
pub fn assemble(raw: RawFetch, now: DateTime<Tz>) -> Snapshot {
    let mut data = Map::new();
    merge_object(&mut data, raw.summary.as_ref());

    if let Some(steps) = &raw.daily_steps {
        merge_daily_steps(&mut data, steps);
    }

    if let Some(body) = &raw.body_composition {
        merge_object(&mut data, body.get("totalAverage"));
    }

    if let Some(activities) = &raw.activities {
        let list = activities.as_array().cloned().unwrap_or_default();
        let last = list.first().cloned().unwrap_or_else(|| json!({}));
        data.insert("lastActivities".into(), Value::Array(list));
        data.insert("lastActivity".into(), last);
    }

    if let Some(workouts) = &raw.workouts {
        let list = workouts
            .get("workouts")
            .unwrap_or(workouts)
            .as_array()
            .cloned()
            .unwrap_or_default();
        let last = list.first().cloned().unwrap_or_else(|| json!({}));
        data.insert("workouts".into(), Value::Array(list));
        data.insert("lastWorkout".into(), last);
    }

    if let Some(badges) = &raw.badges {
        let list = badges.as_array().cloned().unwrap_or_default();
        let points: i64 = list
            .iter()
            .map(|b| {
                let points = b.get("badgePoints").and_then(Value::as_i64).unwrap_or(0);
                let earned = b
                    .get("badgeEarnedNumber")
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                points * earned
            })
            .sum();
        data.insert("badges".into(), Value::Array(list));
        data.insert("userPoints".into(), json!(points));
        data.insert("userLevel".into(), json!(user_level(points)));
    }

    for (key, value) in [
        ("trainingReadiness", &raw.training_readiness),
        ("trainingStatus", &raw.training_status),
        ("lactateThreshold", &raw.lactate_threshold),
        ("activityTypes", &raw.activity_types),
    ] {
        if let Some(v) = value {
            data.insert(key.into(), v.clone());
        }
    }

    if let Some(alarms) = &raw.alarms {
        let next = next_active_alarms(alarms, now)
            .map(|list| Value::Array(list.into_iter().map(Value::String).collect()))
            .unwrap_or(Value::Null);
        data.insert("nextAlarm".into(), next);
    }

    if let Some(sleep) = &raw.sleep {
        merge_sleep(&mut data, sleep);
    }

    if let Some(hrv) = &raw.hrv {
        let status = hrv
            .get("hrvSummary")
            .filter(|s| s.is_object())
            .cloned()
            .unwrap_or_else(|| json!({ "status": "unknown" }));
        data.insert("hrvStatus".into(), status);
    }

    if let Some(endurance) = &raw.endurance_score {
        data.insert("enduranceScore".into(), score_object(endurance));
    }
    if let Some(hill) = &raw.hill_score {
        data.insert("hillScore".into(), score_object(hill));
    }

    if let Some(menstrual) = &raw.menstrual {
        let value = match menstrual {
            Value::Object(_) => menstrual.clone(),
            _ => json!({}),
        };
        data.insert("menstrualData".into(), value);
    }

    if let Some(gear) = &raw.gear {
        data.insert("gear".into(), gear.clone());
        data.insert("gearStats".into(), Value::Array(raw.gear_stats.clone()));
        data.insert(
            "gearDefaults".into(),
            raw.gear_defaults.clone().unwrap_or_else(|| json!([])),
        );
    }

    merge_object(&mut data, raw.fitness_age.as_ref());
    merge_object(&mut data, raw.hydration.as_ref());

    if let Some(bp) = raw.blood_pressure.as_ref().and_then(latest_blood_pressure) {
        data.extend(bp);
    }

    Snapshot::new(now.with_timezone(&Utc), now.date_naive(), now.timezone(), data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Tz> {
        chrono_tz::UTC.with_ymd_and_hms(2025, 3, 5, 12, 0, 0).unwrap()
    }

    #[test]
    fn level_thresholds() {
        assert_eq!(user_level(0), 1);
        assert_eq!(user_level(19), 1);
        assert_eq!(user_level(20), 2);
        assert_eq!(user_level(10_220), 10);
        assert_eq!(user_level(-5), 0);
    }

    #[test]
    fn plan_always_includes_summary_and_gear_needs_types() {
        let plan = FetchPlan::from_categories([Category::Gear]);
        assert!(plan.contains(Category::Summary));
        assert!(plan.contains(Category::ActivityTypes));
        assert_eq!(plan.len(), 3);
        assert_eq!(FetchPlan::full().len(), Category::ALL.len());
    }

    #[test]
    fn daily_steps_give_yesterday_and_weekly_average() {
        let raw = RawFetch {
            summary: Some(json!({"totalSteps": 100})),
            daily_steps: Some(json!([
                {"totalSteps": 1000, "totalDistance": 800},
                {"totalSteps": 2001, "totalDistance": 1601},
                {"totalSteps": 3000}
            ])),
            ..RawFetch::default()
        };
        let snap = assemble(raw, now());
        assert_eq!(snap.get("yesterdaySteps"), Some(&json!(3000)));
        assert_eq!(snap.get("yesterdayDistance"), None);
        assert_eq!(snap.get("weeklyStepAvg"), Some(&json!(2000)));
        assert_eq!(snap.get("weeklyDistanceAvg"), Some(&json!(800)));
    }

    #[test]
    fn badges_give_points_and_level() {
        let raw = RawFetch {
            badges: Some(json!([
                {"badgePoints": 4, "badgeEarnedNumber": 10},
                {"badgePoints": 2, "badgeEarnedNumber": 1},
                {"badgePoints": 1}
            ])),
            ..RawFetch::default()
        };
        let snap = assemble(raw, now());
        assert_eq!(snap.get("userPoints"), Some(&json!(42)));
        assert_eq!(snap.get("userLevel"), Some(&json!(2)));
    }

    #[test]
    fn body_composition_and_fitness_age_merge_at_top_level() {
        let raw = RawFetch {
            body_composition: Some(json!({"totalAverage": {"weight": 72400.0, "bmi": null}})),
            fitness_age: Some(json!({"fitnessAge": 31.5})),
            hydration: Some(json!({"valueInML": 1500})),
            ..RawFetch::default()
        };
        let snap = assemble(raw, now());
        assert_eq!(snap.get("weight"), Some(&json!(72400.0)));
        assert_eq!(snap.get("bmi"), None);
        assert_eq!(snap.get("fitnessAge"), Some(&json!(31.5)));
        assert_eq!(snap.get("valueInML"), Some(&json!(1500)));
    }

    #[test]
    fn sleep_hrv_and_scores() {
        let raw = RawFetch {
            sleep: Some(json!({"dailySleepDTO": {
                "sleepTimeSeconds": 27000,
                "sleepScores": {"overall": {"value": 81}}
            }})),
            hrv: Some(Value::Null),
            endurance_score: Some(json!({"overallScore": 6100, "classification": 3})),
            hill_score: Some(json!({"somethingElse": 1})),
            ..RawFetch::default()
        };
        let snap = assemble(raw, now());
        assert_eq!(snap.get("sleepScore"), Some(&json!(81)));
        assert_eq!(snap.get("sleepTimeSeconds"), Some(&json!(27000)));
        assert_eq!(snap.get("deepSleepSeconds"), None);
        assert_eq!(snap.get("hrvStatus"), Some(&json!({"status": "unknown"})));
        assert_eq!(snap.get("enduranceScore").unwrap()["overallScore"], 6100);
        assert_eq!(snap.get("hillScore"), Some(&json!({"overallScore": null})));
    }

    #[test]
    fn activities_and_workouts() {
        let raw = RawFetch {
            activities: Some(json!([{"activityId": 2}, {"activityId": 1}])),
            workouts: Some(json!({"workouts": []})),
            ..RawFetch::default()
        };
        let snap = assemble(raw, now());
        assert_eq!(snap.get("lastActivity"), Some(&json!({"activityId": 2})));
        assert_eq!(snap.get("workouts"), Some(&json!([])));
        assert_eq!(snap.get("lastWorkout"), Some(&json!({})));
    }

    #[test]
    fn latest_blood_pressure_reading_wins() {
        let raw = RawFetch {
            blood_pressure: Some(json!({"measurementSummaries": [
                {"measurements": [{"systolic": 110, "diastolic": 70, "pulse": 55,
                                   "measurementTimestampLocal": "2025-03-01T08:00:00.0"}]},
                {"measurements": [
                    {"systolic": 118, "diastolic": 78, "pulse": 58,
                     "measurementTimestampLocal": "2025-03-04T07:00:00.0"},
                    {"systolic": 121, "diastolic": 81, "pulse": 61,
                     "measurementTimestampLocal": "2025-03-04T21:00:00.0"}
                ]}
            ]})),
            ..RawFetch::default()
        };
        let snap = assemble(raw, now());
        assert_eq!(snap.get("bpSystolic"), Some(&json!(121)));
        assert_eq!(
            snap.get("bpMeasurementTime"),
            Some(&json!("2025-03-04T21:00:00.0"))
        );
    }

    #[test]
    fn menstrual_tracking_requires_data() {
        let off = assemble(
            RawFetch {
                menstrual: Some(Value::Null),
                ..RawFetch::default()
            },
            now(),
        );
        assert!(!off.menstrual_tracking());

        let on = assemble(
            RawFetch {
                menstrual: Some(json!({"currentPhase": "FOLLICULAR", "dayOfCycle": 9})),
                ..RawFetch::default()
            },
            now(),
        );
        assert!(on.menstrual_tracking());
    }

    #[test]
    fn gear_list_presence() {
        let without = assemble(RawFetch::default(), now());
        assert!(without.gear().is_none());

        let with = assemble(
            RawFetch {
                gear: Some(json!([])),
                ..RawFetch::default()
            },
            now(),
        );
        assert_eq!(with.gear().map(<[Value]>::len), Some(0));
        assert_eq!(with.get("gearDefaults"), Some(&json!([])));
    }
}
