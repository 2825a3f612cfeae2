//! Next-occurrence calculation for device alarms.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde_json::Value;

/// Weekday number (Monday = 1) for a Garmin alarm day code.
fn day_number(code: &str) -> Option<i64> {
    match code {
        "Mo" | "M" => Some(1),
        "Tu" => Some(2),
        "We" | "W" => Some(3),
        "Th" => Some(4),
        "Fr" | "F" => Some(5),
        "Sa" => Some(6),
        "Su" => Some(7),
        _ => None,
    }
}

fn localize(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&naive).earliest()
}

fn at_minutes(date: NaiveDate, minutes: i64) -> Option<NaiveDateTime> {
    Some(date.and_hms_opt(0, 0, 0)? + Duration::minutes(minutes))
}

/// Compute the next occurrence of every active alarm, sorted ascending.
///
/// Returns `Some(vec![])` when there are no alarms at all and `None` when
/// alarms exist but none is switched on.
pub fn next_active_alarms(alarms: &Value, now: DateTime<Tz>) -> Option<Vec<String>> {
    let Some(list) = alarms.as_array().filter(|l| !l.is_empty()) else {
        return Some(Vec::new());
    };

    let tz = now.timezone();
    let today = now.date_naive();
    let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));

    let mut next: Vec<DateTime<Tz>> = Vec::new();
    for alarm in list {
        if alarm.get("alarmMode").and_then(Value::as_str) != Some("ON") {
            continue;
        }
        let Some(minutes) = alarm.get("alarmTime").and_then(Value::as_i64) else {
            continue;
        };
        let days = alarm
            .get("alarmDays")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for day in days.iter().filter_map(Value::as_str) {
            let occurrence = if day == "ONCE" {
                at_minutes(today, minutes)
                    .and_then(|n| localize(tz, n))
                    .map(|at| if at < now { at + Duration::days(1) } else { at })
            } else {
                let Some(number) = day_number(day) else {
                    tracing::debug!(day, "skipping unknown alarm day code");
                    continue;
                };
                at_minutes(monday + Duration::days(number - 1), minutes)
                    .and_then(|n| localize(tz, n))
                    .map(|at| if at < now { at + Duration::days(7) } else { at })
            };
            if let Some(at) = occurrence {
                next.push(at);
            }
        }
    }

    if next.is_empty() {
        return None;
    }
    next.sort();
    Some(next.into_iter().map(|at| at.to_rfc3339()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn amsterdam(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        chrono_tz::Europe::Amsterdam
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
    }

    #[test]
    fn empty_or_missing_alarms_yield_empty_list() {
        let now = amsterdam(2025, 3, 5, 12, 0);
        assert_eq!(next_active_alarms(&Value::Null, now), Some(vec![]));
        assert_eq!(next_active_alarms(&json!([]), now), Some(vec![]));
    }

    #[test]
    fn only_disabled_alarms_yield_none() {
        let now = amsterdam(2025, 3, 5, 12, 0);
        let alarms = json!([{"alarmMode": "OFF", "alarmTime": 420, "alarmDays": ["Mo"]}]);
        assert_eq!(next_active_alarms(&alarms, now), None);
    }

    #[test]
    fn once_alarm_rolls_to_tomorrow_when_passed() {
        // Wednesday 2025-03-05 12:00; 07:00 already passed.
        let now = amsterdam(2025, 3, 5, 12, 0);
        let alarms = json!([
            {"alarmMode": "ON", "alarmTime": 420, "alarmDays": ["ONCE"]},
            {"alarmMode": "ON", "alarmTime": 1200, "alarmDays": ["ONCE"]}
        ]);
        let next = next_active_alarms(&alarms, now).unwrap();
        assert_eq!(
            next,
            vec![
                "2025-03-05T20:00:00+01:00".to_string(),
                "2025-03-06T07:00:00+01:00".to_string()
            ]
        );
    }

    #[test]
    fn weekly_alarm_uses_day_codes_and_wraps() {
        // Wednesday 12:00: Monday's alarm is next week, Friday's is this week.
        let now = amsterdam(2025, 3, 5, 12, 0);
        let alarms = json!([
            {"alarmMode": "ON", "alarmTime": 390, "alarmDays": ["M", "Fr", "Bogus"]}
        ]);
        let next = next_active_alarms(&alarms, now).unwrap();
        assert_eq!(
            next,
            vec![
                "2025-03-07T06:30:00+01:00".to_string(),
                "2025-03-10T06:30:00+01:00".to_string()
            ]
        );
    }
}
