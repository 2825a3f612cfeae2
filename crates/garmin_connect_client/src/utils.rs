//! Date/time normalization shared by the client and its callers.

use chrono::{NaiveDate, NaiveDateTime};

/// Parse a user-supplied timestamp into a naive local datetime.
///
/// Accepts:
/// - YYYY-MM-DD -> midnight
/// - RFC3339 datetime -> its local wall-clock part
/// - Naive YYYY-MM-DDTHH:MM:SS, with optional fractional seconds
/// - Naive "YYYY-MM-DD HH:MM:SS"
pub fn parse_local_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ndt);
        }
    }
    None
}

/// Format a local datetime with millisecond precision, the form the
/// activity endpoints expect: `2023-12-02T10:00:00.000`.
pub fn format_millis(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_date_only() {
        let dt = parse_local_datetime("2025-12-15").unwrap();
        assert_eq!(dt.to_string(), "2025-12-15 00:00:00");
    }

    #[test]
    fn parse_preserves_rfc3339_wall_clock() {
        let dt = parse_local_datetime("2025-12-15T10:30:00+02:00").unwrap();
        assert_eq!(dt.to_string(), "2025-12-15 10:30:00");
    }

    #[test]
    fn parse_accepts_space_separator() {
        assert!(parse_local_datetime("2025-12-15 07:05:00").is_some());
    }

    #[test]
    fn parse_rejects_invalid() {
        assert!(parse_local_datetime("yesterday").is_none());
    }

    #[test]
    fn format_millis_pads_fraction() {
        let dt = parse_local_datetime("2023-12-02T10:00:00").unwrap();
        assert_eq!(format_millis(&dt), "2023-12-02T10:00:00.000");
    }
}
