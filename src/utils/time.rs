//! Time utilities: timestamp codec for the stores, whole-minute arithmetic,
//! parsing user-supplied instants.

use crate::errors::{AppError, AppResult};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};

/// Fixed-width RFC 3339 form (UTC, microseconds) so that lexical order of
/// the stored text equals chronological order.
pub fn to_db_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn from_db_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Whole minutes between two instants, rounded down, never negative.
pub fn floor_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_seconds().div_euclid(60).max(0)
}

/// Whole minutes between two instants, rounded down, sign preserved.
pub fn signed_floor_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_seconds().div_euclid(60)
}

/// Parse an instant typed by a user.
///
/// Accepts RFC 3339 (`2026-03-02T09:00:00Z`) or a naive
/// `YYYY-MM-DD HH:MM[:SS]`, which is taken as UTC.
pub fn parse_instant(s: &str) -> AppResult<DateTime<Utc>> {
    let s = s.trim();
    if let Some(dt) = from_db_ts(s) {
        return Ok(dt);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(AppError::InvalidTimestamp(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_timestamps_sort_like_instants() {
        let a = Utc.with_ymd_and_hms(2026, 1, 9, 23, 59, 59).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        assert!(to_db_ts(&a) < to_db_ts(&b));
        assert_eq!(from_db_ts(&to_db_ts(&a)), Some(a));
    }

    #[test]
    fn floor_minutes_rounds_down_and_clamps() {
        let a = Utc.with_ymd_and_hms(2026, 1, 9, 12, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 1, 9, 12, 10, 59).unwrap();
        assert_eq!(floor_minutes(a, b), 10);
        assert_eq!(floor_minutes(b, a), 0);
        assert_eq!(signed_floor_minutes(b, a), -11);
    }

    #[test]
    fn naive_input_is_utc() {
        let dt = parse_instant("2026-03-02 09:15").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2026, 3, 2, 9, 15, 0).unwrap());
        assert!(parse_instant("yesterday").is_err());
    }
}
