//! Time-related utilities

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// Get the current system time in milliseconds since UNIX epoch
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Convert an epoch timestamp of unknown unit to a UTC datetime.
///
/// Exchanges disagree on units, so the magnitude decides: values >= 1e17 are
/// nanoseconds, >= 1e14 microseconds, >= 1e11 milliseconds, anything smaller
/// is seconds.
pub fn datetime_from_epoch(ts: i64) -> Option<DateTime<Utc>> {
    let abs = ts.unsigned_abs();
    let millis = if abs >= 100_000_000_000_000_000 {
        ts / 1_000_000
    } else if abs >= 100_000_000_000_000 {
        ts / 1_000
    } else if abs >= 100_000_000_000 {
        ts
    } else {
        ts.checked_mul(1_000)?
    };
    Utc.timestamp_millis_opt(millis).single()
}

/// Parse a textual timestamp: RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` (UTC), or
/// a bare epoch number.
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    s.parse::<i64>().ok().and_then(datetime_from_epoch)
}

/// Render a datetime in the textual form ClickHouse accepts for `DateTime64(3)`.
pub fn format_datetime64(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis() {
        assert!(now_millis() > 1_600_000_000_000); // After 2020
    }

    #[test]
    fn test_epoch_unit_detection() {
        let expected = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(datetime_from_epoch(1_700_000_000_123), Some(expected));
        assert_eq!(datetime_from_epoch(1_700_000_000_123_000), Some(expected));
        assert_eq!(datetime_from_epoch(1_700_000_000_123_000_000), Some(expected));
        assert_eq!(
            datetime_from_epoch(1_700_000_000),
            Utc.timestamp_millis_opt(1_700_000_000_000).single()
        );
    }

    #[test]
    fn test_parse_and_format_datetime() {
        let dt = parse_datetime("2024-03-01T12:30:45.250Z").unwrap();
        assert_eq!(format_datetime64(&dt), "2024-03-01 12:30:45.250");
        let same = parse_datetime("2024-03-01 12:30:45.25").unwrap();
        assert_eq!(dt, same);
        assert!(parse_datetime("yesterday").is_none());
    }
}
