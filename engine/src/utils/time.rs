//! Time utility functions

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Convert milliseconds since Unix epoch to DateTime<Utc>
pub fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(|| {
        tracing::warn!(millis, "Invalid timestamp, using epoch");
        DateTime::UNIX_EPOCH
    })
}

/// Milliseconds since Unix epoch, the integer encoding used for timestamps
/// in canonical JSON and cache keys
pub fn datetime_to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Midnight (UTC) of the day containing `dt`
pub fn start_of_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&dt.date_naive().and_time(NaiveTime::MIN))
}

/// Parse an absolute ISO 8601 timestamp.
///
/// Accepts RFC 3339 (`2024-01-15T10:30:00Z`), naive datetimes with `T` or a
/// space separator (interpreted as UTC), and bare dates (midnight UTC).
pub fn parse_iso_datetime(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(ts, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(ts, "%Y-%m-%d")
        .ok()
        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_millis_roundtrip() {
        // 2024-01-01 00:00:00 UTC
        let dt = millis_to_datetime(1_704_067_200_000);
        assert_eq!(dt.year(), 2024);
        assert_eq!(datetime_to_millis(&dt), 1_704_067_200_000);
    }

    #[test]
    fn test_millis_keeps_subsecond() {
        let dt = millis_to_datetime(1_500);
        assert_eq!(dt.timestamp(), 1);
        assert_eq!(dt.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_start_of_day() {
        let dt = parse_iso_datetime("2024-01-15T10:30:00Z").unwrap();
        let day = start_of_day(dt);
        assert_eq!(day.hour(), 0);
        assert_eq!(day.day(), 15);
    }

    #[test]
    fn test_parse_iso_with_offset() {
        let dt = parse_iso_datetime("2024-01-15T10:30:00+05:00").unwrap();
        assert_eq!(dt.hour(), 5);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn test_parse_iso_naive_forms() {
        assert!(parse_iso_datetime("2024-01-15 10:30:00").is_some());
        assert!(parse_iso_datetime("2024-01-15T10:30").is_some());
        let d = parse_iso_datetime("2024-01-15").unwrap();
        assert_eq!(d.hour(), 0);
    }

    #[test]
    fn test_parse_iso_invalid() {
        assert!(parse_iso_datetime("not-a-timestamp").is_none());
        assert!(parse_iso_datetime("").is_none());
    }
}
