//! Lenient ISO-8601 timestamp parsing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Naive datetime layouts the backend has been seen to emit.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Parse a run or annotation timestamp.
///
/// Accepts RFC 3339 (`2025-07-08T13:03:11.683944+00:00`), naive datetimes
/// and bare dates (`2024-01-02`). Naive values are taken as UTC. Returns
/// `None` for anything else; callers treat that as "no value".
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
