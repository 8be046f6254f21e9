// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timestamp coercion for vendor payloads.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::path::{as_i64, lookup};

/// Unix values above this are taken to be milliseconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Interpret a JSON value as a UTC instant.
///
/// Accepts unix seconds or milliseconds (number or numeric string), RFC 3339,
/// and naive `YYYY-MM-DD HH:MM:SS` taken as UTC.
pub fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(raw) = value.as_str() {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(naive.and_utc());
            }
        }
    }
    let unix = as_i64(value)?;
    if unix <= 0 {
        return None;
    }
    if unix >= MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(unix).single()
    } else {
        Utc.timestamp_opt(unix, 0).single()
    }
}

/// First alternative path that parses as an instant.
pub fn first_instant(root: &Value, paths: &[&str]) -> Option<DateTime<Utc>> {
    paths
        .iter()
        .filter_map(|path| lookup(root, path))
        .find_map(parse_instant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unix_seconds_and_millis() {
        let secs = parse_instant(&json!(1_700_000_000)).unwrap();
        let millis = parse_instant(&json!(1_700_000_000_000_i64)).unwrap();
        assert_eq!(secs, millis);
        assert_eq!(parse_instant(&json!("1700000000")), Some(secs));
    }

    #[test]
    fn rfc3339_and_naive() {
        let a = parse_instant(&json!("2026-03-01T10:00:00-03:00")).unwrap();
        let b = parse_instant(&json!("2026-03-01 13:00:00")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn garbage_is_absent() {
        assert!(parse_instant(&json!("yesterday")).is_none());
        assert!(parse_instant(&json!(0)).is_none());
        assert!(parse_instant(&json!({"ts": 1})).is_none());
    }
}
