// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dotted-path lookups over untyped JSON.
//!
//! A path like `data.metadata.phone_call.external_number` walks objects by
//! key; a numeric segment (`data.attachment.0.url`) indexes into arrays.
//! Every lookup is total: a missing segment, a type mismatch, `null` or a
//! blank string all count as absent.

use serde_json::Value;

/// Resolve a dotted path against `root`.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Whether a value counts as present.
fn is_defined(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

/// First defined value among the alternative paths, in table order.
pub fn first_value<'a>(root: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths
        .iter()
        .filter_map(|path| lookup(root, path))
        .find(|value| is_defined(value))
}

/// Scalar rendered as a string. Objects and arrays are not coerced.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First alternative that yields a non-blank scalar string.
pub fn first_text(root: &Value, paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .filter_map(|path| lookup(root, path))
        .find_map(as_text)
}

/// Integer from a JSON number (fractions truncated) or a numeric string.
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

/// First alternative that yields an integer.
pub fn first_i64(root: &Value, paths: &[&str]) -> Option<i64> {
    paths
        .iter()
        .filter_map(|path| lookup(root, path))
        .find_map(as_i64)
}

/// Fold a key for loose matching: ASCII alphanumerics only, lowercased.
///
/// `MessageSid`, `messageSid`, `message_sid` and `MESSAGE-SID` all fold to
/// `messagesid`.
pub fn fold_key(key: &str) -> String {
    key.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// First non-blank scalar among the top-level keys of `root` whose folded
/// form matches one of `folded_keys`, in table order.
pub fn first_text_folded(root: &Value, folded_keys: &[&str]) -> Option<String> {
    let map = root.as_object()?;
    folded_keys.iter().find_map(|wanted| {
        map.iter()
            .filter(|(key, _)| fold_key(key) == *wanted)
            .find_map(|(_, value)| as_text(value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn walks_objects_and_arrays() {
        let doc = json!({"data": {"attachment": [{"url": "https://x/1.jpg"}], "n": 3}});
        assert_eq!(
            lookup(&doc, "data.attachment.0.url").and_then(Value::as_str),
            Some("https://x/1.jpg")
        );
        assert!(lookup(&doc, "data.attachment.1.url").is_none());
        assert!(lookup(&doc, "data.n.deeper").is_none());
        assert!(lookup(&doc, "data.attachment.first").is_none());
    }

    #[test]
    fn blank_and_null_are_skipped() {
        let doc = json!({"a": null, "b": "  ", "c": "value"});
        assert_eq!(first_text(&doc, &["a", "b", "c"]).as_deref(), Some("value"));
        assert!(first_value(&doc, &["a", "b"]).is_none());
    }

    #[test]
    fn numbers_coerce_to_text_and_ints() {
        let doc = json!({"id": 42, "secs": "12.9", "f": 7.5});
        assert_eq!(first_text(&doc, &["id"]).as_deref(), Some("42"));
        assert_eq!(first_i64(&doc, &["secs"]), Some(12));
        assert_eq!(first_i64(&doc, &["f"]), Some(7));
        assert_eq!(first_i64(&doc, &["missing"]), None);
    }

    #[test]
    fn folded_lookup_ignores_case_and_separators() {
        let doc = json!({"message_sid": "SM1", "SmsStatus": "sent"});
        assert_eq!(first_text_folded(&doc, &["messagesid"]).as_deref(), Some("SM1"));
        assert_eq!(
            first_text_folded(&doc, &["messagestatus", "smsstatus"]).as_deref(),
            Some("sent")
        );
        assert_eq!(fold_key("MESSAGE-SID"), "messagesid");
    }
}
