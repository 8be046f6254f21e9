// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idempotency keys for webhook deliveries.
//!
//! Preference order: the vendor's own event id, then `<conversation>:<type>`,
//! then a SHA-256 over the canonical payload. The hash drops top-level
//! fields vendors restamp on every redelivery, so a retried body still hashes
//! the same.

use serde_json::Value;
use sha2::{Digest, Sha256};
use switchboard_core::Provider;

/// Top-level keys excluded from the payload hash.
const VOLATILE_KEYS: &[&str] = &["event_timestamp", "timestamp", "received_at"];

/// Derive the idempotency key for one delivery.
///
/// Keys are namespaced by provider so ids from different vendors never
/// collide.
pub fn idempotency_key(
    provider: Provider,
    event_id: Option<&str>,
    conversation_id: Option<&str>,
    event_type: Option<&str>,
    raw: &Value,
) -> String {
    let prefix = provider.to_string().to_ascii_lowercase();
    if let Some(event_id) = event_id {
        return format!("{prefix}:{event_id}");
    }
    if let (Some(conversation_id), Some(event_type)) = (conversation_id, event_type) {
        return format!("{prefix}:{conversation_id}:{event_type}");
    }
    format!("{prefix}:sha256:{}", payload_hash(raw))
}

/// Hex SHA-256 of the payload with volatile top-level keys removed.
///
/// `serde_json` maps are ordered by key, so serialization is canonical.
pub fn payload_hash(raw: &Value) -> String {
    let stable = match raw {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !VOLATILE_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        other => other.clone(),
    };
    let bytes = serde_json::to_vec(&stable).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}
