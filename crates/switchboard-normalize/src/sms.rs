// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMS gateway delivery-status callbacks.
//!
//! Callbacks arrive form-encoded or as JSON with inconsistent key casing, so
//! keys are matched in folded form (see [`fold_key`](crate::path::fold_key)).

use serde::Serialize;
use serde_json::{Map, Value};
use switchboard_core::phone::normalize_phone;

use crate::path::first_text_folded;

const MESSAGE_SID: &[&str] = &["messagesid", "smssid", "sid", "messageid"];
const STATUS: &[&str] = &["messagestatus", "smsstatus", "status"];
const TO: &[&str] = &["to"];
const FROM: &[&str] = &["from"];
const ERROR_CODE: &[&str] = &["errorcode"];
const ERROR_MESSAGE: &[&str] = &["errormessage"];

/// Coarse delivery state derived from the vendor status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    /// Accepted, queued or sent; not final.
    Pending,
    Delivered,
    Read,
    /// `failed` or `undelivered`.
    Failed,
}

impl DeliveryState {
    pub fn from_status(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "delivered" => DeliveryState::Delivered,
            "read" => DeliveryState::Read,
            "failed" | "undelivered" => DeliveryState::Failed,
            _ => DeliveryState::Pending,
        }
    }
}

/// Canonical fields of a delivery-status callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsStatusUpdate {
    pub message_sid: Option<String>,
    /// Lowercased vendor status, e.g. `delivered`.
    pub status: Option<String>,
    pub state: Option<DeliveryState>,
    pub to: Option<String>,
    pub from: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

pub fn normalize_sms_status(payload: &Value) -> SmsStatusUpdate {
    let status = first_text_folded(payload, STATUS).map(|s| s.to_ascii_lowercase());
    SmsStatusUpdate {
        message_sid: first_text_folded(payload, MESSAGE_SID),
        state: status.as_deref().map(DeliveryState::from_status),
        status,
        to: first_text_folded(payload, TO).map(|raw| normalize_phone(&raw)),
        from: first_text_folded(payload, FROM).map(|raw| normalize_phone(&raw)),
        error_code: first_text_folded(payload, ERROR_CODE),
        error_message: first_text_folded(payload, ERROR_MESSAGE),
    }
}

/// Decode an `application/x-www-form-urlencoded` body into a JSON object.
///
/// Repeated keys keep their first value.
pub fn form_to_json(body: &str) -> Result<Value, serde_urlencoded::de::Error> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(body)?;
    let mut map = Map::new();
    for (key, value) in pairs {
        map.entry(key).or_insert(Value::String(value));
    }
    Ok(Value::Object(map))
}
