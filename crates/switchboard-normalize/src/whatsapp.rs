// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp bot events (`{eventName, data:{...}}`).

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use switchboard_core::phone::{normalize_phone, normalize_whatsapp_id};

use crate::path::{first_text, first_value};
use crate::time::first_instant;

/// The only event that carries a customer message.
pub const INCOMING_EVENT: &str = "message.incoming";

const EVENT_NAME: &[&str] = &["eventName", "event_name", "event", "type"];

const EVENT_ID: &[&str] = &["eventId", "event_id", "data.eventId", "data.event_id"];

const MESSAGE_ID: &[&str] = &[
    "data.message_id",
    "data.messageId",
    "data.key.id",
    "data.id",
    "messageId",
];

const FROM: &[&str] = &[
    "data.from",
    "data.remoteJid",
    "data.key.remoteJid",
    "data.phone",
    "from",
];

const TO: &[&str] = &["data.host.phone", "data.host", "data.to", "to"];

const NAME: &[&str] = &["data.name", "data.pushName", "name"];

const BODY: &[&str] = &[
    "data.body",
    "data.message.conversation",
    "data.message.extendedTextMessage.text",
    "data.text",
    "body",
];

const MEDIA_URL: &[&str] = &[
    "data.urlTempFile",
    "data.attachment.0.url",
    "data.attachment.0",
    "data.media_url",
    "data.mediaUrl",
];

const TIMESTAMP: &[&str] = &["data.messageTimestamp", "data.timestamp", "timestamp"];

/// Canonical fields of an incoming WhatsApp message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsappMessage {
    pub event_name: Option<String>,
    pub event_id: Option<String>,
    pub message_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub name: Option<String>,
    pub body: Option<String>,
    pub media_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl WhatsappMessage {
    pub fn is_incoming(&self) -> bool {
        self.event_name.as_deref() == Some(INCOMING_EVENT)
    }
}

/// Normalize a bot webhook body.
///
/// The message timestamp describes the event being delivered, so it falls
/// back to `now` when the payload carries none.
pub fn normalize_whatsapp(payload: &Value, now: DateTime<Utc>) -> WhatsappMessage {
    WhatsappMessage {
        event_name: first_text(payload, EVENT_NAME),
        event_id: first_text(payload, EVENT_ID),
        message_id: first_text(payload, MESSAGE_ID),
        from: first_text(payload, FROM)
            .map(|raw| normalize_whatsapp_id(&raw))
            .filter(|number| !number.is_empty()),
        to: first_text(payload, TO)
            .map(|raw| normalize_phone(&raw))
            .filter(|number| !number.is_empty()),
        name: first_text(payload, NAME),
        body: first_text(payload, BODY),
        media_url: first_value(payload, MEDIA_URL).and_then(|value| match value {
            Value::String(url) => Some(url.trim().to_string()),
            _ => None,
        }),
        timestamp: first_instant(payload, TIMESTAMP).unwrap_or(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn incoming_message_fields() {
        let payload = json!({
            "eventName": "message.incoming",
            "data": {
                "body": "Hola, necesito ayuda",
                "name": "Ana",
                "from": "5491155550000@s.whatsapp.net",
                "host": {"phone": "5491100000000"},
                "key": {"id": "wamid.ABC"},
                "messageTimestamp": 1_739_537_000
            }
        });
        let msg = normalize_whatsapp(&payload, now());
        assert!(msg.is_incoming());
        assert_eq!(msg.from.as_deref(), Some("5491155550000"));
        assert_eq!(msg.to.as_deref(), Some("5491100000000"));
        assert_eq!(msg.name.as_deref(), Some("Ana"));
        assert_eq!(msg.body.as_deref(), Some("Hola, necesito ayuda"));
        assert_eq!(msg.message_id.as_deref(), Some("wamid.ABC"));
        assert_eq!(msg.timestamp.timestamp(), 1_739_537_000);
        assert!(msg.media_url.is_none());
    }

    #[test]
    fn from_alternatives_and_attachment() {
        let payload = json!({
            "eventName": "message.incoming",
            "data": {
                "remoteJid": "5491155550001@c.us",
                "attachment": [{"url": "https://cdn/img.jpg", "mime": "image/jpeg"}]
            }
        });
        let msg = normalize_whatsapp(&payload, now());
        assert_eq!(msg.from.as_deref(), Some("5491155550001"));
        assert_eq!(msg.media_url.as_deref(), Some("https://cdn/img.jpg"));
        assert!(msg.body.is_none());
    }

    #[test]
    fn temp_file_url_wins_over_attachment() {
        let payload = json!({
            "data": {
                "phone": "+54 9 11 5555-0002",
                "urlTempFile": "https://tmp/file.ogg",
                "attachment": ["https://cdn/other.ogg"]
            }
        });
        let msg = normalize_whatsapp(&payload, now());
        assert_eq!(msg.media_url.as_deref(), Some("https://tmp/file.ogg"));
        assert_eq!(msg.from.as_deref(), Some("5491155550002"));
    }

    #[test]
    fn missing_timestamp_defaults_to_now() {
        let msg = normalize_whatsapp(&json!({"eventName": "status.update"}), now());
        assert!(!msg.is_incoming());
        assert_eq!(msg.timestamp, now());
        assert!(msg.from.is_none());
    }
}
