// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payload normalizers for the three inbound webhook sources.
//!
//! Each normalizer is a pure, total function from a vendor JSON document to
//! a canonical field set. Key alternatives live in static tables of dotted
//! paths, so supporting a new vendor field variant means adding a table row.
//! Nothing here performs I/O or panics on malformed input.

pub mod path;
pub mod sms;
pub mod time;
pub mod vendor;
pub mod voice;
pub mod whatsapp;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

pub use sms::{DeliveryState, SmsStatusUpdate, form_to_json, normalize_sms_status};
pub use vendor::VendorValue;
pub use voice::{CallInit, VoiceCall, normalize_call_init, normalize_voice};
pub use whatsapp::{INCOMING_EVENT, WhatsappMessage, normalize_whatsapp};

/// A raw inbound document tagged with the shape it is expected to have.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundPayload {
    Voice(Value),
    Whatsapp(Value),
    SmsStatus(Value),
}

impl InboundPayload {
    pub fn raw(&self) -> &Value {
        match self {
            InboundPayload::Voice(raw)
            | InboundPayload::Whatsapp(raw)
            | InboundPayload::SmsStatus(raw) => raw,
        }
    }
}

/// Canonical fields produced from an [`InboundPayload`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Normalized {
    Voice(VoiceCall),
    Whatsapp(WhatsappMessage),
    SmsStatus(SmsStatusUpdate),
}

/// Dispatch to the provider-specific normalizer.
pub fn normalize(payload: &InboundPayload, now: DateTime<Utc>) -> Normalized {
    let normalized = match payload {
        InboundPayload::Voice(raw) => Normalized::Voice(normalize_voice(raw)),
        InboundPayload::Whatsapp(raw) => Normalized::Whatsapp(normalize_whatsapp(raw, now)),
        InboundPayload::SmsStatus(raw) => Normalized::SmsStatus(normalize_sms_status(raw)),
    };
    tracing::trace!(?normalized, "payload normalized");
    normalized
}
