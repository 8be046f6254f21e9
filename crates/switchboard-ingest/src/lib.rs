// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound webhook processing for Switchboard.
//!
//! The [`WebhookDispatcher`] authenticates, normalizes, deduplicates and
//! persists deliveries from the voice agent, the WhatsApp bot and the SMS
//! gateway, and performs the primary outbound sends. Voice calls from
//! webhooks and from the sync scheduler share [`reconcile_voice_call`].

pub mod auth;
pub mod dispatcher;
pub mod error;
pub mod idempotency;
pub mod reconcile;

pub use auth::{TokenPolicy, WebhookSecrets, check_token};
pub use dispatcher::{
    CallInitResponse, CallInitVariables, OutboundMessage, SendReceipt, WebhookAck,
    WebhookDispatcher, WebhookSource,
};
pub use error::SoftError;
pub use idempotency::idempotency_key;
pub use reconcile::{reconcile_voice_call, voice_upsert};
