// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across storage, ingestion, OTP, sync, and the gateway.
//!
//! Enums serialize as SCREAMING_SNAKE_CASE both on the wire and in SQLite,
//! so `Display`/`FromStr` (strum) and serde always agree.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Timestamp format used for every persisted timestamp column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Format a UTC timestamp the way it is persisted.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a persisted (or any RFC 3339) timestamp.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Placeholder stored in `from`/`to` when a payload does not identify a party.
pub const UNKNOWN_PARTY: &str = "unknown";

/// RFC 3339 with millisecond precision, for JSON payloads sent to vendors.
pub fn rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Communication channel of an interaction or message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    Call,
    Whatsapp,
    Sms,
}

/// Direction relative to the contact center.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// External communication vendor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Provider {
    /// Voice-AI agent platform (calls).
    Elevenlabs,
    /// WhatsApp business messaging bot.
    Builderbot,
    /// SMS gateway.
    Twilio,
}

/// Lifecycle state of an interaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionStatus {
    New,
    InProgress,
    Completed,
    Abandoned,
    Failed,
}

impl InteractionStatus {
    /// Whether the interaction has finished (successfully or not).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned | Self::Failed)
    }
}

/// Business outcome of an interaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Resolved,
    Escalated,
    Ticketed,
    Transferred,
    Unknown,
}

/// What an OTP code is protecting.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum OtpPurpose {
    #[strum(serialize = "PASSWORD_RESET")]
    #[serde(rename = "PASSWORD_RESET")]
    PasswordReset,
    #[strum(serialize = "TX_CONFIRMATION")]
    #[serde(rename = "TX_CONFIRMATION")]
    TxConfirmation,
    #[strum(serialize = "IDENTITY_VERIFICATION")]
    #[serde(rename = "IDENTITY_VERIFICATION")]
    IdentityVerification,
    #[strum(serialize = "LOGIN_2FA")]
    #[serde(rename = "LOGIN_2FA")]
    Login2fa,
}

/// State of an OTP challenge.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OtpStatus {
    Pending,
    Sent,
    Verified,
    Expired,
    Locked,
    Failed,
}

impl OtpStatus {
    /// Whether a code may still be checked against this challenge.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Sent)
    }

    /// States from which a challenge may move into `self`.
    pub fn allowed_from(self) -> &'static [OtpStatus] {
        match self {
            Self::Pending => &[],
            Self::Sent => &[Self::Pending, Self::Failed],
            Self::Failed => &[Self::Pending, Self::Sent, Self::Failed],
            Self::Verified | Self::Locked => &[Self::Pending, Self::Sent],
            Self::Expired => &[Self::Pending, Self::Sent, Self::Failed],
        }
    }
}

/// Who performed an audited action.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorType {
    System,
    Webhook,
    Api,
    Worker,
    Scheduler,
}

// --- Interaction aggregate ---

/// Canonical record of one call, WhatsApp thread, or outbound SMS send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub id: String,
    pub channel: Channel,
    pub direction: Direction,
    pub provider: Provider,
    pub provider_conversation_id: Option<String>,
    #[serde(rename = "from")]
    pub from_number: String,
    #[serde(rename = "to")]
    pub to_number: String,
    pub status: InteractionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub assigned_agent: Option<String>,
    pub intent: Option<String>,
    pub outcome: Option<Outcome>,
    pub customer_ref: Option<String>,
    pub queue: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Field-level patch for an interaction. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionPatch {
    pub status: Option<InteractionStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub assigned_agent: Option<String>,
    pub intent: Option<String>,
    pub outcome: Option<Outcome>,
    pub customer_ref: Option<String>,
    pub queue: Option<String>,
}

impl InteractionPatch {
    /// Status-only patch.
    pub fn status(status: InteractionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Terminal patch setting status, outcome and ended_at together.
    pub fn finished(status: InteractionStatus, outcome: Option<Outcome>, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(status),
            outcome,
            ended_at: Some(at),
            ..Self::default()
        }
    }
}

/// Natural key an interaction is reconciled on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionKey {
    /// `(provider, provider_conversation_id)`.
    Conversation {
        provider: Provider,
        conversation_id: String,
    },
    /// `(provider, from, to, channel)` when the vendor gives no conversation id.
    Parties {
        provider: Provider,
        from_number: String,
        to_number: String,
        channel: Channel,
    },
}

/// Input to the Interaction Store upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionUpsert {
    pub provider: Provider,
    pub channel: Channel,
    /// Only applied on insert.
    pub direction: Direction,
    pub provider_conversation_id: Option<String>,
    pub from_number: String,
    pub to_number: String,
    pub fields: InteractionPatch,
}

impl InteractionUpsert {
    /// Resolve the natural key this upsert reconciles on.
    pub fn key(&self) -> InteractionKey {
        match &self.provider_conversation_id {
            Some(id) => InteractionKey::Conversation {
                provider: self.provider,
                conversation_id: id.clone(),
            },
            None => InteractionKey::Parties {
                provider: self.provider,
                from_number: self.from_number.clone(),
                to_number: self.to_number.clone(),
                channel: self.channel,
            },
        }
    }
}

/// Filters for listing interactions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionFilter {
    #[serde(default)]
    pub channel: Option<Channel>,
    #[serde(default)]
    pub status: Option<InteractionStatus>,
    #[serde(default)]
    pub provider: Option<Provider>,
    #[serde(default = "default_page_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl Default for InteractionFilter {
    fn default() -> Self {
        Self {
            channel: None,
            status: None,
            provider: None,
            limit: default_page_limit(),
            offset: 0,
        }
    }
}

fn default_page_limit() -> i64 {
    50
}

// --- Sub-entities ---

/// Voice-call extension of an interaction (zero or one per interaction).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallDetail {
    pub interaction_id: String,
    pub vendor_call_id: Option<String>,
    pub recording_url: Option<String>,
    pub transcript_text: Option<String>,
    pub transcript_id: Option<String>,
    pub summary: Option<String>,
    pub duration_seconds: Option<i64>,
    pub hangup_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Merge-not-overwrite patch for a call detail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallDetailPatch {
    pub vendor_call_id: Option<String>,
    pub recording_url: Option<String>,
    pub transcript_text: Option<String>,
    pub transcript_id: Option<String>,
    pub summary: Option<String>,
    pub duration_seconds: Option<i64>,
    pub hangup_reason: Option<String>,
}

impl CallDetailPatch {
    /// True when the patch carries no data at all.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Fill the fields this patch lacks from `other`. Present fields win.
    pub fn fill_from(&mut self, other: CallDetailPatch) {
        fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        fill(&mut self.vendor_call_id, other.vendor_call_id);
        fill(&mut self.recording_url, other.recording_url);
        fill(&mut self.transcript_text, other.transcript_text);
        fill(&mut self.transcript_id, other.transcript_id);
        fill(&mut self.summary, other.summary);
        fill(&mut self.duration_seconds, other.duration_seconds);
        fill(&mut self.hangup_reason, other.hangup_reason);
    }
}

/// One text/media unit inside an interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub interaction_id: String,
    pub channel: Channel,
    pub direction: Direction,
    pub provider_message_id: Option<String>,
    pub text: Option<String>,
    pub media_url: Option<String>,
    pub provider_status: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a message.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub interaction_id: String,
    pub channel: Channel,
    pub direction: Direction,
    pub provider_message_id: Option<String>,
    pub text: Option<String>,
    pub media_url: Option<String>,
    pub provider_status: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Delivery-status mutation applied to an existing message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDeliveryUpdate {
    pub provider_status: String,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Immutable log entry for one accepted webhook or queue completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    pub id: String,
    pub interaction_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub provider: Provider,
    pub provider_event_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for an interaction event.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub interaction_id: String,
    pub event_type: String,
    pub provider: Provider,
    pub provider_event_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub payload: serde_json::Value,
}

// --- OTP ---

/// One-time-passcode verification attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpChallenge {
    pub id: String,
    pub phone: String,
    pub purpose: OtpPurpose,
    #[serde(skip_serializing)]
    pub otp_hash: String,
    pub expires_at: DateTime<Utc>,
    pub max_attempts: i32,
    pub attempts: i32,
    pub status: OtpStatus,
    pub correlation_id: String,
    pub interaction_id: String,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for an OTP challenge.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOtpChallenge {
    pub phone: String,
    pub purpose: OtpPurpose,
    pub otp_hash: String,
    pub expires_at: DateTime<Utc>,
    pub max_attempts: i32,
    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
}

/// Sliding creation window for challenges of one `(phone, purpose)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpRateLimit {
    pub window: Duration,
    pub max: i64,
}

impl OtpRateLimit {
    /// Seconds until the oldest challenge in the window falls out of it.
    pub fn retry_after(&self, oldest: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u64 {
        let Some(oldest) = oldest else {
            return self.window.num_seconds().max(1) as u64;
        };
        let remaining = (oldest + self.window) - now;
        let secs = remaining.num_seconds() + i64::from(remaining.subsec_nanos() > 0);
        secs.max(1) as u64
    }
}

/// A challenge together with the SMS interaction created for it.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedOtp {
    pub interaction: Interaction,
    pub challenge: OtpChallenge,
}

// --- Audit ---

/// Append-only record of a state-changing action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub actor_type: ActorType,
    pub actor_id: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub metadata: serde_json::Value,
}

impl AuditEntry {
    pub fn new(actor_type: ActorType, action: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            actor_type,
            actor_id: None,
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

// --- Queue ---

/// A job-queue row.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub id: i64,
    pub queue_name: String,
    pub payload: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub created_at: String,
    pub updated_at: String,
    pub locked_until: Option<String>,
}

// --- Vendor API shapes ---

/// Query for the voice provider's conversation list API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationQuery {
    pub agent_id: Option<String>,
    pub start_after: Option<DateTime<Utc>>,
    pub start_before: Option<DateTime<Utc>>,
    pub page_size: u32,
    pub cursor: Option<String>,
}

/// One page of remote conversations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationPage {
    pub conversations: Vec<ConversationSummary>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// A conversation as listed by the voice provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub raw: serde_json::Value,
}

/// Result of an outbound send through a vendor.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub provider_message_id: Option<String>,
    pub status: Option<String>,
    pub raw: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn retry_after_counts_down_to_window_exit() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let limit = OtpRateLimit {
            window: Duration::seconds(900),
            max: 3,
        };
        assert_eq!(limit.retry_after(Some(now - Duration::seconds(600)), now), 300);
        assert_eq!(limit.retry_after(None, now), 900);
        assert_eq!(limit.retry_after(Some(now - Duration::seconds(2000)), now), 1);
    }

    #[test]
    fn settled_challenges_accept_no_transition() {
        for settled in [OtpStatus::Verified, OtpStatus::Locked, OtpStatus::Expired] {
            for target in [
                OtpStatus::Sent,
                OtpStatus::Verified,
                OtpStatus::Locked,
                OtpStatus::Failed,
            ] {
                assert!(!target.allowed_from().contains(&settled), "{settled} -> {target}");
            }
        }
        assert!(OtpStatus::Sent.allowed_from().contains(&OtpStatus::Failed));
        assert!(OtpStatus::Sent.is_open());
        assert!(!OtpStatus::Failed.is_open());
    }
}
