// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the persistence backend (SQLite).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SwitchboardError;
use crate::types::{
    AuditEntry, CallDetail, CallDetailPatch, Interaction, InteractionEvent, InteractionFilter,
    InteractionPatch, InteractionUpsert, Message, MessageDeliveryUpdate, NewEvent, NewMessage,
    IssuedOtp, NewOtpChallenge, OtpChallenge, OtpPurpose, OtpRateLimit, OtpStatus, Provider,
    QueueEntry,
};

/// Adapter for the storage backend.
///
/// Every webhook- or sync-driven write to an interaction goes through
/// [`StorageAdapter::upsert_interaction`], which reconciles on the natural key
/// and merges fields instead of overwriting them.
#[async_trait]
pub trait StorageAdapter: Send + Sync + 'static {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), SwitchboardError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), SwitchboardError>;

    /// Cheap round-trip proving the backend is reachable.
    async fn health_check(&self) -> Result<(), SwitchboardError>;

    // --- Interactions ---

    /// Create-if-absent, merge-if-present on the interaction's natural key.
    async fn upsert_interaction(
        &self,
        upsert: &InteractionUpsert,
    ) -> Result<Interaction, SwitchboardError>;

    async fn get_interaction(&self, id: &str) -> Result<Option<Interaction>, SwitchboardError>;

    async fn find_interaction_by_conversation(
        &self,
        provider: Provider,
        conversation_id: &str,
    ) -> Result<Option<Interaction>, SwitchboardError>;

    async fn list_interactions(
        &self,
        filter: &InteractionFilter,
    ) -> Result<Vec<Interaction>, SwitchboardError>;

    /// Interactions whose `from` matches the given number, newest first.
    async fn list_interactions_from(
        &self,
        from_number: &str,
        limit: i64,
    ) -> Result<Vec<Interaction>, SwitchboardError>;

    /// Apply a field-level patch to an existing interaction by id.
    async fn patch_interaction(
        &self,
        id: &str,
        patch: &InteractionPatch,
    ) -> Result<(), SwitchboardError>;

    // --- Call details ---

    async fn upsert_call_detail(
        &self,
        interaction_id: &str,
        patch: &CallDetailPatch,
    ) -> Result<CallDetail, SwitchboardError>;

    async fn get_call_detail(
        &self,
        interaction_id: &str,
    ) -> Result<Option<CallDetail>, SwitchboardError>;

    // --- Messages ---

    async fn create_message(&self, msg: &NewMessage) -> Result<Message, SwitchboardError>;

    async fn find_message_by_provider_id(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<Message>, SwitchboardError>;

    async fn update_message_delivery(
        &self,
        id: &str,
        update: &MessageDeliveryUpdate,
    ) -> Result<(), SwitchboardError>;

    async fn list_messages(&self, interaction_id: &str) -> Result<Vec<Message>, SwitchboardError>;

    // --- Events ---

    /// Insert an event. Returns `None` if its idempotency key already exists.
    async fn create_event(
        &self,
        event: &NewEvent,
    ) -> Result<Option<InteractionEvent>, SwitchboardError>;

    async fn find_event_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<InteractionEvent>, SwitchboardError>;

    async fn list_events(
        &self,
        interaction_id: &str,
    ) -> Result<Vec<InteractionEvent>, SwitchboardError>;

    // --- OTP challenges ---

    /// Create the SMS interaction and a PENDING challenge in one transaction.
    ///
    /// When `limit` is already reached for the challenge's `(phone, purpose)`
    /// nothing is written and the result is `RateLimited`. A reused
    /// correlation id is a `Conflict`.
    async fn create_otp_challenge(
        &self,
        interaction: &InteractionUpsert,
        challenge: &NewOtpChallenge,
        limit: &OtpRateLimit,
    ) -> Result<IssuedOtp, SwitchboardError>;

    /// Challenges for `(phone, purpose)` created at or after `since`.
    async fn count_otp_challenges_since(
        &self,
        phone: &str,
        purpose: OtpPurpose,
        since: DateTime<Utc>,
    ) -> Result<i64, SwitchboardError>;

    async fn get_otp_by_correlation(
        &self,
        correlation_id: &str,
    ) -> Result<Option<OtpChallenge>, SwitchboardError>;

    async fn get_otp(&self, id: &str) -> Result<Option<OtpChallenge>, SwitchboardError>;

    /// Spend one verification attempt and return the new count.
    ///
    /// `None` when the challenge is not PENDING/SENT or has no attempts left.
    async fn increment_otp_attempts(&self, id: &str) -> Result<Option<i32>, SwitchboardError>;

    /// Move a challenge to `status` if its current state allows it
    /// (see [`OtpStatus::allowed_from`]). Returns whether the row changed.
    async fn update_otp_status(
        &self,
        id: &str,
        status: OtpStatus,
        verified_at: Option<DateTime<Utc>>,
    ) -> Result<bool, SwitchboardError>;

    // --- Audit ---

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), SwitchboardError>;

    // --- Queue ---

    async fn enqueue(
        &self,
        queue_name: &str,
        payload: &str,
        max_attempts: i32,
    ) -> Result<i64, SwitchboardError>;

    async fn dequeue(&self, queue_name: &str) -> Result<Option<QueueEntry>, SwitchboardError>;

    async fn ack(&self, id: i64) -> Result<(), SwitchboardError>;

    /// Record a failed attempt; the entry becomes visible again after `backoff_secs`.
    async fn fail(&self, id: i64, backoff_secs: i64) -> Result<(), SwitchboardError>;
}
