// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use switchboard_config::model::StorageConfig;
use switchboard_core::types::{
    AuditEntry, CallDetail, CallDetailPatch, Interaction, InteractionEvent, InteractionFilter,
    InteractionPatch, InteractionUpsert, Message, MessageDeliveryUpdate, NewEvent, NewMessage,
    IssuedOtp, NewOtpChallenge, OtpChallenge, OtpPurpose, OtpRateLimit, OtpStatus, Provider,
    QueueEntry,
};
use switchboard_core::{StorageAdapter, SwitchboardError};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already-open database (in-memory databases in tests).
    pub fn from_database(db: Database) -> Self {
        Self {
            config: StorageConfig {
                database_path: ":memory:".to_string(),
                wal_mode: false,
            },
            db: OnceCell::new_with(Some(db)),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    pub fn db(&self) -> Result<&Database, SwitchboardError> {
        self.db.get().ok_or_else(|| SwitchboardError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), SwitchboardError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| SwitchboardError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), SwitchboardError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), SwitchboardError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT 1", [], |row| row.get(0))
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(())
    }

    // --- Interactions ---

    async fn upsert_interaction(
        &self,
        upsert: &InteractionUpsert,
    ) -> Result<Interaction, SwitchboardError> {
        queries::interactions::upsert_interaction(self.db()?, upsert).await
    }

    async fn get_interaction(&self, id: &str) -> Result<Option<Interaction>, SwitchboardError> {
        queries::interactions::get_interaction(self.db()?, id).await
    }

    async fn find_interaction_by_conversation(
        &self,
        provider: Provider,
        conversation_id: &str,
    ) -> Result<Option<Interaction>, SwitchboardError> {
        queries::interactions::find_by_conversation(self.db()?, provider, conversation_id).await
    }

    async fn list_interactions(
        &self,
        filter: &InteractionFilter,
    ) -> Result<Vec<Interaction>, SwitchboardError> {
        queries::interactions::list_interactions(self.db()?, filter).await
    }

    async fn list_interactions_from(
        &self,
        from_number: &str,
        limit: i64,
    ) -> Result<Vec<Interaction>, SwitchboardError> {
        queries::interactions::list_from(self.db()?, from_number, limit).await
    }

    async fn patch_interaction(
        &self,
        id: &str,
        patch: &InteractionPatch,
    ) -> Result<(), SwitchboardError> {
        queries::interactions::patch_interaction(self.db()?, id, patch).await
    }

    // --- Call details ---

    async fn upsert_call_detail(
        &self,
        interaction_id: &str,
        patch: &CallDetailPatch,
    ) -> Result<CallDetail, SwitchboardError> {
        queries::call_details::upsert_call_detail(self.db()?, interaction_id, patch).await
    }

    async fn get_call_detail(
        &self,
        interaction_id: &str,
    ) -> Result<Option<CallDetail>, SwitchboardError> {
        queries::call_details::get_call_detail(self.db()?, interaction_id).await
    }

    // --- Messages ---

    async fn create_message(&self, msg: &NewMessage) -> Result<Message, SwitchboardError> {
        queries::messages::create_message(self.db()?, msg).await
    }

    async fn find_message_by_provider_id(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<Message>, SwitchboardError> {
        queries::messages::find_by_provider_id(self.db()?, provider_message_id).await
    }

    async fn update_message_delivery(
        &self,
        id: &str,
        update: &MessageDeliveryUpdate,
    ) -> Result<(), SwitchboardError> {
        queries::messages::update_delivery(self.db()?, id, update).await
    }

    async fn list_messages(&self, interaction_id: &str) -> Result<Vec<Message>, SwitchboardError> {
        queries::messages::list_messages(self.db()?, interaction_id).await
    }

    // --- Events ---

    async fn create_event(
        &self,
        event: &NewEvent,
    ) -> Result<Option<InteractionEvent>, SwitchboardError> {
        queries::events::create_event(self.db()?, event).await
    }

    async fn find_event_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<InteractionEvent>, SwitchboardError> {
        queries::events::find_by_idempotency_key(self.db()?, key).await
    }

    async fn list_events(
        &self,
        interaction_id: &str,
    ) -> Result<Vec<InteractionEvent>, SwitchboardError> {
        queries::events::list_events(self.db()?, interaction_id).await
    }

    // --- OTP challenges ---

    async fn create_otp_challenge(
        &self,
        interaction: &InteractionUpsert,
        challenge: &NewOtpChallenge,
        limit: &OtpRateLimit,
    ) -> Result<IssuedOtp, SwitchboardError> {
        queries::otp::create_challenge(self.db()?, interaction, challenge, limit).await
    }

    async fn count_otp_challenges_since(
        &self,
        phone: &str,
        purpose: OtpPurpose,
        since: DateTime<Utc>,
    ) -> Result<i64, SwitchboardError> {
        queries::otp::count_since(self.db()?, phone, purpose, since).await
    }

    async fn get_otp_by_correlation(
        &self,
        correlation_id: &str,
    ) -> Result<Option<OtpChallenge>, SwitchboardError> {
        queries::otp::get_by_correlation(self.db()?, correlation_id).await
    }

    async fn get_otp(&self, id: &str) -> Result<Option<OtpChallenge>, SwitchboardError> {
        queries::otp::get(self.db()?, id).await
    }

    async fn increment_otp_attempts(&self, id: &str) -> Result<Option<i32>, SwitchboardError> {
        queries::otp::increment_attempts(self.db()?, id).await
    }

    async fn update_otp_status(
        &self,
        id: &str,
        status: OtpStatus,
        verified_at: Option<DateTime<Utc>>,
    ) -> Result<bool, SwitchboardError> {
        queries::otp::update_status(self.db()?, id, status, verified_at).await
    }

    // --- Audit ---

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), SwitchboardError> {
        queries::audit::append(self.db()?, entry).await
    }

    // --- Queue ---

    async fn enqueue(
        &self,
        queue_name: &str,
        payload: &str,
        max_attempts: i32,
    ) -> Result<i64, SwitchboardError> {
        queries::queue::enqueue(self.db()?, queue_name, payload, max_attempts).await
    }

    async fn dequeue(&self, queue_name: &str) -> Result<Option<QueueEntry>, SwitchboardError> {
        queries::queue::dequeue(self.db()?, queue_name).await
    }

    async fn ack(&self, id: i64) -> Result<(), SwitchboardError> {
        queries::queue::ack(self.db()?, id).await
    }

    async fn fail(&self, id: i64, backoff_secs: i64) -> Result<(), SwitchboardError> {
        queries::queue::fail(self.db()?, id, backoff_secs).await
    }
}
