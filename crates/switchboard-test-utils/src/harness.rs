// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the back office with mock vendors, a manual
//! clock and a temp SQLite database, then exposes each subsystem for
//! driving and asserting.

use std::sync::Arc;

use serde_json::Value;
use switchboard_config::SwitchboardConfig;
use switchboard_config::model::StorageConfig;
use switchboard_core::{SmsGateway, StorageAdapter, SwitchboardError};
use switchboard_ingest::{WebhookDispatcher, WebhookSecrets};
use switchboard_otp::{OTP_SMS_QUEUE, OtpManager, SmsJob, SmsWorker};
use switchboard_storage::SqliteStorage;
use switchboard_sync::SyncService;

use crate::clock::ManualClock;
use crate::mock_providers::{MockMessagingBot, MockSmsGateway, MockVoiceApi};

pub const VOICE_SECRET: &str = "voice-secret";
pub const WHATSAPP_SECRET: &str = "whatsapp-secret";
pub const SMS_SECRET: &str = "sms-secret";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: SwitchboardConfig,
    voice_enrichment: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = SwitchboardConfig::default();
        config.elevenlabs.webhook_secret = Some(VOICE_SECRET.to_string());
        config.builderbot.webhook_secret = Some(WHATSAPP_SECRET.to_string());
        config.twilio.webhook_secret = Some(SMS_SECRET.to_string());
        config.worker.backoff_secs = 0;
        Self {
            config,
            voice_enrichment: true,
        }
    }

    /// Adjust the configuration before the subsystems are built.
    pub fn with_config(mut self, adjust: impl FnOnce(&mut SwitchboardConfig)) -> Self {
        adjust(&mut self.config);
        self
    }

    /// Build the dispatcher without a voice API, so webhooks are never enriched.
    pub fn without_voice_enrichment(mut self) -> Self {
        self.voice_enrichment = false;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(mut self) -> Result<TestHarness, SwitchboardError> {
        let temp_dir = tempfile::TempDir::new().map_err(SwitchboardError::storage)?;
        let db_path = temp_dir.path().join("switchboard.db");
        self.config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };

        let sqlite = Arc::new(SqliteStorage::new(self.config.storage.clone()));
        sqlite.initialize().await?;
        let storage: Arc<dyn StorageAdapter> = sqlite.clone();

        let clock = Arc::new(ManualClock::default());
        let voice = Arc::new(MockVoiceApi::new());
        let sms = Arc::new(MockSmsGateway::default());
        let bot = Arc::new(MockMessagingBot::default());

        let mut dispatcher = WebhookDispatcher::new(
            storage.clone(),
            WebhookSecrets::from_config(&self.config),
            clock.clone(),
        )
        .with_sms_gateway(sms.clone())
        .with_messaging_bot(bot.clone());
        if self.voice_enrichment {
            dispatcher = dispatcher.with_voice_api(voice.clone());
        }

        let otp = OtpManager::new(storage.clone(), clock.clone(), self.config.otp.clone())
            .with_sender(sms.from_number())
            .with_job_attempts(self.config.worker.max_attempts);

        let worker = SmsWorker::new(
            storage.clone(),
            sms.clone(),
            clock.clone(),
            self.config.worker.clone(),
            self.config.otp.ttl_seconds,
        );

        let sync = SyncService::new(
            storage.clone(),
            voice.clone(),
            clock.clone(),
            self.config.sync.clone(),
        );

        Ok(TestHarness {
            clock,
            voice,
            sms,
            bot,
            storage,
            sqlite,
            dispatcher: Arc::new(dispatcher),
            otp: Arc::new(otp),
            worker: Arc::new(worker),
            sync: Arc::new(sync),
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock vendors and temp storage.
pub struct TestHarness {
    pub clock: Arc<ManualClock>,
    pub voice: Arc<MockVoiceApi>,
    pub sms: Arc<MockSmsGateway>,
    pub bot: Arc<MockMessagingBot>,
    /// SQLite storage (temp DB, cleaned up on drop).
    pub storage: Arc<dyn StorageAdapter>,
    pub dispatcher: Arc<WebhookDispatcher>,
    pub otp: Arc<OtpManager>,
    pub worker: Arc<SmsWorker>,
    pub sync: Arc<SyncService>,
    pub config: SwitchboardConfig,
    sqlite: Arc<SqliteStorage>,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

/// One row of the audit log.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRow {
    pub actor_type: String,
    pub actor_id: Option<String>,
    pub action: String,
    pub entity_id: Option<String>,
    pub metadata: Value,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default settings.
    pub async fn new() -> Result<Self, SwitchboardError> {
        Self::builder().build().await
    }

    /// Process every ready job on the OTP SMS queue, one at a time.
    ///
    /// Returns the number of entries handled.
    pub async fn drain_sms_queue(&self) -> Result<usize, SwitchboardError> {
        let mut handled = 0;
        while let Some(entry) = self.storage.dequeue(OTP_SMS_QUEUE).await? {
            self.worker.handle_entry(entry).await;
            handled += 1;
        }
        Ok(handled)
    }

    /// The one-time code sent in the most recent SMS, read from the mock.
    pub async fn last_sms_code(&self) -> Option<String> {
        let sent = self.sms.sent_messages().await;
        let text = &sent.last()?.text;
        let code: String = text
            .split(|c: char| !c.is_ascii_digit())
            .find(|run| run.len() == 6)?
            .to_string();
        Some(code)
    }

    /// Decode the payload of every queued job. Exhausted entries have their
    /// payload cleared and are skipped.
    pub async fn queued_jobs(&self) -> Result<Vec<SmsJob>, SwitchboardError> {
        let db = self.sqlite.db()?;
        let payloads = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare("SELECT payload FROM queue ORDER BY id")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                rows.collect()
            })
            .await
            .map_err(switchboard_storage::database::map_tr_err)?;
        payloads
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| serde_json::from_str(p).map_err(SwitchboardError::storage))
            .collect()
    }

    /// Status of every queue entry, in insertion order.
    pub async fn queue_statuses(&self) -> Result<Vec<String>, SwitchboardError> {
        let db = self.sqlite.db()?;
        db.connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare("SELECT status FROM queue ORDER BY id")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                rows.collect()
            })
            .await
            .map_err(switchboard_storage::database::map_tr_err)
    }

    /// The audit log, oldest first.
    pub async fn audit_log(&self) -> Result<Vec<AuditRow>, SwitchboardError> {
        let db = self.sqlite.db()?;
        let rows = db
            .connection()
            .call(|conn| -> Result<Vec<(String, Option<String>, String, Option<String>, Option<String>)>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT actor_type, actor_id, action, entity_id, metadata
                     FROM audit_log ORDER BY id",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                })?;
                rows.collect()
            })
            .await
            .map_err(switchboard_storage::database::map_tr_err)?;
        Ok(rows
            .into_iter()
            .map(|(actor_type, actor_id, action, entity_id, metadata)| AuditRow {
                actor_type,
                actor_id,
                action,
                entity_id,
                metadata: metadata
                    .and_then(|m| serde_json::from_str(&m).ok())
                    .unwrap_or(Value::Null),
            })
            .collect())
    }

    /// Audit rows with the given action.
    pub async fn audit_for(&self, action: &str) -> Result<Vec<AuditRow>, SwitchboardError> {
        Ok(self
            .audit_log()
            .await?
            .into_iter()
            .filter(|row| row.action == action)
            .collect())
    }
}
