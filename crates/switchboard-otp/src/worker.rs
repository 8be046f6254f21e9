// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMS delivery worker for queued OTP sends.
//!
//! Pulls jobs from the `otp-sms` queue with at most `concurrency` in flight.
//! Retry counting and backoff belong to the queue: a failed job is handed
//! back with [`StorageAdapter::fail`] after domain state is marked FAILED.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use switchboard_config::model::WorkerConfig;
use switchboard_core::types::{
    ActorType, AuditEntry, Channel, Direction, InteractionPatch, InteractionStatus, NewEvent,
    NewMessage, QueueEntry,
};
use switchboard_core::{
    Clock, OtpPurpose, OtpStatus, Provider, SmsGateway, StorageAdapter, SwitchboardError,
};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::template;

/// Queue carrying OTP send jobs.
pub const OTP_SMS_QUEUE: &str = "otp-sms";

const CODE_MASK: &str = "******";

/// Payload of one queued send. Carries the plaintext code, which the
/// queue clears once the job completes or fails permanently.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsJob {
    pub challenge_id: String,
    pub correlation_id: String,
    pub interaction_id: String,
    pub phone: String,
    pub purpose: String,
    pub code: String,
}

impl std::fmt::Debug for SmsJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsJob")
            .field("challenge_id", &self.challenge_id)
            .field("correlation_id", &self.correlation_id)
            .field("interaction_id", &self.interaction_id)
            .field("purpose", &self.purpose)
            .field("code", &"[redacted]")
            .finish()
    }
}

/// What happened to one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobResult {
    Sent,
    /// The challenge already left PENDING/FAILED; nothing was sent.
    Skipped,
    /// The code expired while queued; the challenge was marked EXPIRED.
    Expired,
}

pub struct SmsWorker {
    storage: Arc<dyn StorageAdapter>,
    gateway: Arc<dyn SmsGateway>,
    clock: Arc<dyn Clock>,
    config: WorkerConfig,
    ttl_seconds: i64,
}

impl SmsWorker {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        gateway: Arc<dyn SmsGateway>,
        clock: Arc<dyn Clock>,
        config: WorkerConfig,
        ttl_seconds: i64,
    ) -> Self {
        Self {
            storage,
            gateway,
            clock,
            config,
            ttl_seconds,
        }
    }

    /// Poll the queue until `cancel` fires, then wait for in-flight jobs.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<(), SwitchboardError> {
        let concurrency = self.config.concurrency.max(1);
        let permits = Arc::new(Semaphore::new(concurrency));
        let idle = Duration::from_millis(self.config.poll_interval_ms.max(10));
        info!(concurrency, queue = OTP_SMS_QUEUE, "SMS worker started");

        loop {
            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            match self.storage.dequeue(OTP_SMS_QUEUE).await {
                Ok(Some(entry)) => {
                    let worker = Arc::clone(&self);
                    tokio::spawn(async move {
                        worker.handle_entry(entry).await;
                        drop(permit);
                    });
                    continue;
                }
                Ok(None) => drop(permit),
                Err(e) => {
                    drop(permit);
                    warn!(error = %e, "failed to poll SMS queue");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(idle) => {}
            }
        }

        info!("SMS worker stopping, waiting for in-flight jobs");
        let _drained = permits
            .acquire_many(concurrency as u32)
            .await
            .map_err(|e| SwitchboardError::Internal(format!("worker semaphore closed: {e}")))?;
        info!("SMS worker stopped");
        Ok(())
    }

    /// Process one dequeued entry and settle it with the queue.
    pub async fn handle_entry(&self, entry: QueueEntry) {
        let outcome = match serde_json::from_str::<SmsJob>(&entry.payload) {
            Ok(job) => self.process_job(&job).await,
            Err(e) => Err(SwitchboardError::Validation(format!(
                "malformed SMS job payload: {e}"
            ))),
        };

        let settled = match outcome {
            Ok(result) => {
                debug!(job_id = entry.id, result = ?result, "SMS job done");
                self.storage.ack(entry.id).await
            }
            Err(e) => {
                error!(job_id = entry.id, attempts = entry.attempts, error = %e, "SMS job failed");
                self.storage.fail(entry.id, self.config.backoff_secs).await
            }
        };
        if let Err(e) = settled {
            warn!(job_id = entry.id, error = %e, "failed to settle queue entry");
        }
    }

    /// Send one OTP SMS and record it.
    ///
    /// On failure the challenge and its interaction are marked FAILED and the
    /// error is returned so the queue can retry.
    pub async fn process_job(&self, job: &SmsJob) -> Result<JobResult, SwitchboardError> {
        if let Some(challenge) = self.storage.get_otp(&job.challenge_id).await? {
            if !matches!(challenge.status, OtpStatus::Pending | OtpStatus::Failed) {
                info!(
                    correlation_id = %job.correlation_id,
                    status = %challenge.status,
                    "challenge already settled, skipping send"
                );
                return Ok(JobResult::Skipped);
            }
            if challenge.expires_at < self.clock.now() {
                self.expire(job).await?;
                return Ok(JobResult::Expired);
            }
        }

        match self.deliver(job).await {
            Ok(()) => Ok(JobResult::Sent),
            Err(e) => {
                self.mark_failed(job, &e).await;
                Err(e)
            }
        }
    }

    async fn deliver(&self, job: &SmsJob) -> Result<(), SwitchboardError> {
        let purpose = OtpPurpose::from_str(&job.purpose).ok();
        let body = template::render(purpose, &job.code, self.ttl_seconds);
        let sent = self.gateway.send_sms(&job.phone, &body).await?;
        let now = self.clock.now();

        let message = self
            .storage
            .create_message(&NewMessage {
                interaction_id: job.interaction_id.clone(),
                channel: Channel::Sms,
                direction: Direction::Outbound,
                provider_message_id: sent.provider_message_id.clone(),
                text: Some(body.replace(&job.code, CODE_MASK)),
                media_url: None,
                provider_status: sent.status.clone(),
                sent_at: Some(now),
            })
            .await?;
        self.storage
            .update_otp_status(&job.challenge_id, OtpStatus::Sent, None)
            .await?;
        self.storage
            .patch_interaction(
                &job.interaction_id,
                &InteractionPatch {
                    status: Some(InteractionStatus::InProgress),
                    started_at: Some(now),
                    ..InteractionPatch::default()
                },
            )
            .await?;
        self.storage
            .create_event(&NewEvent {
                interaction_id: job.interaction_id.clone(),
                event_type: "otp.sms.sent".to_string(),
                provider: Provider::Twilio,
                provider_event_id: sent.provider_message_id.clone(),
                idempotency_key: None,
                payload: json!({
                    "challengeId": job.challenge_id,
                    "correlationId": job.correlation_id,
                    "messageId": message.id,
                    "providerStatus": sent.status,
                }),
            })
            .await?;
        self.storage
            .append_audit(
                &AuditEntry::new(ActorType::Worker, "otp.sms.sent", "otp_challenge")
                    .entity(job.challenge_id.clone())
                    .metadata(json!({
                        "success": true,
                        "correlationId": job.correlation_id,
                        "providerMessageId": sent.provider_message_id,
                    })),
            )
            .await?;

        info!(
            correlation_id = %job.correlation_id,
            provider_message_id = ?sent.provider_message_id,
            "OTP SMS sent"
        );
        Ok(())
    }

    async fn expire(&self, job: &SmsJob) -> Result<(), SwitchboardError> {
        let now = self.clock.now();
        if !self
            .storage
            .update_otp_status(&job.challenge_id, OtpStatus::Expired, None)
            .await?
        {
            return Ok(());
        }
        self.storage
            .patch_interaction(
                &job.interaction_id,
                &InteractionPatch::finished(InteractionStatus::Abandoned, None, now),
            )
            .await?;
        self.storage
            .append_audit(
                &AuditEntry::new(ActorType::Worker, "otp.sms.sent", "otp_challenge")
                    .entity(job.challenge_id.clone())
                    .metadata(json!({
                        "success": false,
                        "reason": "expired",
                        "correlationId": job.correlation_id,
                    })),
            )
            .await?;
        info!(correlation_id = %job.correlation_id, "code expired before delivery, not sent");
        Ok(())
    }

    async fn mark_failed(&self, job: &SmsJob, cause: &SwitchboardError) {
        let now = self.clock.now();
        match self
            .storage
            .update_otp_status(&job.challenge_id, OtpStatus::Failed, None)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(correlation_id = %job.correlation_id, "challenge settled meanwhile, left as is");
                return;
            }
            Err(e) => {
                warn!(correlation_id = %job.correlation_id, error = %e, "failed to mark challenge failed");
            }
        }
        if let Err(e) = self
            .storage
            .patch_interaction(
                &job.interaction_id,
                &InteractionPatch::finished(InteractionStatus::Failed, None, now),
            )
            .await
        {
            warn!(interaction_id = %job.interaction_id, error = %e, "failed to mark interaction failed");
        }
        let entry = AuditEntry::new(ActorType::Worker, "otp.sms.sent", "otp_challenge")
            .entity(job.challenge_id.clone())
            .metadata(json!({
                "success": false,
                "correlationId": job.correlation_id,
                "error": cause.to_string(),
            }));
        if let Err(e) = self.storage.append_audit(&entry).await {
            warn!(error = %e, "failed to write audit entry");
        }
    }
}
