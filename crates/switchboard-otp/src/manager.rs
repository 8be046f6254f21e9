// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OTP challenge creation and verification.
//!
//! State machine:
//!
//! ```text
//! PENDING -> SENT -> VERIFIED
//! PENDING -> SENT -> FAILED          (delivery failed)
//! PENDING/SENT -> EXPIRED            (verify after expires_at)
//! PENDING/SENT -> LOCKED             (attempt limit reached)
//! ```
//!
//! Creation returns as soon as the send job is queued; the SMS itself goes
//! out through [`SmsWorker`](crate::worker::SmsWorker).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use switchboard_config::model::OtpConfig;
use switchboard_core::phone::normalize_phone;
use switchboard_core::types::{
    ActorType, AuditEntry, Channel, Direction, InteractionPatch, InteractionStatus,
    InteractionUpsert, IssuedOtp, NewOtpChallenge, OtpChallenge, OtpRateLimit, Outcome, Provider,
    UNKNOWN_PARTY,
};
use switchboard_core::{Clock, OtpPurpose, OtpStatus, StorageAdapter, SwitchboardError};
use tracing::{debug, info, warn};

use crate::code::{generate_code, hash_code, verify_code};
use crate::worker::{OTP_SMS_QUEUE, SmsJob};

/// Request to issue a new code.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRequest {
    pub phone: String,
    pub purpose: OtpPurpose,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub customer_ref: Option<String>,
}

/// Returned to the caller once the challenge is stored and the send queued.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpCreated {
    pub correlation_id: String,
    pub interaction_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a verification attempt.
///
/// An unknown correlation id presents as `Invalid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerifyOutcome {
    Verified,
    Invalid,
    Expired,
    Locked,
}

impl VerifyOutcome {
    pub fn is_verified(self) -> bool {
        self == Self::Verified
    }

    /// Caller-facing message. Identical for unknown ids and wrong codes.
    pub fn message(self) -> &'static str {
        match self {
            Self::Verified => "code verified",
            Self::Invalid => "invalid or expired code",
            Self::Expired => "code expired, request a new one",
            Self::Locked => "too many attempts, request a new code",
        }
    }
}

/// Internal verdict, carrying the audit reason.
struct Verdict {
    outcome: VerifyOutcome,
    reason: &'static str,
    challenge: Option<OtpChallenge>,
}

impl Verdict {
    fn new(outcome: VerifyOutcome, reason: &'static str, challenge: Option<OtpChallenge>) -> Self {
        Self {
            outcome,
            reason,
            challenge,
        }
    }
}

pub struct OtpManager {
    storage: Arc<dyn StorageAdapter>,
    clock: Arc<dyn Clock>,
    config: OtpConfig,
    sender: String,
    job_attempts: i32,
}

impl OtpManager {
    pub fn new(storage: Arc<dyn StorageAdapter>, clock: Arc<dyn Clock>, config: OtpConfig) -> Self {
        Self {
            storage,
            clock,
            config,
            sender: UNKNOWN_PARTY.to_string(),
            job_attempts: 5,
        }
    }

    /// Number recorded as `from_number` on OTP interactions.
    pub fn with_sender(mut self, from_number: &str) -> Self {
        let number = normalize_phone(from_number);
        if !number.is_empty() {
            self.sender = number;
        }
        self
    }

    /// Delivery attempts allowed to each queued send job.
    pub fn with_job_attempts(mut self, attempts: i32) -> Self {
        self.job_attempts = attempts.max(1);
        self
    }

    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    /// Issue a challenge and queue its SMS.
    pub async fn create(&self, request: OtpRequest) -> Result<OtpCreated, SwitchboardError> {
        let phone = normalize_phone(&request.phone);
        if phone.is_empty() {
            return Err(SwitchboardError::Validation("`phone` is required".into()));
        }
        let correlation_id = match request.correlation_id.as_deref().map(str::trim) {
            Some("") => {
                return Err(SwitchboardError::Validation(
                    "`correlationId` must not be blank".into(),
                ));
            }
            Some(id) => id.to_string(),
            None => uuid::Uuid::new_v4().to_string(),
        };
        let now = self.clock.now();

        let code = generate_code();
        let otp_hash = hash_code(&self.config.hash_secret, &code)
            .ok_or_else(|| SwitchboardError::Internal("failed to hash OTP code".into()))?;
        let expires_at = now + Duration::seconds(self.config.ttl_seconds);

        let interaction = InteractionUpsert {
            provider: Provider::Twilio,
            channel: Channel::Sms,
            direction: Direction::Outbound,
            provider_conversation_id: Some(format!("otp:{correlation_id}")),
            from_number: self.sender.clone(),
            to_number: phone.clone(),
            fields: InteractionPatch {
                status: Some(InteractionStatus::New),
                intent: Some(request.purpose.to_string()),
                customer_ref: request.customer_ref.clone(),
                ..InteractionPatch::default()
            },
        };
        let new_challenge = NewOtpChallenge {
            phone: phone.clone(),
            purpose: request.purpose,
            otp_hash,
            expires_at,
            max_attempts: self.config.max_attempts,
            correlation_id: correlation_id.clone(),
            created_at: now,
        };
        let IssuedOtp {
            interaction,
            challenge,
        } = match self
            .storage
            .create_otp_challenge(&interaction, &new_challenge, &self.rate_limit())
            .await
        {
            Ok(issued) => issued,
            Err(SwitchboardError::RateLimited { retry_after_secs }) => {
                self.rate_limited(request.purpose, retry_after_secs).await;
                return Err(SwitchboardError::RateLimited { retry_after_secs });
            }
            Err(e) => return Err(e),
        };

        let job = SmsJob {
            challenge_id: challenge.id.clone(),
            correlation_id: correlation_id.clone(),
            interaction_id: interaction.id.clone(),
            phone: phone.clone(),
            purpose: request.purpose.to_string(),
            code,
        };
        let payload = serde_json::to_string(&job)
            .map_err(|e| SwitchboardError::Internal(format!("failed to encode SMS job: {e}")))?;
        if let Err(e) = self
            .storage
            .enqueue(OTP_SMS_QUEUE, &payload, self.job_attempts)
            .await
        {
            warn!(correlation_id = %correlation_id, error = %e, "failed to queue OTP send");
            self.storage
                .update_otp_status(&challenge.id, OtpStatus::Failed, None)
                .await?;
            self.storage
                .patch_interaction(
                    &interaction.id,
                    &InteractionPatch::finished(InteractionStatus::Failed, None, now),
                )
                .await?;
            return Err(e);
        }

        self.audit(
            AuditEntry::new(ActorType::Api, "otp.create", "otp_challenge")
                .entity(challenge.id.clone())
                .metadata(json!({
                    "success": true,
                    "correlationId": correlation_id,
                    "interactionId": interaction.id,
                    "purpose": request.purpose,
                    "expiresAt": expires_at,
                })),
        )
        .await;
        info!(
            correlation_id = %correlation_id,
            interaction_id = %interaction.id,
            purpose = %request.purpose,
            "OTP challenge created"
        );

        Ok(OtpCreated {
            correlation_id,
            interaction_id: interaction.id,
            expires_at,
        })
    }

    fn rate_limit(&self) -> OtpRateLimit {
        OtpRateLimit {
            window: Duration::seconds(self.config.rate_limit_window_seconds),
            max: self.config.rate_limit_max,
        }
    }

    async fn rate_limited(&self, purpose: OtpPurpose, retry_after_secs: u64) {
        warn!(purpose = %purpose, retry_after_secs, "OTP rate limit reached");
        self.audit(
            AuditEntry::new(ActorType::Api, "otp.create", "otp_challenge").metadata(json!({
                "success": false,
                "reason": "rate_limited",
                "purpose": purpose,
                "retryAfterSecs": retry_after_secs,
            })),
        )
        .await;
    }

    /// Check a submitted code. Writes exactly one audit entry per call.
    pub async fn verify(
        &self,
        correlation_id: &str,
        code: &str,
    ) -> Result<VerifyOutcome, SwitchboardError> {
        let result = self.evaluate(correlation_id, code).await;
        let mut entry = AuditEntry::new(ActorType::Api, "otp.verify", "otp_challenge");
        entry.metadata = match &result {
            Ok(verdict) => {
                entry.entity_id = verdict.challenge.as_ref().map(|c| c.id.clone());
                json!({
                    "success": verdict.outcome.is_verified(),
                    "reason": verdict.reason,
                    "correlationId": correlation_id,
                    "attempts": verdict.challenge.as_ref().map(|c| c.attempts),
                })
            }
            Err(e) => json!({
                "success": false,
                "reason": "error",
                "correlationId": correlation_id,
                "error": e.to_string(),
            }),
        };
        self.audit(entry).await;

        let outcome = result?.outcome;
        debug!(correlation_id, outcome = ?outcome, "OTP verification evaluated");
        Ok(outcome)
    }

    async fn evaluate(&self, correlation_id: &str, code: &str) -> Result<Verdict, SwitchboardError> {
        let Some(mut challenge) = self.storage.get_otp_by_correlation(correlation_id).await? else {
            return Ok(Verdict::new(VerifyOutcome::Invalid, "not_found", None));
        };
        if !challenge.status.is_open() {
            return Ok(settled(challenge));
        }

        let now = self.clock.now();
        if now > challenge.expires_at {
            self.storage
                .update_otp_status(&challenge.id, OtpStatus::Expired, None)
                .await?;
            return self.reload(challenge).await;
        }

        // The attempt is spent before the code is compared; no budget left
        // means the code is never looked at.
        let Some(attempts) = self.storage.increment_otp_attempts(&challenge.id).await? else {
            self.lock(&challenge).await?;
            return self.reload(challenge).await;
        };
        challenge.attempts = attempts;

        if !verify_code(&self.config.hash_secret, &challenge.otp_hash, code) {
            if attempts >= challenge.max_attempts {
                self.lock(&challenge).await?;
                challenge.status = OtpStatus::Locked;
                return Ok(Verdict::new(VerifyOutcome::Locked, "invalid_code", Some(challenge)));
            }
            return Ok(Verdict::new(VerifyOutcome::Invalid, "invalid_code", Some(challenge)));
        }

        if !self
            .storage
            .update_otp_status(&challenge.id, OtpStatus::Verified, Some(now))
            .await?
        {
            // Settled by a concurrent call between the attempt and now.
            return self.reload(challenge).await;
        }
        self.storage
            .patch_interaction(
                &challenge.interaction_id,
                &InteractionPatch::finished(InteractionStatus::Completed, Some(Outcome::Resolved), now),
            )
            .await?;
        challenge.status = OtpStatus::Verified;
        challenge.verified_at = Some(now);
        info!(correlation_id, "OTP verified");
        Ok(Verdict::new(VerifyOutcome::Verified, "verified", Some(challenge)))
    }

    /// Re-read a challenge whose state changed underneath and report it.
    async fn reload(&self, challenge: OtpChallenge) -> Result<Verdict, SwitchboardError> {
        let current = self.storage.get_otp(&challenge.id).await?.unwrap_or(challenge);
        Ok(settled(current))
    }

    async fn lock(&self, challenge: &OtpChallenge) -> Result<(), SwitchboardError> {
        if self
            .storage
            .update_otp_status(&challenge.id, OtpStatus::Locked, None)
            .await?
        {
            warn!(correlation_id = %challenge.correlation_id, "OTP challenge locked");
        }
        Ok(())
    }

    async fn audit(&self, entry: AuditEntry) {
        if let Err(e) = self.storage.append_audit(&entry).await {
            warn!(action = %entry.action, error = %e, "failed to write audit entry");
        }
    }
}

/// Verdict for a challenge that no longer accepts codes.
fn settled(challenge: OtpChallenge) -> Verdict {
    let (outcome, reason) = match challenge.status {
        OtpStatus::Expired => (VerifyOutcome::Expired, "expired"),
        OtpStatus::Verified => (VerifyOutcome::Invalid, "already_verified"),
        OtpStatus::Failed => (VerifyOutcome::Invalid, "delivery_failed"),
        OtpStatus::Locked | OtpStatus::Pending | OtpStatus::Sent => (VerifyOutcome::Locked, "locked"),
    };
    Verdict::new(outcome, reason, Some(challenge))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_messages_do_not_distinguish_unknown_ids() {
        assert_eq!(VerifyOutcome::Invalid.message(), "invalid or expired code");
        assert!(VerifyOutcome::Verified.is_verified());
        assert!(!VerifyOutcome::Locked.is_verified());
        assert_eq!(
            serde_json::to_value(VerifyOutcome::Locked).unwrap(),
            serde_json::json!("LOCKED")
        );
    }

    #[test]
    fn request_deserializes_camel_case() {
        let request: OtpRequest = serde_json::from_value(serde_json::json!({
            "phone": "+54 11 5555-0000",
            "purpose": "LOGIN_2FA",
            "correlationId": "corr-1",
        }))
        .unwrap();
        assert_eq!(request.purpose, OtpPurpose::Login2fa);
        assert_eq!(request.correlation_id.as_deref(), Some("corr-1"));
        assert!(request.customer_ref.is_none());
    }
}
