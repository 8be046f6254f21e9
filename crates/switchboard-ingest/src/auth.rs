// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-provider shared-secret checks for inbound webhooks.
//!
//! Tokens are compared as HMAC tags with `verify_slice`, which runs in
//! constant time regardless of where the inputs differ or how long they are.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use switchboard_config::SwitchboardConfig;
use switchboard_core::SwitchboardError;

type HmacSha256 = Hmac<Sha256>;

const TAG_KEY: &[u8] = b"switchboard-webhook-token";

/// How a missing header or secret is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPolicy {
    /// A configured secret and a matching header are both required.
    Required,
    /// An absent header (or no configured secret) skips the check; a
    /// present header must match.
    WhenPresent,
}

/// Webhook shared secrets, one per provider.
#[derive(Clone, Default)]
pub struct WebhookSecrets {
    pub voice: Option<String>,
    pub whatsapp: Option<String>,
    pub sms: Option<String>,
}

impl std::fmt::Debug for WebhookSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |s: &Option<String>| s.as_ref().map(|_| "[redacted]");
        f.debug_struct("WebhookSecrets")
            .field("voice", &redact(&self.voice))
            .field("whatsapp", &redact(&self.whatsapp))
            .field("sms", &redact(&self.sms))
            .finish()
    }
}

impl WebhookSecrets {
    pub fn from_config(config: &SwitchboardConfig) -> Self {
        Self {
            voice: config.elevenlabs.webhook_secret.clone(),
            whatsapp: config.builderbot.webhook_secret.clone(),
            sms: config.twilio.webhook_secret.clone(),
        }
    }
}

fn tag(token: &[u8]) -> Option<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(TAG_KEY).ok()?;
    mac.update(token);
    Some(mac)
}

/// Constant-time token equality.
pub fn tokens_match(expected: &str, supplied: &str) -> bool {
    match (tag(expected.as_bytes()), tag(supplied.as_bytes())) {
        (Some(expected), Some(supplied)) => {
            let expected_tag = expected.finalize().into_bytes();
            supplied.verify_slice(&expected_tag).is_ok()
        }
        _ => false,
    }
}

/// Check a webhook token against the configured secret.
pub fn check_token(
    source: &str,
    policy: TokenPolicy,
    expected: Option<&str>,
    supplied: Option<&str>,
) -> Result<(), SwitchboardError> {
    let supplied = supplied.map(str::trim).filter(|s| !s.is_empty());
    match (policy, expected, supplied) {
        (TokenPolicy::Required, None, _) => Err(SwitchboardError::Authentication(format!(
            "{source} webhook secret is not configured"
        ))),
        (TokenPolicy::Required, Some(_), None) => Err(SwitchboardError::Authentication(format!(
            "missing {source} webhook token"
        ))),
        (TokenPolicy::WhenPresent, None, _) | (TokenPolicy::WhenPresent, _, None) => Ok(()),
        (_, Some(expected), Some(supplied)) => {
            if tokens_match(expected, supplied) {
                Ok(())
            } else {
                Err(SwitchboardError::Authentication(format!(
                    "invalid {source} webhook token"
                )))
            }
        }
    }
}
