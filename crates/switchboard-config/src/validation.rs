// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.

use crate::diagnostic::ConfigError;
use crate::model::{DEFAULT_HASH_SECRET, SwitchboardConfig};

/// Validate a deserialized configuration, collecting every error.
pub fn validate_config(config: &SwitchboardConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("gateway.host must not be empty"));
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        errors.push(ConfigError::validation(format!(
            "gateway.host `{host}` is not a valid IP address or hostname"
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation("storage.database_path must not be empty"));
    }

    let otp = &config.otp;
    if otp.ttl_seconds <= 0 {
        errors.push(ConfigError::validation(format!(
            "otp.ttl_seconds must be positive, got {}",
            otp.ttl_seconds
        )));
    }
    if otp.max_attempts < 1 {
        errors.push(ConfigError::validation(format!(
            "otp.max_attempts must be at least 1, got {}",
            otp.max_attempts
        )));
    }
    if otp.rate_limit_window_seconds <= 0 || otp.rate_limit_max < 1 {
        errors.push(ConfigError::validation(
            "otp.rate_limit_window_seconds and otp.rate_limit_max must be positive",
        ));
    }
    if otp.hash_secret.is_empty() {
        errors.push(ConfigError::validation("otp.hash_secret must not be empty"));
    }

    if config.worker.concurrency == 0 {
        errors.push(ConfigError::validation("worker.concurrency must be at least 1"));
    }
    if config.worker.max_attempts < 1 {
        errors.push(ConfigError::validation("worker.max_attempts must be at least 1"));
    }
    if config.worker.backoff_secs < 0 {
        errors.push(ConfigError::validation("worker.backoff_secs must not be negative"));
    }

    if config.sync.enabled && config.sync.interval_secs == 0 {
        errors.push(ConfigError::validation(
            "sync.interval_secs must be positive when sync is enabled",
        ));
    }
    if config.sync.batch_limit == 0 {
        errors.push(ConfigError::validation("sync.batch_limit must be at least 1"));
    }

    for (name, secs) in [
        ("elevenlabs.timeout_secs", config.elevenlabs.timeout_secs),
        ("builderbot.timeout_secs", config.builderbot.timeout_secs),
        ("twilio.timeout_secs", config.twilio.timeout_secs),
    ] {
        if !(1..=120).contains(&secs) {
            errors.push(ConfigError::validation(format!(
                "{name} must be between 1 and 120 seconds, got {secs}"
            )));
        }
    }

    for (name, url) in [
        ("elevenlabs.base_url", &config.elevenlabs.base_url),
        ("builderbot.base_url", &config.builderbot.base_url),
        ("twilio.base_url", &config.twilio.base_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ConfigError::validation(format!(
                "{name} must be an http(s) URL, got `{url}`"
            )));
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Non-fatal problems worth logging at startup.
pub fn warnings(config: &SwitchboardConfig) -> Vec<String> {
    let mut out = Vec::new();
    if config.otp.hash_secret == DEFAULT_HASH_SECRET {
        out.push("otp.hash_secret is the built-in placeholder; set a real secret".to_string());
    }
    if config.gateway.api_token.is_none() {
        out.push("gateway.api_token is unset; every /api request will be rejected".to_string());
    }
    if config.elevenlabs.webhook_secret.is_none() {
        out.push("elevenlabs.webhook_secret is unset; voice webhooks will be rejected".to_string());
    }
    if config.builderbot.webhook_secret.is_none() {
        out.push(
            "builderbot.webhook_secret is unset; WhatsApp webhooks will be rejected".to_string(),
        );
    }
    if config.sync.enabled && config.elevenlabs.agent_id.is_none() {
        out.push("sync is enabled but elevenlabs.agent_id is unset".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&SwitchboardConfig::default()).is_ok());
    }

    #[test]
    fn zero_ttl_and_attempts_rejected() {
        let mut config = SwitchboardConfig::default();
        config.otp.ttl_seconds = 0;
        config.otp.max_attempts = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "otp.ttl_seconds"));
        assert!(has_error(&errors, "otp.max_attempts"));
    }

    #[test]
    fn bad_host_rejected() {
        let mut config = SwitchboardConfig::default();
        config.gateway.host = "not a host!".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "gateway.host"));
    }

    #[test]
    fn non_http_base_url_rejected() {
        let mut config = SwitchboardConfig::default();
        config.twilio.base_url = "ftp://api.twilio.com".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "twilio.base_url"));
    }

    #[test]
    fn out_of_range_timeouts_rejected() {
        let mut config = SwitchboardConfig::default();
        config.elevenlabs.timeout_secs = 0;
        config.builderbot.timeout_secs = 121;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "elevenlabs.timeout_secs"));
        assert!(has_error(&errors, "builderbot.timeout_secs"));
        assert!(!has_error(&errors, "twilio.timeout_secs"));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = SwitchboardConfig::default();
        config.storage.database_path = " ".into();
        config.worker.concurrency = 0;
        config.sync.batch_limit = 0;
        assert_eq!(validate_config(&config).unwrap_err().len(), 3);
    }

    #[test]
    fn placeholder_secret_warns() {
        let config = SwitchboardConfig::default();
        let warnings = warnings(&config);
        assert!(warnings.iter().any(|w| w.contains("otp.hash_secret")));
        assert!(warnings.iter().any(|w| w.contains("gateway.api_token")));
    }
}
