// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Switchboard configuration system.

use figment::Jail;
use switchboard_config::diagnostic::ConfigError;
use switchboard_config::{
    load_and_validate_path, load_and_validate_str, load_config_from_path, load_config_from_str,
};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[service]
name = "switchboard-test"
log_level = "debug"

[gateway]
host = "0.0.0.0"
port = 8080
api_token = "dash-token"

[storage]
database_path = "/tmp/switchboard.db"
wal_mode = false

[elevenlabs]
api_key = "xi-key"
agent_id = "agent_123"
webhook_secret = "voice-secret"

[builderbot]
base_url = "https://bot.example.com"
bot_number = "5491100000000"
webhook_secret = "wa-secret"

[twilio]
account_sid = "AC123"
auth_token = "tw-token"
from_number = "+15550001111"

[otp]
ttl_seconds = 120
max_attempts = 3
rate_limit_window_seconds = 600
rate_limit_max = 2
hash_secret = "pepper"

[sync]
enabled = false
lookback_hours = 6

[worker]
concurrency = 2
backoff_secs = 10
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.name, "switchboard-test");
    assert_eq!(config.gateway.port, 8080);
    assert_eq!(config.gateway.api_token.as_deref(), Some("dash-token"));
    assert!(!config.storage.wal_mode);
    assert_eq!(config.elevenlabs.agent_id.as_deref(), Some("agent_123"));
    assert_eq!(config.elevenlabs.base_url, "https://api.elevenlabs.io");
    assert_eq!(config.builderbot.bot_number.as_deref(), Some("5491100000000"));
    assert_eq!(config.twilio.from_number.as_deref(), Some("+15550001111"));
    assert_eq!(config.otp.ttl_seconds, 120);
    assert_eq!(config.otp.rate_limit_max, 2);
    assert!(!config.sync.enabled);
    assert_eq!(config.sync.lookback_hours, 6);
    assert_eq!(config.sync.interval_secs, 300);
    assert_eq!(config.worker.concurrency, 2);
    assert_eq!(config.worker.max_attempts, 5);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").unwrap();
    assert_eq!(config.gateway.host, "127.0.0.1");
    assert_eq!(config.otp.ttl_seconds, 300);
    assert_eq!(config.otp.max_attempts, 5);
    assert_eq!(config.otp.rate_limit_window_seconds, 900);
    assert_eq!(config.otp.rate_limit_max, 3);
    assert_eq!(config.worker.concurrency, 5);
}

#[test]
fn unknown_key_gets_suggestion() {
    let errors = load_and_validate_str("[otp]\nmax_atempts = 3\n").unwrap_err();
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::UnknownKey { key, suggestion: Some(s), .. }
            if key == "max_atempts" && s == "max_attempts"
    )));
}

#[test]
fn unknown_section_rejected() {
    let err = load_config_from_str("[telegram]\nbot_token = \"x\"\n").unwrap_err();
    assert!(err.to_string().contains("telegram"));
}

#[test]
fn wrong_type_reported() {
    let errors = load_and_validate_str("[gateway]\nport = \"eighty\"\n").unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("port")))
    );
}

#[test]
fn validation_errors_surface_through_loader() {
    let errors = load_and_validate_str("[worker]\nconcurrency = 0\n").unwrap_err();
    assert!(errors.iter().any(|e| matches!(e, ConfigError::Validation { .. })));
}

#[test]
fn secrets_redacted_in_debug() {
    let config = load_config_from_str(
        "[twilio]\nauth_token = \"super-secret\"\n[otp]\nhash_secret = \"pepper\"\n",
    )
    .unwrap();
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("super-secret"));
    assert!(!rendered.contains("pepper"));
    assert!(rendered.contains("[redacted]"));
}

#[test]
fn env_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "switchboard.toml",
            "[twilio]\nauth_token = \"from-file\"\n[gateway]\nport = 4000\n",
        )?;
        jail.set_env("SWITCHBOARD_TWILIO_AUTH_TOKEN", "from-env");
        jail.set_env("SWITCHBOARD_OTP_RATE_LIMIT_MAX", "7");

        let config = load_config_from_path("switchboard.toml".as_ref())?;
        assert_eq!(config.twilio.auth_token.as_deref(), Some("from-env"));
        assert_eq!(config.otp.rate_limit_max, 7);
        assert_eq!(config.gateway.port, 4000);
        Ok(())
    });
}

#[test]
fn unknown_key_in_file_reported() {
    Jail::expect_with(|jail| {
        jail.create_file("switchboard.toml", "[gateway]\nprot = 1\n")?;
        let errors = load_and_validate_path("switchboard.toml".as_ref()).unwrap_err();
        let found = errors.iter().any(|e| {
            matches!(
                e,
                ConfigError::UnknownKey { key, suggestion: Some(s), .. } if key == "prot" && s == "port"
            )
        });
        assert!(found, "expected an unknown-key error, got {errors:?}");
        Ok(())
    });
}
