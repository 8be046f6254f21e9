// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup. Secrets are redacted from `Debug` output.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level Switchboard configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. Every section defaults to usable values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchboardConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// HTTP gateway bind address and API token.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Voice-AI provider (ElevenLabs) credentials and webhook secret.
    #[serde(default)]
    pub elevenlabs: ElevenlabsConfig,

    /// WhatsApp bot provider (Builderbot) credentials and webhook secret.
    #[serde(default)]
    pub builderbot: BuilderbotConfig,

    /// SMS gateway (Twilio) credentials and webhook secret.
    #[serde(default)]
    pub twilio: TwilioConfig,

    /// OTP expiry, attempt and rate-limit policy.
    #[serde(default)]
    pub otp: OtpConfig,

    /// Background conversation sync.
    #[serde(default)]
    pub sync: SyncConfig,

    /// SMS delivery worker.
    #[serde(default)]
    pub worker: WorkerConfig,
}

fn redacted(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "[redacted]")
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name used in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "switchboard".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP gateway configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Static bearer token for the dashboard API. `None` rejects every API call.
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_token: None,
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_token", &redacted(&self.api_token))
            .finish()
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("switchboard").join("switchboard.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("switchboard.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    15
}

/// ElevenLabs conversational-AI configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ElevenlabsConfig {
    /// API key sent as `xi-api-key`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Agent whose conversations are synced.
    #[serde(default)]
    pub agent_id: Option<String>,

    /// API base URL.
    #[serde(default = "default_elevenlabs_url")]
    pub base_url: String,

    /// Shared secret expected in `X-Webhook-Token`.
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Outbound request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ElevenlabsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            agent_id: None,
            base_url: default_elevenlabs_url(),
            webhook_secret: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl fmt::Debug for ElevenlabsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElevenlabsConfig")
            .field("api_key", &redacted(&self.api_key))
            .field("agent_id", &self.agent_id)
            .field("base_url", &self.base_url)
            .field("webhook_secret", &redacted(&self.webhook_secret))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_elevenlabs_url() -> String {
    "https://api.elevenlabs.io".to_string()
}

/// Builderbot WhatsApp bot configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BuilderbotConfig {
    /// API key sent as `x-api-builderbot`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Bot deployment base URL.
    #[serde(default = "default_builderbot_url")]
    pub base_url: String,

    /// The bot's own WhatsApp number, used as the `to` of inbound threads.
    #[serde(default)]
    pub bot_number: Option<String>,

    /// Shared secret expected in `X-Webhook-Token` (or `?token=`).
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Outbound request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BuilderbotConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_builderbot_url(),
            bot_number: None,
            webhook_secret: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl fmt::Debug for BuilderbotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderbotConfig")
            .field("api_key", &redacted(&self.api_key))
            .field("base_url", &self.base_url)
            .field("bot_number", &self.bot_number)
            .field("webhook_secret", &redacted(&self.webhook_secret))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_builderbot_url() -> String {
    "http://127.0.0.1:3008".to_string()
}

/// Twilio SMS configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TwilioConfig {
    /// Account SID (basic-auth user).
    #[serde(default)]
    pub account_sid: Option<String>,

    /// Auth token (basic-auth password).
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Sender number for outbound SMS.
    #[serde(default)]
    pub from_number: Option<String>,

    /// API base URL.
    #[serde(default = "default_twilio_url")]
    pub base_url: String,

    /// Public URL Twilio posts delivery statuses to.
    #[serde(default)]
    pub status_callback_url: Option<String>,

    /// Shared secret compared against `X-Webhook-Token` when the header is sent.
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Outbound request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: None,
            base_url: default_twilio_url(),
            status_callback_url: None,
            webhook_secret: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &redacted(&self.auth_token))
            .field("from_number", &self.from_number)
            .field("base_url", &self.base_url)
            .field("status_callback_url", &self.status_callback_url)
            .field("webhook_secret", &redacted(&self.webhook_secret))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_twilio_url() -> String {
    "https://api.twilio.com".to_string()
}

/// OTP challenge policy.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OtpConfig {
    /// Lifetime of a code in seconds.
    #[serde(default = "default_otp_ttl")]
    pub ttl_seconds: i64,

    /// Verification attempts allowed before the challenge locks.
    #[serde(default = "default_otp_max_attempts")]
    pub max_attempts: i32,

    /// Sliding window for the per-(phone, purpose) creation limit.
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_seconds: i64,

    /// Challenges allowed per window.
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: i64,

    /// Server-side HMAC key mixed into every code hash.
    #[serde(default = "default_hash_secret")]
    pub hash_secret: String,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_otp_ttl(),
            max_attempts: default_otp_max_attempts(),
            rate_limit_window_seconds: default_rate_limit_window(),
            rate_limit_max: default_rate_limit_max(),
            hash_secret: default_hash_secret(),
        }
    }
}

impl fmt::Debug for OtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtpConfig")
            .field("ttl_seconds", &self.ttl_seconds)
            .field("max_attempts", &self.max_attempts)
            .field("rate_limit_window_seconds", &self.rate_limit_window_seconds)
            .field("rate_limit_max", &self.rate_limit_max)
            .field("hash_secret", &"[redacted]")
            .finish()
    }
}

fn default_otp_ttl() -> i64 {
    300
}

fn default_otp_max_attempts() -> i32 {
    5
}

fn default_rate_limit_window() -> i64 {
    900
}

fn default_rate_limit_max() -> i64 {
    3
}

/// Placeholder key; validation warns when it is left in place.
pub const DEFAULT_HASH_SECRET: &str = "change-me";

fn default_hash_secret() -> String {
    DEFAULT_HASH_SECRET.to_string()
}

/// Background sync configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Run the periodic sync inside `serve`.
    #[serde(default = "default_sync_enabled")]
    pub enabled: bool,

    /// Seconds between periodic runs.
    #[serde(default = "default_sync_interval")]
    pub interval_secs: u64,

    /// How far back each periodic run looks.
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,

    /// Window used by a manual full sync.
    #[serde(default = "default_full_sync_days")]
    pub full_sync_days: i64,

    /// Maximum conversations processed per run.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: default_sync_enabled(),
            interval_secs: default_sync_interval(),
            lookback_hours: default_lookback_hours(),
            full_sync_days: default_full_sync_days(),
            batch_limit: default_batch_limit(),
        }
    }
}

fn default_sync_enabled() -> bool {
    true
}

fn default_sync_interval() -> u64 {
    300
}

fn default_lookback_hours() -> i64 {
    24
}

fn default_full_sync_days() -> i64 {
    30
}

fn default_batch_limit() -> usize {
    100
}

/// SMS delivery worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Jobs processed simultaneously.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Idle delay between queue polls in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Deliveries attempted before a job is marked permanently failed.
    #[serde(default = "default_job_attempts")]
    pub max_attempts: i32,

    /// Base retry delay; multiplied by the attempt number.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: default_job_attempts(),
            backoff_secs: default_backoff_secs(),
        }
    }
}

fn default_concurrency() -> usize {
    5
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_job_attempts() -> i32 {
    5
}

fn default_backoff_secs() -> i64 {
    30
}
