// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring shared by the subcommands: tracing, storage, and vendor clients.

use std::sync::Arc;

use switchboard_config::SwitchboardConfig;
use switchboard_core::{MessagingBot, SmsGateway, StorageAdapter, SwitchboardError, VoiceAgentApi};
use switchboard_providers::{BuilderbotClient, ElevenlabsClient, TwilioClient};
use switchboard_storage::SqliteStorage;
use tracing::info;

/// Initialize the tracing subscriber. `RUST_LOG` wins over the config level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("switchboard={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

pub async fn open_storage(config: &SwitchboardConfig) -> Result<Arc<dyn StorageAdapter>, SwitchboardError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    info!(path = %config.storage.database_path, "storage ready");
    Ok(Arc::new(storage))
}

/// Vendor clients for the sections that carry credentials.
#[derive(Clone, Default)]
pub struct Providers {
    pub voice: Option<Arc<dyn VoiceAgentApi>>,
    pub sms: Option<Arc<dyn SmsGateway>>,
    pub bot: Option<Arc<dyn MessagingBot>>,
}

impl Providers {
    /// Build every client whose section is configured. A partially
    /// configured section is an error.
    pub fn from_config(config: &SwitchboardConfig) -> Result<Self, SwitchboardError> {
        let mut providers = Self::default();

        if config.elevenlabs.api_key.is_some() {
            providers.voice = Some(Arc::new(ElevenlabsClient::new(&config.elevenlabs)?));
        } else {
            info!("elevenlabs.api_key not set, voice enrichment and sync disabled");
        }

        if config.twilio.account_sid.is_some() {
            providers.sms = Some(Arc::new(TwilioClient::new(&config.twilio)?));
        } else {
            info!("twilio.account_sid not set, SMS sending disabled");
        }

        if config.builderbot.api_key.is_some() || config.builderbot.bot_number.is_some() {
            providers.bot = Some(Arc::new(BuilderbotClient::new(&config.builderbot)?));
        } else {
            info!("builderbot section not configured, WhatsApp sending disabled");
        }

        Ok(providers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_builds_no_clients() {
        let providers = Providers::from_config(&SwitchboardConfig::default()).unwrap();
        assert!(providers.voice.is_none());
        assert!(providers.sms.is_none());
        assert!(providers.bot.is_none());
    }

    #[test]
    fn partial_twilio_section_is_an_error() {
        let mut config = SwitchboardConfig::default();
        config.twilio.account_sid = Some("AC123".into());
        assert!(Providers::from_config(&config).is_err());
    }

    #[test]
    fn voice_client_built_from_api_key() {
        let mut config = SwitchboardConfig::default();
        config.elevenlabs.api_key = Some("xi-key".into());
        let providers = Providers::from_config(&config).unwrap();
        assert!(providers.voice.is_some());
    }
}
