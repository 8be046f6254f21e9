// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchboard serve`: HTTP gateway plus the periodic conversation sync.

use std::sync::Arc;

use switchboard_config::SwitchboardConfig;
use switchboard_core::{Clock, SwitchboardError, SystemClock};
use switchboard_gateway::{AuthConfig, GatewayState, ServerConfig};
use switchboard_ingest::{WebhookDispatcher, WebhookSecrets};
use switchboard_otp::OtpManager;
use switchboard_sync::SyncService;
use tracing::{info, warn};

use crate::app::{Providers, init_tracing, open_storage};
use crate::shutdown;

pub async fn run_serve(config: SwitchboardConfig) -> Result<(), SwitchboardError> {
    init_tracing(&config.service.log_level);
    info!(service = %config.service.name, "starting switchboard gateway");

    let storage = open_storage(&config).await?;
    let providers = Providers::from_config(&config)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let mut dispatcher = WebhookDispatcher::new(
        storage.clone(),
        WebhookSecrets::from_config(&config),
        clock.clone(),
    );
    if let Some(voice) = &providers.voice {
        dispatcher = dispatcher.with_voice_api(voice.clone());
    }
    if let Some(sms) = &providers.sms {
        dispatcher = dispatcher.with_sms_gateway(sms.clone());
    }
    if let Some(bot) = &providers.bot {
        dispatcher = dispatcher.with_messaging_bot(bot.clone());
    }

    // Codes are only useful when a worker can deliver them.
    let otp = providers.sms.as_ref().map(|sms| {
        Arc::new(
            OtpManager::new(storage.clone(), clock.clone(), config.otp.clone())
                .with_sender(sms.from_number())
                .with_job_attempts(config.worker.max_attempts),
        )
    });

    let sync = providers.voice.as_ref().map(|voice| {
        Arc::new(
            SyncService::new(storage.clone(), voice.clone(), clock.clone(), config.sync.clone())
                .with_agent_id(config.elevenlabs.agent_id.clone()),
        )
    });

    if config.gateway.api_token.is_none() {
        warn!("gateway.api_token not set, every /api request will be rejected");
    }

    let state = GatewayState {
        storage: storage.clone(),
        dispatcher: Arc::new(dispatcher),
        otp,
        sync: sync.clone(),
        voice_api: providers.voice.clone(),
        auth: AuthConfig {
            bearer_token: config.gateway.api_token.clone(),
        },
        start_time: std::time::Instant::now(),
    };

    let cancel = shutdown::install_signal_handler();

    let sync_task = match sync {
        Some(service) if config.sync.enabled => Some(service.spawn_periodic(cancel.clone())),
        Some(_) => {
            info!("periodic sync disabled by configuration");
            None
        }
        None => None,
    };

    let server_config = ServerConfig {
        host: config.gateway.host.clone(),
        port: config.gateway.port,
    };
    let served = switchboard_gateway::start_server(&server_config, state, cancel.clone()).await;

    // A server error should also stop the sync loop.
    cancel.cancel();
    if let Some(task) = sync_task {
        if let Err(e) = task.await {
            warn!(error = %e, "sync task ended abnormally");
        }
    }

    if let Err(e) = storage.close().await {
        warn!(error = %e, "failed to close storage cleanly");
    }
    info!("switchboard gateway stopped");
    served
}
