// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchboard sync`: one full backfill, report printed as JSON.

use std::sync::Arc;

use switchboard_config::SwitchboardConfig;
use switchboard_core::{SwitchboardError, SystemClock};
use switchboard_sync::SyncService;
use tracing::warn;

use crate::app::{Providers, init_tracing, open_storage};

pub async fn run_sync(config: SwitchboardConfig, days: Option<i64>) -> Result<(), SwitchboardError> {
    init_tracing(&config.service.log_level);

    let providers = Providers::from_config(&config)?;
    let Some(voice) = providers.voice else {
        return Err(SwitchboardError::Config(
            "sync needs elevenlabs.api_key to list conversations".into(),
        ));
    };

    let storage = open_storage(&config).await?;
    let service = SyncService::new(
        storage.clone(),
        voice,
        Arc::new(SystemClock),
        config.sync.clone(),
    )
    .with_agent_id(config.elevenlabs.agent_id.clone());

    let result = service.run_full(days).await;
    if let Err(e) = storage.close().await {
        warn!(error = %e, "failed to close storage cleanly");
    }

    let report = result?;
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|e| SwitchboardError::Internal(format!("failed to render sync report: {e}")))?;
    println!("{rendered}");
    Ok(())
}
