// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchboard worker`: drains the OTP SMS queue.

use std::sync::Arc;

use switchboard_config::SwitchboardConfig;
use switchboard_core::{SwitchboardError, SystemClock};
use switchboard_otp::SmsWorker;
use tracing::{info, warn};

use crate::app::{Providers, init_tracing, open_storage};
use crate::shutdown;

pub async fn run_worker(config: SwitchboardConfig) -> Result<(), SwitchboardError> {
    init_tracing(&config.service.log_level);

    let providers = Providers::from_config(&config)?;
    let Some(gateway) = providers.sms else {
        return Err(SwitchboardError::Config(
            "the worker needs the [twilio] section to deliver codes".into(),
        ));
    };

    let storage = open_storage(&config).await?;
    let worker = Arc::new(SmsWorker::new(
        storage.clone(),
        gateway,
        Arc::new(SystemClock),
        config.worker.clone(),
        config.otp.ttl_seconds,
    ));

    let cancel = shutdown::install_signal_handler();
    let result = worker.run(cancel).await;

    if let Err(e) = storage.close().await {
        warn!(error = %e, "failed to close storage cleanly");
    }
    info!("SMS worker stopped");
    result
}
