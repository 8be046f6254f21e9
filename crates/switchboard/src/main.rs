// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Switchboard - contact-center back office.
//!
//! This is the binary entry point.

mod app;
mod serve;
mod shutdown;
mod sync;
mod worker;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use switchboard_config::SwitchboardConfig;

/// Switchboard - webhook ingestion, OTP delivery and conversation sync.
#[derive(Parser, Debug)]
#[command(name = "switchboard", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Start the HTTP gateway and the periodic sync.
    Serve,
    /// Run the OTP SMS delivery worker.
    Worker,
    /// Run one full sync against the voice provider and exit.
    Sync {
        /// Days to look back (defaults to `sync.full_sync_days`).
        #[arg(long)]
        days: Option<i64>,
    },
    /// Validate configuration and exit.
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> Result<SwitchboardConfig, Vec<switchboard_config::ConfigError>> {
    match path {
        Some(path) => switchboard_config::load_and_validate_path(path),
        None => switchboard_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            switchboard_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::CheckConfig => {
            println!(
                "switchboard: configuration OK (service.name={}, gateway={}:{})",
                config.service.name, config.gateway.host, config.gateway.port
            );
            for warning in switchboard_config::validation::warnings(&config) {
                println!("  warning: {warning}");
            }
            Ok(())
        }
        Commands::Serve => serve::run_serve(config).await,
        Commands::Worker => worker::run_worker(config).await,
        Commands::Sync { days } => sync::run_sync(config, days).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "switchboard exited with an error");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["switchboard", "serve"]).unwrap();
        assert_eq!(cli.command, Commands::Serve);

        let cli = Cli::try_parse_from(["switchboard", "sync", "--days", "7"]).unwrap();
        assert_eq!(cli.command, Commands::Sync { days: Some(7) });

        let cli =
            Cli::try_parse_from(["switchboard", "--config", "/tmp/sb.toml", "check-config"]).unwrap();
        assert_eq!(cli.command, Commands::CheckConfig);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/sb.toml")));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["switchboard"]).is_err());
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = switchboard_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.service.name, "switchboard");
    }
}
