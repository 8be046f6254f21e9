// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Switchboard service.
//!
//! TOML files are merged over built-in defaults following the XDG hierarchy,
//! `SWITCHBOARD_*` environment variables override them, and unknown keys are
//! rejected with typo suggestions.
//!
//! ```no_run
//! use switchboard_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("listening on {}:{}", config.gateway.host, config.gateway.port);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::SwitchboardConfig;

/// Load from the standard hierarchy, then validate.
pub fn load_and_validate() -> Result<SwitchboardConfig, Vec<ConfigError>> {
    finish(loader::load_config(), read_sources(loader::config_file_candidates()))
}

/// Load one explicit file (plus env overrides), then validate.
pub fn load_and_validate_path(path: &Path) -> Result<SwitchboardConfig, Vec<ConfigError>> {
    finish(
        loader::load_config_from_path(path),
        read_sources(vec![path.to_path_buf()]),
    )
}

/// Load an inline TOML string, then validate.
pub fn load_and_validate_str(toml_content: &str) -> Result<SwitchboardConfig, Vec<ConfigError>> {
    // Inline sources carry no file metadata, so no spans are produced.
    finish(loader::load_config_from_str(toml_content), Vec::new())
}

fn finish(
    loaded: Result<SwitchboardConfig, figment::Error>,
    sources: Vec<(String, String)>,
) -> Result<SwitchboardConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            for warning in validation::warnings(&config) {
                tracing::warn!("{warning}");
            }
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources)),
    }
}

fn read_sources(paths: Vec<std::path::PathBuf>) -> Vec<(String, String)> {
    paths
        .into_iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            let absolute = std::path::absolute(&path).unwrap_or(path);
            Some((absolute.display().to_string(), content))
        })
        .collect()
}
