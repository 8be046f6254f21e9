// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `/etc/switchboard/switchboard.toml`, then
//! `~/.config/switchboard/switchboard.toml`, then `./switchboard.toml`,
//! with `SWITCHBOARD_*` environment variables applied last.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SwitchboardConfig;

/// Config sections, in the order env keys are matched against them.
const SECTIONS: &[&str] = &[
    "service",
    "gateway",
    "storage",
    "elevenlabs",
    "builderbot",
    "twilio",
    "otp",
    "sync",
    "worker",
];

/// Candidate config files, lowest priority first.
pub fn config_file_candidates() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/switchboard/switchboard.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("switchboard/switchboard.toml"));
    }
    paths.push(PathBuf::from("switchboard.toml"));
    paths
}

/// Build the layered Figment (defaults, files, env).
pub fn build_figment() -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(SwitchboardConfig::default()));
    for path in config_file_candidates() {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(env_provider())
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<SwitchboardConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from an inline TOML string (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<SwitchboardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SwitchboardConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one explicit file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SwitchboardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SwitchboardConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Map `SWITCHBOARD_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `SWITCHBOARD_TWILIO_AUTH_TOKEN` maps to `twilio.auth_token`.
fn env_provider() -> Env {
    Env::prefixed("SWITCHBOARD_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("twilio_auth_token"), "twilio.auth_token");
        assert_eq!(map_env_key("otp_rate_limit_max"), "otp.rate_limit_max");
        assert_eq!(map_env_key("elevenlabs_webhook_secret"), "elevenlabs.webhook_secret");
        assert_eq!(map_env_key("gateway_port"), "gateway.port");
    }

    #[test]
    fn unknown_section_passes_through() {
        assert_eq!(map_env_key("mystery_key"), "mystery_key");
    }
}
