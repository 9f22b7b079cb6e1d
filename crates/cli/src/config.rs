// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::command::Command;
use crate::settings::default_settings_path;
use crate::validity::default_token_path;

/// Keeps the Vault token from `vault login -method oidc` fresh.
#[derive(Debug, Parser)]
#[command(name = "vtm", version, about)]
pub struct Config {
    /// Settings file (defaults to <config dir>/vtm/settings.json).
    #[arg(long, env = "VTM_SETTINGS", global = true)]
    pub settings: Option<PathBuf>,

    /// Token file whose modification time marks the last login (defaults to ~/.vault-token).
    #[arg(long, env = "VTM_TOKEN_PATH", global = true)]
    pub token_path: Option<PathBuf>,

    /// Log format (json or text).
    #[arg(long, env = "VTM_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "VTM_LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,

    // -- Duration overrides (skip from CLI; set in Config::test()) --------
    #[clap(skip)]
    pub status_poll_ms: Option<u64>,
}

fn env_duration_ms(var: &str, default: u64) -> Duration {
    let ms = std::env::var(var).ok().and_then(|v| v.parse().ok()).unwrap_or(default);
    Duration::from_millis(ms)
}

macro_rules! duration_field {
    ($method:ident, $field:ident, $env:literal, $default:expr) => {
        pub fn $method(&self) -> Duration {
            match self.$field {
                Some(ms) => Duration::from_millis(ms),
                None => env_duration_ms($env, $default),
            }
        }
    };
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other} (expected json or text)"),
        }

        if self.settings.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            anyhow::bail!("--settings must not be empty");
        }
        if self.token_path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            anyhow::bail!("--token-path must not be empty");
        }
        if self.token_path.as_ref().is_some_and(|p| p.is_dir()) {
            anyhow::bail!("--token-path must name a file, not a directory");
        }

        self.command.validate()
    }

    // -- Tuning knobs (field override → env var → compiled default) --------

    duration_field!(status_poll, status_poll_ms, "VTM_STATUS_POLL_MS", 1_000);

    pub fn settings_path(&self) -> anyhow::Result<PathBuf> {
        match self.settings {
            Some(ref path) => Ok(path.clone()),
            None => default_settings_path(),
        }
    }

    pub fn token_path(&self) -> anyhow::Result<PathBuf> {
        match self.token_path {
            Some(ref path) => Ok(path.clone()),
            None => default_token_path(),
        }
    }

    /// Build a minimal `Config` for tests (`status` command, fast polling).
    #[doc(hidden)]
    pub fn test() -> Self {
        Self {
            settings: None,
            token_path: None,
            log_format: "text".into(),
            log_level: "debug".into(),
            command: Command::Status,
            status_poll_ms: Some(20),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
