// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted Vault settings and the store that broadcasts changes to them.
//!
//! Settings live in `<config_dir>/vtm/settings.json`. A missing file means
//! defaults. Every successful [`SettingsStore::update`] publishes
//! [`Event::SettingsChanged`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::Context;
use chrono::TimeDelta;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::broadcast::{Event, StateBroadcaster};
use crate::error::LoginError;

const APP_NAME: &str = "vtm";
const SETTINGS_FILE: &str = "settings.json";

const DEFAULT_VAULT_ADDRESS: &str = "https://vault.your-address.com";
const DEFAULT_TOKEN_VALIDITY_HOURS: i64 = 12;
const DEFAULT_LOGIN_TIMEOUT_SECONDS: i64 = 60;

/// User-editable Vault settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server address exported to the login process as `VAULT_ADDR`.
    pub vault_address: String,
    /// How long a freshly written token is considered valid.
    pub token_validity_hours: i64,
    /// How long to wait for the browser login flow before giving up.
    pub login_timeout_seconds: i64,
    /// Path to the `vault` CLI.
    pub vault_executable_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault_address: DEFAULT_VAULT_ADDRESS.to_owned(),
            token_validity_hours: DEFAULT_TOKEN_VALIDITY_HOURS,
            login_timeout_seconds: DEFAULT_LOGIN_TIMEOUT_SECONDS,
            vault_executable_path: default_vault_path().to_owned(),
        }
    }
}

/// A single rejected settings field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

impl Settings {
    /// Validity window as a signed delta. Rejects non-positive hours.
    pub fn token_validity(&self) -> Result<TimeDelta, LoginError> {
        if self.token_validity_hours <= 0 {
            return Err(LoginError::InvalidConfig(format!(
                "token validity must be a positive number of hours, got {}",
                self.token_validity_hours
            )));
        }
        TimeDelta::try_hours(self.token_validity_hours).ok_or_else(|| {
            LoginError::InvalidConfig(format!(
                "token validity of {} hours is out of range",
                self.token_validity_hours
            ))
        })
    }

    /// Login timeout. Rejects non-positive seconds.
    pub fn login_timeout(&self) -> Result<Duration, LoginError> {
        u64::try_from(self.login_timeout_seconds)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                LoginError::InvalidConfig(format!(
                    "login timeout must be a positive number of seconds, got {}",
                    self.login_timeout_seconds
                ))
            })
    }

    /// Check every field. Returns an empty list when the settings are usable.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        let address = self.vault_address.trim();
        if address.is_empty() {
            errors.push(FieldError::new("vault_address", "vault address cannot be empty"));
        } else if !is_valid_address(address) {
            errors.push(FieldError::new("vault_address", "invalid vault address format"));
        }

        if self.token_validity_hours <= 0 {
            errors.push(FieldError::new(
                "token_validity_hours",
                "token validity must be a positive number",
            ));
        }

        if self.login_timeout_seconds <= 0 {
            errors.push(FieldError::new(
                "login_timeout_seconds",
                "login timeout must be a positive number",
            ));
        }

        let exe = self.vault_executable_path.trim();
        if exe.is_empty() {
            errors.push(FieldError::new(
                "vault_executable_path",
                "vault executable path cannot be empty",
            ));
        } else if !Path::new(exe).exists() {
            errors.push(FieldError::new("vault_executable_path", "vault executable file not found"));
        } else if !executable_exists(exe) {
            errors.push(FieldError::new(
                "vault_executable_path",
                "vault executable does not have execution permissions",
            ));
        }

        errors
    }
}

/// Default `vault` location for the host OS.
pub fn default_vault_path() -> &'static str {
    if cfg!(target_os = "macos") {
        "/opt/homebrew/bin/vault"
    } else if cfg!(windows) {
        "C:\\Program Files\\vault\\vault.exe"
    } else {
        "/usr/bin/vault"
    }
}

/// True iff `path` is a regular file the current user could execute.
pub fn executable_exists(path: impl AsRef<Path>) -> bool {
    let Ok(metadata) = std::fs::metadata(path.as_ref()) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

fn is_valid_address(address: &str) -> bool {
    static URL: OnceLock<Option<Regex>> = OnceLock::new();
    static HOST: OnceLock<Option<Regex>> = OnceLock::new();

    let url = URL.get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://[^\s/?#]+\S*$").ok());
    let host = HOST.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .ok()
    });

    url.as_ref().is_some_and(|re| re.is_match(address))
        || host.as_ref().is_some_and(|re| re.is_match(address))
}

/// `<config_dir>/vtm/settings.json`.
pub fn default_settings_path() -> anyhow::Result<PathBuf> {
    let config_dir =
        dirs::config_dir().ok_or_else(|| anyhow::anyhow!("could not find config directory"))?;
    Ok(config_dir.join(APP_NAME).join(SETTINGS_FILE))
}

/// Shared, persisted settings. Reads hand out snapshots; writes validate,
/// persist, then publish [`Event::SettingsChanged`].
pub struct SettingsStore {
    path: Option<PathBuf>,
    current: RwLock<Settings>,
    broadcaster: Arc<StateBroadcaster>,
}

impl SettingsStore {
    /// Load settings from `path`, falling back to defaults if it does not exist.
    pub fn open(path: PathBuf, broadcaster: Arc<StateBroadcaster>) -> anyhow::Result<Self> {
        let settings = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse settings file {}", path.display()))?
        } else {
            debug!("no settings file at {}, using defaults", path.display());
            Settings::default()
        };
        Ok(Self { path: Some(path), current: RwLock::new(settings), broadcaster })
    }

    /// Settings that are never written to disk.
    pub fn in_memory(settings: Settings, broadcaster: Arc<StateBroadcaster>) -> Self {
        Self { path: None, current: RwLock::new(settings), broadcaster }
    }

    pub fn snapshot(&self) -> Settings {
        self.current.read().clone()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Replace the settings. Rejects invalid values without touching state.
    pub fn update(&self, settings: Settings) -> anyhow::Result<()> {
        let errors = settings.validate();
        if !errors.is_empty() {
            let mut msg = String::from("cannot apply settings due to validation errors:");
            for e in &errors {
                msg.push_str(&format!("\n  {}: {}", e.field, e.message));
            }
            anyhow::bail!(msg);
        }

        if let Some(ref path) = self.path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let contents = serde_json::to_string_pretty(&settings)?;
            std::fs::write(path, contents)
                .with_context(|| format!("failed to write settings file {}", path.display()))?;
        }

        *self.current.write() = settings;
        info!("settings updated");
        self.broadcaster.publish(Event::SettingsChanged);
        Ok(())
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
