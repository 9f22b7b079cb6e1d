// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `vtm settings` — show or change persisted settings.

use std::io::Write;

use super::App;
use crate::settings::Settings;

/// CLI arguments for `vtm settings`.
#[derive(Debug, clap::Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SettingsCommand {
    /// Print the current settings as JSON.
    Show,
    /// Change one or more settings. Unnamed fields keep their value.
    Set(SetArgs),
}

#[derive(Debug, Default, clap::Args)]
pub struct SetArgs {
    /// Vault server address, exported as VAULT_ADDR.
    #[arg(long)]
    pub address: Option<String>,
    /// Hours a freshly written token stays valid.
    #[arg(long)]
    pub validity_hours: Option<i64>,
    /// Seconds to wait for the login flow before killing it.
    #[arg(long)]
    pub timeout_secs: Option<i64>,
    /// Path to the vault executable.
    #[arg(long)]
    pub executable: Option<String>,
}

impl SettingsArgs {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let SettingsCommand::Set(ref set) = self.command {
            if set.is_empty() {
                anyhow::bail!("settings set needs at least one of --address, --validity-hours, --timeout-secs, --executable");
            }
        }
        Ok(())
    }
}

impl SetArgs {
    pub fn is_empty(&self) -> bool {
        self.address.is_none()
            && self.validity_hours.is_none()
            && self.timeout_secs.is_none()
            && self.executable.is_none()
    }

    /// `current` with every named field replaced.
    pub fn apply(&self, current: Settings) -> Settings {
        Settings {
            vault_address: self.address.clone().unwrap_or(current.vault_address),
            token_validity_hours: self.validity_hours.unwrap_or(current.token_validity_hours),
            login_timeout_seconds: self.timeout_secs.unwrap_or(current.login_timeout_seconds),
            vault_executable_path: self.executable.clone().unwrap_or(current.vault_executable_path),
        }
    }
}

/// Run the `vtm settings` subcommand. Returns a process exit code.
pub fn run(app: &App, args: &SettingsArgs) -> anyhow::Result<i32> {
    match args.command {
        SettingsCommand::Show => {
            show(app, &mut std::io::stdout())?;
            Ok(0)
        }
        SettingsCommand::Set(ref set) => match app.settings.update(set.apply(app.settings.snapshot())) {
            Ok(()) => {
                if let Some(path) = app.settings.path() {
                    eprintln!("saved {}", path.display());
                }
                show(app, &mut std::io::stdout())?;
                Ok(0)
            }
            Err(e) => {
                eprintln!("error: {e:#}");
                Ok(1)
            }
        },
    }
}

pub fn show(app: &App, out: &mut impl Write) -> anyhow::Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(&app.settings.snapshot())?)?;
    Ok(())
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
