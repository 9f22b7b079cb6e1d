// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI subcommands: `status`, `login`, `settings`, `watch`.

pub mod login;
pub mod settings;
pub mod status;
pub mod watch;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::broadcast::StateBroadcaster;
use crate::config::Config;
use crate::login::LoginSupervisor;
use crate::settings::SettingsStore;
use crate::validity::ValidityTracker;

/// Exit code for a login stopped by Ctrl-C, SIGTERM, or `cancel()`.
pub const EXIT_CANCELED: i32 = 130;

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Print token status. Exits 0 when the token is valid, 1 otherwise.
    Status,
    /// Run `vault login -method oidc` unless the token is still valid.
    Login,
    /// Show or change persisted settings.
    Settings(settings::SettingsArgs),
    /// Show live status until interrupted.
    Watch(watch::WatchArgs),
}

impl Command {
    pub fn validate(&self) -> anyhow::Result<()> {
        match self {
            Self::Settings(args) => args.validate(),
            Self::Status | Self::Login | Self::Watch(_) => Ok(()),
        }
    }
}

/// The shared engine every subcommand runs against.
pub struct App {
    pub broadcaster: Arc<StateBroadcaster>,
    pub settings: Arc<SettingsStore>,
    pub supervisor: Arc<LoginSupervisor>,
}

impl App {
    pub fn open(config: &Config) -> anyhow::Result<Self> {
        let broadcaster = Arc::new(StateBroadcaster::new());
        let settings_path = config.settings_path()?;
        debug!("loading settings from {}", settings_path.display());
        let settings = Arc::new(SettingsStore::open(settings_path, Arc::clone(&broadcaster))?);
        let tracker = ValidityTracker::new(config.token_path()?, Arc::clone(&settings));
        let supervisor = Arc::new(LoginSupervisor::new(
            Arc::clone(&settings),
            tracker,
            Arc::clone(&broadcaster),
        ));
        Ok(Self { broadcaster, settings, supervisor })
    }
}

/// Run the selected subcommand. Returns a process exit code.
pub async fn run(config: &Config) -> anyhow::Result<i32> {
    let app = App::open(config)?;
    match config.command {
        Command::Status => status::run(&app),
        Command::Login => Ok(login::run(&app, shutdown_on_signal()).await),
        Command::Settings(ref args) => settings::run(&app, args),
        Command::Watch(ref args) => watch::run(&app, args, config, shutdown_on_signal()).await,
    }
}

/// A token that fires on the first SIGINT or SIGTERM.
pub fn shutdown_on_signal() -> CancellationToken {
    let shutdown = CancellationToken::new();
    let sd = shutdown.clone();
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGTERM");
                sd.cancel();
            }
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGINT");
                sd.cancel();
            }
        }
    });
    shutdown
}
