// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `vtm watch` — live token status, optionally logging in automatically.

use std::io::Write;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::App;
use crate::broadcast::{Event, SubscriptionId, Topic};
use crate::config::Config;
use crate::error::LoginError;
use crate::login::LoginOutcome;
use crate::notify::{Notification, Notifier, TerminalNotifier};
use crate::status::{StatusView, TokenStatus};

#[derive(Debug, Default, clap::Args)]
pub struct WatchArgs {
    /// Start `vault login` whenever the token is invalid.
    #[arg(long)]
    pub auto_login: bool,
}

/// Decides when `--auto-login` should start an attempt.
///
/// A failed attempt, or one that succeeds without leaving a valid token,
/// suspends auto-login until settings change, so a broken configuration does
/// not relaunch the browser flow on every tick.
#[derive(Debug, Default)]
pub struct AutoLogin {
    suspended: bool,
}

impl AutoLogin {
    pub fn should_start(&self, status: &TokenStatus, login_running: bool) -> bool {
        !self.suspended && !login_running && *status == TokenStatus::Invalid
    }

    pub fn finished(&mut self, result: &Result<LoginOutcome, LoginError>, token_valid: bool) {
        match result {
            Err(e) => {
                info!("auto-login suspended until settings change: {e}");
                self.suspended = true;
            }
            Ok(_) if !token_valid => {
                warn!("login left no valid token; auto-login suspended until settings change");
                self.suspended = true;
            }
            Ok(_) => {}
        }
    }

    pub fn settings_changed(&mut self) {
        self.suspended = false;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }
}

pub async fn run(
    app: &App,
    args: &WatchArgs,
    config: &Config,
    shutdown: CancellationToken,
) -> anyhow::Result<i32> {
    watch(app, args, config, shutdown, std::io::stdout()).await?;
    Ok(0)
}

/// Render status to `out` every poll interval and on every event until
/// `shutdown` fires. Any running login is canceled on the way out.
pub async fn watch<W: Write + Send + 'static>(
    app: &App,
    args: &WatchArgs,
    config: &Config,
    shutdown: CancellationToken,
    out: W,
) -> anyhow::Result<()> {
    let view = Arc::new(StatusView::new(Arc::clone(&app.settings), &app.supervisor, out));
    let subscriptions: Vec<SubscriptionId> = [Topic::LoginState, Topic::SettingsChanged]
        .into_iter()
        .map(|topic| app.broadcaster.subscribe(topic, view.clone()))
        .collect();
    let (settings_sub, mut settings_rx) = app.broadcaster.subscribe_channel(Topic::SettingsChanged);

    let notifier = Arc::new(TerminalNotifier::stderr());
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let mut auto = AutoLogin::default();
    let mut login: Option<JoinHandle<()>> = None;
    let mut ticker = tokio::time::interval(config.status_poll());

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
            Some(Event::SettingsChanged) = settings_rx.recv() => {
                auto.settings_changed();
                continue;
            }
            Some(result) = done_rx.recv() => {
                auto.finished(&result, app.supervisor.tracker().is_valid());
                login = None;
                continue;
            }
        }

        let status = view.render()?;
        if args.auto_login && auto.should_start(&status, login.is_some()) {
            debug!("token invalid, starting auto-login");
            let supervisor = Arc::clone(&app.supervisor);
            let notifier = Arc::clone(&notifier);
            let done = done_tx.clone();
            login = Some(tokio::spawn(async move {
                let result = supervisor.ensure_token().await;
                notifier.notify(&Notification::for_login(&result));
                let _ = done.send(result);
            }));
        }
    }

    if app.supervisor.cancel().await {
        info!("canceled running login on shutdown");
    }
    if let Some(handle) = login {
        // Not yet registered with the supervisor; dropping the attempt tears it down.
        handle.abort();
        let _ = handle.await;
    }
    for id in subscriptions {
        app.broadcaster.unsubscribe(id);
    }
    app.broadcaster.unsubscribe(settings_sub);
    Ok(())
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
