// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-readable token status, and a view that re-renders it on every
//! broadcast event.

use std::io::Write;
use std::sync::{Arc, Weak};

use chrono::TimeDelta;
use parking_lot::Mutex;

use crate::broadcast::{Event, Observer};
use crate::login::LoginSupervisor;
use crate::settings::{executable_exists, Settings, SettingsStore};
use crate::validity::ValidityTracker;

/// What a status display should show right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    /// The configured `vault` binary is unusable; login cannot start.
    ExecutableMissing { path: String },
    LoginInProgress,
    Valid { remaining: TimeDelta },
    Invalid,
}

impl TokenStatus {
    pub fn probe(settings: &Settings, tracker: &ValidityTracker, login_in_progress: bool) -> Self {
        if !executable_exists(&settings.vault_executable_path) {
            return Self::ExecutableMissing { path: settings.vault_executable_path.clone() };
        }
        if login_in_progress {
            return Self::LoginInProgress;
        }
        let remaining = tracker.remaining_validity();
        if remaining > TimeDelta::zero() {
            Self::Valid { remaining }
        } else {
            Self::Invalid
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::ExecutableMissing { path } => vec![
                "Vault executable not found".to_owned(),
                format!("Please configure vault executable in settings: {path}"),
            ],
            Self::LoginInProgress => vec!["Login process ongoing...".to_owned()],
            Self::Valid { remaining } => {
                vec!["Token is valid".to_owned(), format!("Valid for: {}", format_remaining(*remaining))]
            }
            Self::Invalid => vec!["Token is invalid or not found".to_owned()],
        }
    }
}

/// `HHh MMm SSs`, zero-padded. Negative values render as zero.
pub fn format_remaining(remaining: TimeDelta) -> String {
    let secs = remaining.num_seconds().max(0);
    format!("{:02}h {:02}m {:02}s", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Renders [`TokenStatus`] to a writer whenever login state or settings change.
///
/// Holds the supervisor weakly: the supervisor owns the broadcaster this view
/// subscribes to.
pub struct StatusView<W> {
    settings: Arc<SettingsStore>,
    supervisor: Weak<LoginSupervisor>,
    out: Mutex<W>,
}

impl<W: Write + Send> StatusView<W> {
    pub fn new(settings: Arc<SettingsStore>, supervisor: &Arc<LoginSupervisor>, out: W) -> Self {
        Self { settings, supervisor: Arc::downgrade(supervisor), out: Mutex::new(out) }
    }

    pub fn current(&self) -> anyhow::Result<TokenStatus> {
        let supervisor = self
            .supervisor
            .upgrade()
            .ok_or_else(|| anyhow::anyhow!("login supervisor has shut down"))?;
        Ok(TokenStatus::probe(
            &self.settings.snapshot(),
            supervisor.tracker(),
            supervisor.is_in_progress(),
        ))
    }

    /// Probe and write the status, returning what was shown.
    pub fn render(&self) -> anyhow::Result<TokenStatus> {
        let status = self.current()?;
        let mut out = self.out.lock();
        for line in status.lines() {
            writeln!(out, "{line}")?;
        }
        out.flush()?;
        Ok(status)
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> Observer for StatusView<W> {
    fn on_event(&self, _event: &Event) -> anyhow::Result<()> {
        self.render().map(drop)
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
