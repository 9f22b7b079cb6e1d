// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-facing notifications for login outcomes.

use std::io::Write;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::error::LoginError;
use crate::login::LoginOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message to surface to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self { severity, message: message.into() }
    }

    /// The notification a finished `ensure_token` call should produce.
    pub fn for_login(result: &Result<LoginOutcome, LoginError>) -> Self {
        match result {
            Ok(LoginOutcome::LoggedIn) => {
                Self::new(Severity::Info, "Vault token generated successfully")
            }
            Ok(LoginOutcome::AlreadyValid) => Self::new(Severity::Info, "Vault token is still valid"),
            Err(e) if e.is_canceled() => {
                Self::new(Severity::Warning, "Vault login process was canceled")
            }
            Err(LoginError::AlreadyInProgress) => {
                Self::new(Severity::Warning, "Token generation already in progress")
            }
            Err(e) => Self::new(e.severity(), e.to_string()),
        }
    }
}

/// Sink for notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Writes one `<severity>: <message>` line per notification and mirrors it to
/// the log at the matching level.
pub struct TerminalNotifier<W> {
    out: Mutex<W>,
}

impl TerminalNotifier<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write> TerminalNotifier<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> Notifier for TerminalNotifier<W> {
    fn notify(&self, notification: &Notification) {
        let Notification { severity, message } = notification;
        match severity {
            Severity::Info => info!("{message}"),
            Severity::Warning => warn!("{message}"),
            Severity::Error => error!("{message}"),
        }
        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{severity}: {message}").and_then(|()| out.flush()) {
            warn!("failed to write notification: {e}");
        }
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
