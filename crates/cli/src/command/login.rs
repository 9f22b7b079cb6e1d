// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `vtm login` — make sure a valid token exists, logging in if needed.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{App, EXIT_CANCELED};
use crate::error::LoginError;
use crate::login::LoginOutcome;
use crate::notify::{Notification, Notifier, TerminalNotifier};

/// Run one login attempt. `shutdown` cancels it. Returns a process exit code.
pub async fn run(app: &App, shutdown: CancellationToken) -> i32 {
    let result = login(app, shutdown).await;
    TerminalNotifier::stderr().notify(&Notification::for_login(&result));
    exit_code(&result)
}

/// `ensure_token`, canceled through the supervisor when `shutdown` fires.
pub async fn login(app: &App, shutdown: CancellationToken) -> Result<LoginOutcome, LoginError> {
    let supervisor = Arc::clone(&app.supervisor);
    let signal = shutdown.clone();
    let canceller = tokio::spawn(async move {
        signal.cancelled().await;
        supervisor.cancel().await;
    });

    // A signal that lands before the process is spawned finds nothing to
    // cancel; passing `shutdown` as the interrupt covers that window too.
    let result = app.supervisor.ensure_token_with(&shutdown).await;
    canceller.abort();
    result
}

pub fn exit_code(result: &Result<LoginOutcome, LoginError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) if e.is_canceled() => EXIT_CANCELED,
        Err(_) => 1,
    }
}

#[cfg(test)]
#[path = "login_tests.rs"]
mod tests;
