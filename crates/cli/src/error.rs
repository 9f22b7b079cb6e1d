// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use crate::notify::Severity;

/// Exit code reported for a process killed by SIGKILL (128 + 9).
///
/// A login process ends with this code when `cancel()` terminates it, so
/// callers treat it as a cancellation rather than a failure. A `vault` binary
/// that exits with 137 on its own is indistinguishable and is reported the
/// same way.
pub const CANCELED_EXIT_CODE: i32 = 137;

/// Failure of a login attempt.
///
/// Every variant is recoverable: by the time the caller sees it, the
/// supervisor is idle again and a new attempt may start.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("login process already in progress")]
    AlreadyInProgress,

    #[error("vault executable not found at: {path}")]
    ExecutableNotFound { path: String },

    #[error("login process timed out after {} seconds", timeout.as_secs())]
    LoginTimedOut { timeout: Duration },

    #[error("vault login failed with exit code: {code}")]
    LoginFailed { code: i32 },

    #[error("failed to run vault login: {0}")]
    ProcessLaunch(std::io::Error),

    #[error("failed to wait for vault login: {0}")]
    ProcessWait(std::io::Error),

    #[error("vault login process was interrupted")]
    InterruptedWait,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LoginError {
    /// Stable machine-readable code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyInProgress => "ALREADY_IN_PROGRESS",
            Self::ExecutableNotFound { .. } => "EXECUTABLE_NOT_FOUND",
            Self::LoginTimedOut { .. } => "LOGIN_TIMED_OUT",
            Self::LoginFailed { .. } => "LOGIN_FAILED",
            Self::ProcessLaunch(_) => "PROCESS_LAUNCH",
            Self::ProcessWait(_) => "PROCESS_WAIT",
            Self::InterruptedWait => "INTERRUPTED_WAIT",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }

    /// Whether the attempt ended because someone stopped it on purpose.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::LoginFailed { code: CANCELED_EXIT_CODE } | Self::InterruptedWait)
    }

    /// Exit code of the login process, when it got far enough to have one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::LoginFailed { code } => Some(*code),
            _ => None,
        }
    }

    /// How loudly a front end should report this failure.
    pub fn severity(&self) -> Severity {
        if self.is_canceled() || matches!(self, Self::AlreadyInProgress) {
            Severity::Warning
        } else {
            Severity::Error
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
