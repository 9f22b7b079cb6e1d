// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;

#[yare::parameterized(
    already_in_progress = { LoginError::AlreadyInProgress, "ALREADY_IN_PROGRESS" },
    not_found = { LoginError::ExecutableNotFound { path: "/nope".into() }, "EXECUTABLE_NOT_FOUND" },
    timed_out = { LoginError::LoginTimedOut { timeout: Duration::from_secs(1) }, "LOGIN_TIMED_OUT" },
    failed = { LoginError::LoginFailed { code: 2 }, "LOGIN_FAILED" },
    interrupted = { LoginError::InterruptedWait, "INTERRUPTED_WAIT" },
    invalid_config = { LoginError::InvalidConfig("x".into()), "INVALID_CONFIG" },
)]
fn as_str_codes(err: LoginError, expected: &str) {
    assert_eq!(err.as_str(), expected);
}

#[yare::parameterized(
    sigkill_exit = { LoginError::LoginFailed { code: 137 }, true },
    interrupted = { LoginError::InterruptedWait, true },
    plain_failure = { LoginError::LoginFailed { code: 1 }, false },
    sigterm_exit = { LoginError::LoginFailed { code: 143 }, false },
    timed_out = { LoginError::LoginTimedOut { timeout: Duration::from_secs(5) }, false },
    busy = { LoginError::AlreadyInProgress, false },
)]
fn canceled_classification(err: LoginError, canceled: bool) {
    assert_eq!(err.is_canceled(), canceled);
}

#[yare::parameterized(
    canceled = { LoginError::LoginFailed { code: 137 }, Severity::Warning },
    busy = { LoginError::AlreadyInProgress, Severity::Warning },
    failed = { LoginError::LoginFailed { code: 1 }, Severity::Error },
    missing = { LoginError::ExecutableNotFound { path: "/x".into() }, Severity::Error },
    timed_out = { LoginError::LoginTimedOut { timeout: Duration::from_secs(5) }, Severity::Error },
)]
fn severity_mapping(err: LoginError, expected: Severity) {
    assert_eq!(err.severity(), expected);
}

#[test]
fn messages_carry_context() {
    let err = LoginError::LoginTimedOut { timeout: Duration::from_secs(60) };
    assert_eq!(err.to_string(), "login process timed out after 60 seconds");

    let err = LoginError::LoginFailed { code: 2 };
    assert_eq!(err.to_string(), "vault login failed with exit code: 2");
    assert_eq!(err.exit_code(), Some(2));

    let err = LoginError::ExecutableNotFound { path: "/usr/bin/vault".into() };
    assert_eq!(err.to_string(), "vault executable not found at: /usr/bin/vault");
    assert_eq!(err.exit_code(), None);
}

#[yare::parameterized(
    launch = { LoginError::ProcessLaunch(std::io::Error::other("no such device")), "failed to run vault login" },
    wait   = { LoginError::ProcessWait(std::io::Error::other("no such device")), "failed to wait for vault login" },
)]
fn io_error_is_reported_once(err: LoginError, prefix: &str) {
    let chain = format!("{:#}", anyhow::Error::from(err));
    assert!(chain.starts_with(prefix), "{chain}");
    assert_eq!(chain.matches("no such device").count(), 1, "{chain}");
}
