// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight supervision of `vault login -method oidc`.
//!
//! At most one attempt runs at a time. The in-progress flag is claimed with a
//! compare-and-swap, and the attempt slot (`current`) is the single point
//! where `cancel()` and the attempt's own exit/timeout path agree on who ends
//! it. Only the task running [`LoginSupervisor::ensure_token`] touches the
//! child process; `cancel()` signals it and waits for teardown to finish.

use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broadcast::{Event, StateBroadcaster};
use crate::error::LoginError;
use crate::settings::{executable_exists, SettingsStore};
use crate::validity::ValidityTracker;

/// Environment variable `vault` reads its server address from.
pub const VAULT_ADDR_ENV: &str = "VAULT_ADDR";

/// Arguments passed to the vault executable.
pub const LOGIN_ARGS: [&str; 3] = ["login", "-method", "oidc"];

/// Successful result of [`LoginSupervisor::ensure_token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The existing token was still valid; nothing was spawned.
    AlreadyValid,
    /// `vault login` ran and exited cleanly.
    LoggedIn,
}

/// Bookkeeping for the attempt currently holding the in-progress flag.
struct ActiveAttempt {
    id: u64,
    pid: Option<u32>,
    /// Fired by `cancel()` to make the owning task kill the child.
    cancel: CancellationToken,
    /// Fired by the owning task once teardown is complete.
    done: CancellationToken,
}

enum WaitResult {
    Exited(std::io::Result<ExitStatus>),
    Stopped(StopReason),
}

#[derive(Debug, Clone, Copy)]
enum StopReason {
    TimedOut,
    Canceled,
    Interrupted,
}

/// How [`terminate`] left the child.
enum Teardown {
    /// It exited on its own before the kill landed.
    Exited(ExitStatus),
    Killed(ExitStatus),
}

/// Launches, times out, and cancels vault login attempts.
pub struct LoginSupervisor {
    settings: Arc<SettingsStore>,
    tracker: ValidityTracker,
    broadcaster: Arc<StateBroadcaster>,
    in_progress: AtomicBool,
    current: Mutex<Option<ActiveAttempt>>,
    next_attempt: AtomicU64,
}

impl LoginSupervisor {
    pub fn new(
        settings: Arc<SettingsStore>,
        tracker: ValidityTracker,
        broadcaster: Arc<StateBroadcaster>,
    ) -> Self {
        Self {
            settings,
            tracker,
            broadcaster,
            in_progress: AtomicBool::new(false),
            current: Mutex::new(None),
            next_attempt: AtomicU64::new(1),
        }
    }

    pub fn tracker(&self) -> &ValidityTracker {
        &self.tracker
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Pid of the running login process, if one has been spawned.
    pub fn current_pid(&self) -> Option<u32> {
        self.current.lock().as_ref().and_then(|a| a.pid)
    }

    /// Make sure a valid token exists, running `vault login` if needed.
    pub async fn ensure_token(&self) -> Result<LoginOutcome, LoginError> {
        self.ensure_token_with(&CancellationToken::new()).await
    }

    /// [`ensure_token`](Self::ensure_token), abandoning the wait with
    /// [`LoginError::InterruptedWait`] if `interrupt` fires.
    pub async fn ensure_token_with(
        &self,
        interrupt: &CancellationToken,
    ) -> Result<LoginOutcome, LoginError> {
        if self.in_progress.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err()
        {
            debug!("login requested while another attempt is running");
            return Err(LoginError::AlreadyInProgress);
        }
        let attempt = AttemptGuard::register(self);
        info!("vault login attempt started");
        self.broadcaster.publish(Event::LoginState { in_progress: true });

        let result = self.run_attempt(&attempt, interrupt).await;
        match &result {
            Ok(outcome) => info!(?outcome, "vault login attempt finished"),
            Err(e) if e.is_canceled() => info!("vault login attempt canceled: {e}"),
            Err(e) => warn!(code = e.as_str(), "vault login attempt failed: {e}"),
        }
        drop(attempt);
        result
    }

    async fn run_attempt(
        &self,
        attempt: &AttemptGuard<'_>,
        interrupt: &CancellationToken,
    ) -> Result<LoginOutcome, LoginError> {
        let settings = self.settings.snapshot();
        settings.token_validity()?;
        let timeout = settings.login_timeout()?;

        if self.tracker.is_valid() {
            debug!("vault token still valid, skipping login");
            return Ok(LoginOutcome::AlreadyValid);
        }

        let exe = settings.vault_executable_path;
        if !executable_exists(&exe) {
            return Err(LoginError::ExecutableNotFound { path: exe });
        }

        debug!(vault_addr = %settings.vault_address, executable = %exe, "executing vault login");
        let mut command = Command::new(&exe);
        command
            .args(LOGIN_ARGS)
            .env(VAULT_ADDR_ENV, &settings.vault_address)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        // Terminal Ctrl-C must reach us, not the child: cancellation goes
        // through `cancel()` so the result is classified consistently.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(LoginError::ProcessLaunch)?;
        attempt.set_pid(child.id());

        let started = Instant::now();
        let waited = tokio::select! {
            status = child.wait() => WaitResult::Exited(status),
            _ = tokio::time::sleep(timeout) => WaitResult::Stopped(StopReason::TimedOut),
            _ = attempt.cancel.cancelled() => WaitResult::Stopped(StopReason::Canceled),
            _ = interrupt.cancelled() => WaitResult::Stopped(StopReason::Interrupted),
        };

        let (reason, status) = match waited {
            WaitResult::Exited(status) => {
                return exited(status.map_err(LoginError::ProcessWait)?, started);
            }
            WaitResult::Stopped(reason) => match terminate(&mut child).await? {
                Teardown::Exited(status) => {
                    debug!(?reason, "vault exited before it could be stopped");
                    return exited(status, started);
                }
                Teardown::Killed(status) => (reason, status),
            },
        };

        match reason {
            StopReason::TimedOut => Err(LoginError::LoginTimedOut { timeout }),
            StopReason::Canceled => Err(LoginError::LoginFailed { code: exit_code(status) }),
            StopReason::Interrupted => Err(LoginError::InterruptedWait),
        }
    }

    /// Force-terminate the running attempt, if any.
    ///
    /// Returns once the attempt has released its process and cleared the
    /// in-progress flag. Returns `false` without doing anything when idle.
    pub async fn cancel(&self) -> bool {
        let Some(attempt) = self.current.lock().take() else {
            return false;
        };
        attempt.cancel.cancel();
        attempt.done.cancelled().await;
        info!("vault login process was manually canceled");
        true
    }

    fn finish(&self, id: u64) {
        {
            let mut slot = self.current.lock();
            if slot.as_ref().is_some_and(|a| a.id == id) {
                *slot = None;
            }
        }
        if self.in_progress.swap(false, Ordering::SeqCst) {
            self.broadcaster.publish(Event::LoginState { in_progress: false });
        }
    }
}

/// Owns one attempt's registration. Dropping it tears the attempt down
/// exactly once, whichever way `ensure_token` exits.
struct AttemptGuard<'a> {
    supervisor: &'a LoginSupervisor,
    id: u64,
    cancel: CancellationToken,
    done: CancellationToken,
}

impl<'a> AttemptGuard<'a> {
    fn register(supervisor: &'a LoginSupervisor) -> Self {
        let id = supervisor.next_attempt.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let done = CancellationToken::new();
        *supervisor.current.lock() = Some(ActiveAttempt {
            id,
            pid: None,
            cancel: cancel.clone(),
            done: done.clone(),
        });
        Self { supervisor, id, cancel, done }
    }

    fn set_pid(&self, pid: Option<u32>) {
        if let Some(attempt) = self.supervisor.current.lock().as_mut() {
            if attempt.id == self.id {
                attempt.pid = pid;
            }
        }
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        self.supervisor.finish(self.id);
        self.done.cancel();
    }
}

fn exited(status: ExitStatus, started: Instant) -> Result<LoginOutcome, LoginError> {
    let code = exit_code(status);
    debug!(code, elapsed_ms = started.elapsed().as_millis() as u64, "vault exited");
    if code == 0 {
        Ok(LoginOutcome::LoggedIn)
    } else {
        Err(LoginError::LoginFailed { code })
    }
}

/// SIGKILL the child and reap it, unless it has already exited.
async fn terminate(child: &mut Child) -> Result<Teardown, LoginError> {
    if let Some(status) = child.try_wait().map_err(LoginError::ProcessWait)? {
        return Ok(Teardown::Exited(status));
    }
    if let Err(e) = child.start_kill() {
        debug!("kill failed: {e}");
    }
    let status = child.wait().await.map_err(LoginError::ProcessWait)?;
    if killed_by_signal(status) {
        Ok(Teardown::Killed(status))
    } else {
        Ok(Teardown::Exited(status))
    }
}

/// A child that beat the kill reports its own exit code, not a signal.
#[cfg(unix)]
fn killed_by_signal(status: ExitStatus) -> bool {
    status.code().is_none()
}

#[cfg(not(unix))]
fn killed_by_signal(_status: ExitStatus) -> bool {
    true
}

/// Exit code, with death-by-signal N reported as `128 + N` like a shell does.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[cfg(test)]
#[path = "login_tests.rs"]
mod tests;
