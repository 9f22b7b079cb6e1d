// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: builders, fake `vault` scripts, and assertion helpers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use nix::sys::signal;
use nix::unistd::Pid;
use parking_lot::Mutex;

use crate::broadcast::{Event, Observer, StateBroadcaster, Topic};
use crate::login::LoginSupervisor;
use crate::settings::{Settings, SettingsStore};
use crate::validity::ValidityTracker;

/// Address handed to fake vault scripts as `VAULT_ADDR`.
pub const TEST_VAULT_ADDR: &str = "https://vault.test:8200";

/// Checks whether a process with the given PID is alive.
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(pid_i32) = i32::try_from(pid) else {
        return false;
    };
    signal::kill(Pid::from_raw(pid_i32), None).is_ok()
}

/// Write an executable `/bin/sh` script named `name` running `body`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
    set_mode(&path, 0o755)?;
    Ok(path)
}

/// Write a non-executable file named `name`.
pub fn write_plain_file(dir: &Path, name: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, "#!/bin/sh\n")?;
    set_mode(&path, 0o644)?;
    Ok(path)
}

fn set_mode(path: &Path, mode: u32) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}

/// Create (or touch) a token file whose modification time is `age` ago.
pub fn write_token(path: &Path, age: Duration) -> anyhow::Result<()> {
    let file = std::fs::OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
    let modified = SystemTime::now()
        .checked_sub(age)
        .ok_or_else(|| anyhow::anyhow!("token age {age:?} predates the epoch"))?;
    file.set_modified(modified)?;
    Ok(())
}

/// Observer that records every event it receives.
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observer(&self) -> Arc<dyn Observer> {
        let events = Arc::clone(&self.events);
        Arc::new(move |event: &Event| -> anyhow::Result<()> {
            events.lock().push(*event);
            Ok(())
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// The `in_progress` payloads of recorded login-state events, in order.
    pub fn login_states(&self) -> Vec<bool> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::LoginState { in_progress } => Some(*in_progress),
                Event::SettingsChanged => None,
            })
            .collect()
    }
}

/// In-memory writer that can be cloned into a view and read back.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl std::io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Builder for a supervisor wired to a temp dir, a fake vault script, and an
/// event recorder.
pub struct HarnessBuilder {
    validity_hours: i64,
    timeout_secs: i64,
    script: Option<String>,
    token_age: Option<Duration>,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self { validity_hours: 12, timeout_secs: 30, script: Some("exit 0".into()), token_age: None }
    }

    pub fn validity_hours(mut self, hours: i64) -> Self {
        self.validity_hours = hours;
        self
    }

    pub fn timeout_secs(mut self, secs: i64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Shell body the fake vault runs after recording its invocation.
    pub fn script(mut self, body: impl Into<String>) -> Self {
        self.script = Some(body.into());
        self
    }

    /// Point the settings at an executable that does not exist.
    pub fn no_executable(mut self) -> Self {
        self.script = None;
        self
    }

    /// Pre-create the token file, `age` old.
    pub fn token_age(mut self, age: Duration) -> Self {
        self.token_age = Some(age);
        self
    }

    pub fn build(self) -> anyhow::Result<Harness> {
        let dir = tempfile::tempdir()?;
        let invocations = dir.path().join("invocations.log");
        let token_path = dir.path().join(".vault-token");

        let exe = match self.script {
            Some(body) => {
                // Every invocation appends "<VAULT_ADDR> <args>" so tests can
                // count spawns and check the command line.
                let record = format!(
                    "echo \"$VAULT_ADDR $*\" >> '{}'\n{body}",
                    invocations.display()
                );
                write_script(dir.path(), "vault", &record)?
            }
            None => dir.path().join("missing-vault"),
        };

        if let Some(age) = self.token_age {
            write_token(&token_path, age)?;
        }

        let broadcaster = Arc::new(StateBroadcaster::new());
        let recorder = EventRecorder::new();
        broadcaster.subscribe(Topic::LoginState, recorder.observer());
        broadcaster.subscribe(Topic::SettingsChanged, recorder.observer());

        let settings = Arc::new(SettingsStore::in_memory(
            Settings {
                vault_address: TEST_VAULT_ADDR.to_owned(),
                token_validity_hours: self.validity_hours,
                login_timeout_seconds: self.timeout_secs,
                vault_executable_path: exe.display().to_string(),
            },
            Arc::clone(&broadcaster),
        ));
        let tracker = ValidityTracker::new(token_path.clone(), Arc::clone(&settings));
        let supervisor =
            Arc::new(LoginSupervisor::new(Arc::clone(&settings), tracker, Arc::clone(&broadcaster)));

        Ok(Harness {
            dir,
            exe,
            token_path,
            invocations,
            broadcaster,
            settings,
            supervisor,
            recorder,
        })
    }
}

/// A wired-up supervisor plus the paths and recorder around it.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub exe: PathBuf,
    pub token_path: PathBuf,
    pub invocations: PathBuf,
    pub broadcaster: Arc<StateBroadcaster>,
    pub settings: Arc<SettingsStore>,
    pub supervisor: Arc<LoginSupervisor>,
    pub recorder: EventRecorder,
}

impl Harness {
    /// The harness components as a CLI [`App`](crate::command::App).
    pub fn app(&self) -> crate::command::App {
        crate::command::App {
            broadcaster: Arc::clone(&self.broadcaster),
            settings: Arc::clone(&self.settings),
            supervisor: Arc::clone(&self.supervisor),
        }
    }

    /// Lines the fake vault has recorded, one per spawn.
    pub fn invocations(&self) -> Vec<String> {
        std::fs::read_to_string(&self.invocations)
            .map(|s| s.lines().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    /// Wait until the supervisor has a spawned child and return its pid.
    pub async fn wait_for_pid(&self, within: Duration) -> anyhow::Result<u32> {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            if let Some(pid) = self.supervisor.current_pid() {
                return Ok(pid);
            }
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("login process never started");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
