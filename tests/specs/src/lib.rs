// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Runs the real `vtm` binary against an isolated settings file, token path,
//! and a fake `vault` script.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

pub use vtm::test_support::TEST_VAULT_ADDR;

/// Resolve the path to the compiled `vtm` binary.
pub fn vtm_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("vtm")
}

/// An isolated environment: temp dir, settings file, token path, fake vault.
pub struct VtmEnv {
    dir: tempfile::TempDir,
    settings: PathBuf,
    token: PathBuf,
    invocations: PathBuf,
    vault: PathBuf,
}

impl VtmEnv {
    /// Settings pointing at a fake vault that records its invocation, then
    /// runs `body`.
    pub fn new(body: &str) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let settings = dir.path().join("config").join("settings.json");
        let token = dir.path().join(".vault-token");
        let invocations = dir.path().join("invocations.log");
        let script = format!(
            "echo \"$VAULT_ADDR $*\" >> '{}'\n{body}",
            invocations.display()
        );
        let vault = vtm::test_support::write_script(dir.path(), "vault", &script)?;

        let env = Self { dir, settings, token, invocations, vault };
        env.write_settings(serde_json::json!({
            "vault_address": TEST_VAULT_ADDR,
            "token_validity_hours": 12,
            "login_timeout_seconds": 30,
            "vault_executable_path": env.vault.display().to_string(),
        }))?;
        Ok(env)
    }

    /// A fake vault that writes the token, like a successful browser login.
    pub fn succeeding() -> anyhow::Result<Self> {
        Self::new("touch \"$VTM_SPEC_TOKEN\"")
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn token_path(&self) -> &Path {
        &self.token
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings
    }

    pub fn vault_path(&self) -> &Path {
        &self.vault
    }

    pub fn write_settings(&self, value: serde_json::Value) -> anyhow::Result<()> {
        if let Some(parent) = self.settings.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.settings, serde_json::to_string_pretty(&value)?)?;
        Ok(())
    }

    pub fn read_settings(&self) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::from_str(&std::fs::read_to_string(&self.settings)?)?)
    }

    /// Lines the fake vault has recorded, one per spawn.
    pub fn invocations(&self) -> Vec<String> {
        std::fs::read_to_string(&self.invocations)
            .map(|s| s.lines().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    fn command(&self, args: &[&str]) -> anyhow::Result<Command> {
        let binary = vtm_binary();
        anyhow::ensure!(binary.exists(), "vtm binary not found at {}", binary.display());
        let mut cmd = Command::new(binary);
        cmd.args(args)
            .env("VTM_SETTINGS", &self.settings)
            .env("VTM_TOKEN_PATH", &self.token)
            .env("VTM_SPEC_TOKEN", &self.token)
            .env("VTM_LOG_FORMAT", "text")
            .env("VTM_LOG_LEVEL", "warn")
            .env_remove("VTM_STATUS_POLL_MS")
            .stdin(Stdio::null());
        Ok(cmd)
    }

    /// Run `vtm <args>` to completion.
    pub fn run(&self, args: &[&str]) -> anyhow::Result<VtmOutput> {
        let output = self.command(args)?.output()?;
        Ok(VtmOutput(output))
    }

    /// Start `vtm <args>` in the background.
    pub fn spawn(&self, args: &[&str]) -> anyhow::Result<VtmProcess> {
        let child = self.command(args)?.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn()?;
        Ok(VtmProcess { child: Some(child) })
    }
}

/// Captured result of a finished `vtm` run.
pub struct VtmOutput(pub Output);

impl VtmOutput {
    pub fn code(&self) -> Option<i32> {
        self.0.status.code()
    }

    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.0.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.0.stderr).into_owned()
    }
}

/// A running `vtm` process that is killed on drop.
pub struct VtmProcess {
    child: Option<Child>,
}

impl VtmProcess {
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Send SIGINT, as Ctrl-C in a terminal would.
    pub fn interrupt(&self) -> anyhow::Result<()> {
        let pid = self.pid().ok_or_else(|| anyhow::anyhow!("process already collected"))?;
        signal::kill(Pid::from_raw(i32::try_from(pid)?), Signal::SIGINT)?;
        Ok(())
    }

    /// Wait for the process to exit within `timeout` and collect its output.
    pub async fn wait_exit(&mut self, timeout: Duration) -> anyhow::Result<VtmOutput> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("vtm did not exit within {timeout:?}");
            }
            let child = self.child.as_mut().ok_or_else(|| anyhow::anyhow!("process already collected"))?;
            if child.try_wait()?.is_some() {
                let child = self.child.take().ok_or_else(|| anyhow::anyhow!("process already collected"))?;
                return Ok(VtmOutput(child.wait_with_output()?));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for VtmProcess {
    fn drop(&mut self) {
        if let Some(ref mut child) = self.child {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
