// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that run the real `vtm` binary against a fake
//! `vault` executable.

use std::time::Duration;

use vtm_specs::{VtmEnv, TEST_VAULT_ADDR};

const TIMEOUT: Duration = Duration::from_secs(10);

async fn wait_for_invocation(env: &VtmEnv) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while env.invocations().is_empty() {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("vault was never invoked");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    Ok(())
}

// -- status -------------------------------------------------------------------

#[test]
fn status_without_token_is_invalid() -> anyhow::Result<()> {
    let env = VtmEnv::succeeding()?;

    let out = env.run(&["status"])?;

    assert_eq!(out.code(), Some(1));
    assert_eq!(out.stdout().trim(), "Token is invalid or not found");
    assert!(env.invocations().is_empty());
    Ok(())
}

#[test]
fn status_reports_missing_executable() -> anyhow::Result<()> {
    let env = VtmEnv::succeeding()?;
    env.write_settings(serde_json::json!({
        "vault_executable_path": env.dir().join("nope").display().to_string(),
    }))?;

    let out = env.run(&["status"])?;

    assert_eq!(out.code(), Some(1));
    assert!(out.stdout().contains("Vault executable not found"), "{}", out.stdout());
    Ok(())
}

// -- login --------------------------------------------------------------------

#[test]
fn login_then_status_is_valid() -> anyhow::Result<()> {
    let env = VtmEnv::succeeding()?;

    let login = env.run(&["login"])?;
    assert_eq!(login.code(), Some(0), "stderr: {}", login.stderr());
    assert!(login.stderr().contains("Vault token generated successfully"));
    assert_eq!(env.invocations(), vec![format!("{TEST_VAULT_ADDR} login -method oidc")]);
    assert!(env.token_path().exists());

    let status = env.run(&["status"])?;
    assert_eq!(status.code(), Some(0));
    assert!(status.stdout().contains("Token is valid"));
    assert!(status.stdout().contains("Valid for: 11h 59m"), "{}", status.stdout());
    Ok(())
}

#[test]
fn second_login_skips_vault() -> anyhow::Result<()> {
    let env = VtmEnv::succeeding()?;
    env.run(&["login"])?;

    let again = env.run(&["login"])?;

    assert_eq!(again.code(), Some(0));
    assert!(again.stderr().contains("Vault token is still valid"));
    assert_eq!(env.invocations().len(), 1);
    Ok(())
}

#[test]
fn failing_vault_reports_exit_code() -> anyhow::Result<()> {
    let env = VtmEnv::new("exit 3")?;

    let out = env.run(&["login"])?;

    assert_eq!(out.code(), Some(1));
    assert!(out.stderr().contains("vault login failed with exit code: 3"), "{}", out.stderr());
    Ok(())
}

#[tokio::test]
async fn ctrl_c_cancels_login() -> anyhow::Result<()> {
    let env = VtmEnv::new("exec sleep 30")?;
    let mut vtm = env.spawn(&["login"])?;
    wait_for_invocation(&env).await?;

    vtm.interrupt()?;
    let out = vtm.wait_exit(TIMEOUT).await?;

    assert_eq!(out.code(), Some(130));
    assert!(out.stderr().contains("Vault login process was canceled"), "{}", out.stderr());
    Ok(())
}

#[test]
fn login_times_out() -> anyhow::Result<()> {
    let env = VtmEnv::new("exec sleep 30")?;
    env.write_settings(serde_json::json!({
        "vault_address": TEST_VAULT_ADDR,
        "login_timeout_seconds": 1,
        "vault_executable_path": env.vault_path().display().to_string(),
    }))?;

    let started = std::time::Instant::now();
    let out = env.run(&["login"])?;

    assert_eq!(out.code(), Some(1));
    assert!(out.stderr().contains("timed out after 1 seconds"), "{}", out.stderr());
    assert!(started.elapsed() < Duration::from_secs(5));
    Ok(())
}

// -- settings -----------------------------------------------------------------

#[test]
fn settings_set_persists_and_show_reads_back() -> anyhow::Result<()> {
    let env = VtmEnv::succeeding()?;

    let set = env.run(&["settings", "set", "--validity-hours", "4", "--timeout-secs", "90"])?;
    assert_eq!(set.code(), Some(0), "stderr: {}", set.stderr());

    let saved = env.read_settings()?;
    assert_eq!(saved["token_validity_hours"], 4);
    assert_eq!(saved["login_timeout_seconds"], 90);
    assert_eq!(saved["vault_address"], TEST_VAULT_ADDR);

    let show = env.run(&["settings", "show"])?;
    let shown: serde_json::Value = serde_json::from_str(&show.stdout())?;
    assert_eq!(shown, saved);
    Ok(())
}

#[test]
fn settings_set_rejects_invalid_values() -> anyhow::Result<()> {
    let env = VtmEnv::succeeding()?;
    let before = env.read_settings()?;

    let out = env.run(&["settings", "set", "--address", "not a url", "--validity-hours=0"])?;

    assert_eq!(out.code(), Some(1));
    assert!(out.stderr().contains("vault_address"), "{}", out.stderr());
    assert!(out.stderr().contains("token_validity_hours"), "{}", out.stderr());
    assert_eq!(env.read_settings()?, before);
    Ok(())
}

#[test]
fn invalid_global_option_exits_2() -> anyhow::Result<()> {
    let env = VtmEnv::succeeding()?;
    let out = env.run(&["--log-format", "xml", "status"])?;
    assert_eq!(out.code(), Some(2));
    assert!(out.stderr().contains("invalid log format"));
    Ok(())
}

// -- watch --------------------------------------------------------------------

#[tokio::test]
async fn watch_auto_login_then_ctrl_c() -> anyhow::Result<()> {
    let env = VtmEnv::succeeding()?;
    let mut vtm = env.spawn(&["watch", "--auto-login"])?;

    wait_for_invocation(&env).await?;
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while !env.token_path().exists() {
        anyhow::ensure!(tokio::time::Instant::now() < deadline, "token never written");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    // Give the watcher a tick to observe the fresh token.
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    vtm.interrupt()?;
    let out = vtm.wait_exit(TIMEOUT).await?;

    assert_eq!(out.code(), Some(0));
    assert!(out.stdout().contains("Token is valid"), "{}", out.stdout());
    assert_eq!(env.invocations().len(), 1);
    Ok(())
}
