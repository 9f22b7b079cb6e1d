// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token freshness derived from the token file's modification time.
//!
//! The token file is only ever stat'ed: its content is opaque and the file
//! is never created or removed here.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::warn;

use crate::error::LoginError;
use crate::settings::SettingsStore;

const TOKEN_FILE: &str = ".vault-token";

/// Why remaining validity could not be computed.
#[derive(Debug, thiserror::Error)]
pub enum ValidityError {
    #[error(transparent)]
    InvalidWindow(#[from] LoginError),

    #[error("failed to stat token file {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// `~/.vault-token`, where `vault login` writes its token.
pub fn default_token_path() -> anyhow::Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("could not find home directory"))?;
    Ok(home.join(TOKEN_FILE))
}

/// Computes remaining validity of the token file against the configured
/// validity window.
#[derive(Clone)]
pub struct ValidityTracker {
    token_path: PathBuf,
    settings: Arc<SettingsStore>,
}

impl ValidityTracker {
    pub fn new(token_path: PathBuf, settings: Arc<SettingsStore>) -> Self {
        Self { token_path, settings }
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Modification time of the token file, or `None` if it does not exist.
    pub fn last_refreshed(&self) -> Result<Option<DateTime<Utc>>, ValidityError> {
        match std::fs::metadata(&self.token_path).and_then(|m| m.modified()) {
            Ok(modified) => Ok(Some(DateTime::<Utc>::from(modified))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ValidityError::Stat { path: self.token_path.clone(), source }),
        }
    }

    /// `window - age`. Zero when the file is missing; negative once expired.
    pub fn try_remaining_validity(&self) -> Result<TimeDelta, ValidityError> {
        self.remaining_at(Utc::now())
    }

    fn remaining_at(&self, now: DateTime<Utc>) -> Result<TimeDelta, ValidityError> {
        let window = self.settings.snapshot().token_validity()?;
        let Some(modified) = self.last_refreshed()? else {
            return Ok(TimeDelta::zero());
        };
        Ok(remaining(window, modified, now))
    }

    /// Like [`try_remaining_validity`](Self::try_remaining_validity), but
    /// never fails: errors are logged and reported as zero.
    pub fn remaining_validity(&self) -> TimeDelta {
        match self.try_remaining_validity() {
            Ok(remaining) => remaining,
            Err(e) => {
                warn!("treating vault token as invalid: {e}");
                TimeDelta::zero()
            }
        }
    }

    /// True iff remaining validity is strictly positive.
    pub fn is_valid(&self) -> bool {
        self.remaining_validity() > TimeDelta::zero()
    }
}

/// Remaining validity of a token written at `modified`. A timestamp in the
/// future counts as age zero.
pub fn remaining(window: TimeDelta, modified: DateTime<Utc>, now: DateTime<Utc>) -> TimeDelta {
    let age = (now - modified).max(TimeDelta::zero());
    window.checked_sub(&age).unwrap_or(TimeDelta::MIN)
}

#[cfg(test)]
#[path = "validity_tests.rs"]
mod tests;
