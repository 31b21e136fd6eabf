//! Database settings resolved from flags and the environment.
//!
//! Precedence: command-line flag, then environment variable, then default.

use anyhow::{Context, Result};
use idmap_autorid::{FileStoreConfig, TxnConfig};
use std::path::PathBuf;

/// Database path variable.
pub const ENV_DB: &str = "AUTORID_DB";

/// Transaction retry budget variable.
pub const ENV_MAX_ATTEMPTS: &str = "AUTORID_MAX_ATTEMPTS";

pub const DEFAULT_DB: &str = "autorid.tdb";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub db_path: PathBuf,
    pub max_attempts: Option<u32>,
    pub sync_writes: bool,
}

impl Settings {
    /// Resolve against the process environment.
    pub fn from_env(
        db_flag: Option<PathBuf>,
        attempts_flag: Option<u32>,
        no_sync: bool,
    ) -> Result<Self> {
        Self::resolve(db_flag, attempts_flag, no_sync, |name| std::env::var(name).ok())
    }

    /// Resolve with an explicit variable lookup.
    pub fn resolve(
        db_flag: Option<PathBuf>,
        attempts_flag: Option<u32>,
        no_sync: bool,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let db_path = db_flag
            .or_else(|| env(ENV_DB).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB));

        let max_attempts = match attempts_flag {
            Some(attempts) => Some(attempts),
            None => env(ENV_MAX_ATTEMPTS)
                .map(|raw| {
                    raw.trim().parse::<u32>().with_context(|| {
                        format!("{} must be a number, got '{}'", ENV_MAX_ATTEMPTS, raw)
                    })
                })
                .transpose()?,
        };

        Ok(Self {
            db_path,
            max_attempts,
            sync_writes: !no_sync,
        })
    }

    pub fn store_config(&self) -> FileStoreConfig {
        let config = FileStoreConfig::new(&self.db_path).with_sync_writes(self.sync_writes);
        match self.max_attempts {
            Some(attempts) => {
                let txn = config.txn.clone().with_max_attempts(attempts);
                config.with_txn(txn)
            }
            None => config,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB),
            max_attempts: None,
            sync_writes: true,
        }
    }
}

/// Retry budget actually applied, for display.
pub fn effective_txn(settings: &Settings) -> TxnConfig {
    settings.store_config().txn
}
