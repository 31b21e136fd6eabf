//! # Transaction Lock
//!
//! Exclusive `flock` on a sidecar file, held for the duration of one
//! `FileStore` transaction. Uses `fs2` (flock on Unix, LockFile on Windows).
//!
//! Every acquisition opens its own file handle, so two threads of the same
//! process contend exactly like two processes do.

use crate::adapters::retry::{Backoff, TxnConfig};
use crate::domain::errors::StoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors from transaction locking.
#[derive(Debug, Error)]
pub enum LockError {
    /// Lock file could not be created or opened.
    #[error("Failed to open lock file {}: {source}", .path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Another holder kept the lock for the whole retry budget.
    #[error("Lock {} still held after {attempts} attempts", .path.display())]
    Contended { path: PathBuf, attempts: u32 },
}

impl From<LockError> for StoreError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Contended { attempts, .. } => StoreError::RetriesExhausted { attempts },
            LockError::OpenFailed { .. } => StoreError::Io(err.to_string()),
        }
    }
}

/// Held exclusive lock. Released on drop (RAII).
///
/// The lock file itself is left in place; removing it would race with a
/// process that has it open but not yet locked.
#[derive(Debug)]
pub struct TransactionLock {
    file: File,
    path: PathBuf,
}

impl TransactionLock {
    /// Acquire the lock, retrying with backoff while it is contended.
    ///
    /// # Errors
    ///
    /// `LockError::Contended` once `config.max_attempts` tries have failed.
    pub fn acquire(path: &Path, config: &TxnConfig) -> Result<Self, LockError> {
        let attempts = config.attempts();
        let mut backoff = Backoff::new(config);

        for attempt in 1..=attempts {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(path)
                .map_err(|source| LockError::OpenFailed {
                    path: path.to_path_buf(),
                    source,
                })?;

            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    })
                }
                Err(err) if is_contended(&err) => {
                    debug!(
                        "[autorid] Lock {} busy (attempt {}/{})",
                        path.display(),
                        attempt,
                        attempts
                    );
                    drop(file);
                    if attempt < attempts {
                        backoff.wait();
                    }
                }
                Err(source) => {
                    return Err(LockError::OpenFailed {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }
        }

        Err(LockError::Contended {
            path: path.to_path_buf(),
            attempts,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TransactionLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
