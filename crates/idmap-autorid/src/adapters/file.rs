//! # File-Backed Transactional Store
//!
//! The whole database is one file, shared by every process that opens the
//! same path.
//!
//! ## File Format
//!
//! ```text
//! [magic "ARDB"][crc32 of payload: u32 LE][payload: bincode(BTreeMap<key, value>)]
//! ```
//!
//! ## Transactions
//!
//! 1. Take the exclusive lock on `<path>.lock`
//! 2. Load the current file into a snapshot
//! 3. Run the body once against the snapshot, buffering writes
//! 4. On success write `<path>.tmp` and rename it over `<path>`
//!
//! The rename is atomic, so lock-free readers see either the previous or the
//! new state, never a torn file.

use crate::adapters::lock::TransactionLock;
use crate::adapters::retry::TxnConfig;
use crate::domain::errors::StoreError;
use crate::ports::outbound::{StoreMode, StoreTxn, TransactionalStore};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MAGIC: &[u8; 4] = b"ARDB";
const HEADER_LEN: usize = 8;

type Records = BTreeMap<Vec<u8>, Vec<u8>>;

/// Configuration for `FileStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStoreConfig {
    /// Database file.
    pub path: PathBuf,
    /// `fsync` the new file before it replaces the old one, and the directory
    /// after (default: true).
    pub sync_writes: bool,
    /// Budget for acquiring the transaction lock.
    pub txn: TxnConfig,
}

impl FileStoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sync_writes: true,
            txn: TxnConfig::new().with_max_attempts(500).with_backoff(1, 20),
        }
    }

    /// No fsync, fast lock polling.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sync_writes: false,
            txn: TxnConfig::new().with_max_attempts(5_000).with_backoff(1, 2),
        }
    }

    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    pub fn with_txn(mut self, txn: TxnConfig) -> Self {
        self.txn = txn;
        self
    }
}

/// Durable store shared between processes through file locking.
#[derive(Debug)]
pub struct FileStore {
    config: FileStoreConfig,
    lock_path: PathBuf,
    tmp_path: PathBuf,
}

impl FileStore {
    /// Open (or prepare to create) the database at `config.path`.
    ///
    /// An existing file is read once to make sure it is intact.
    pub fn open(config: FileStoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self {
            lock_path: sibling(&config.path, ".lock"),
            tmp_path: sibling(&config.path, ".tmp"),
            config,
        };

        let records = store.load()?;
        if records.is_empty() {
            info!("[autorid] 📁 New database at {}", store.path().display());
        } else {
            info!(
                "[autorid] 💾 Opened {} ({} records)",
                store.path().display(),
                records.len()
            );
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn config(&self) -> &FileStoreConfig {
        &self.config
    }

    /// All committed records, in key order.
    pub fn records(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        Ok(self.load()?.into_iter().collect())
    }

    fn load(&self) -> Result<Records, StoreError> {
        let bytes = match std::fs::read(&self.config.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Records::new()),
            Err(err) => return Err(err.into()),
        };
        if bytes.is_empty() {
            return Ok(Records::new());
        }
        decode(&bytes).map_err(|reason| self.corruption(reason))
    }

    fn persist(&self, records: &Records) -> Result<(), StoreError> {
        let payload = bincode::serialize(records)
            .map_err(|e| self.corruption(format!("encode failed: {}", e)))?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        bytes.extend_from_slice(&payload);

        let mut file = std::fs::File::create(&self.tmp_path)?;
        file.write_all(&bytes)?;
        if self.config.sync_writes {
            file.sync_all()?;
        }
        drop(file);

        std::fs::rename(&self.tmp_path, &self.config.path)?;
        if self.config.sync_writes {
            sync_parent(&self.config.path)?;
        }
        Ok(())
    }

    fn corruption(&self, reason: impl Into<String>) -> StoreError {
        StoreError::corruption(self.config.path.to_string_lossy().as_bytes(), reason)
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Flush the directory entry written by the rename.
fn sync_parent(path: &Path) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::File::open(parent)?.sync_all()
}

fn decode(bytes: &[u8]) -> Result<Records, String> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
        return Err("not an autorid database".to_string());
    }
    let (header, payload) = bytes.split_at(HEADER_LEN);
    let mut crc = [0u8; 4];
    crc.copy_from_slice(&header[4..]);
    if crc32fast::hash(payload) != u32::from_le_bytes(crc) {
        return Err("checksum mismatch".to_string());
    }
    bincode::deserialize(payload).map_err(|e| format!("decode failed: {}", e))
}

struct FileTxn {
    snapshot: Records,
    writes: Records,
}

impl StoreTxn for FileTxn {
    fn fetch(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .writes
            .get(key)
            .or_else(|| self.snapshot.get(key))
            .cloned())
    }

    fn store(&mut self, key: &[u8], value: &[u8], mode: StoreMode) -> Result<(), StoreError> {
        if mode == StoreMode::Insert && self.fetch(key)?.is_some() {
            return Err(StoreError::AlreadyExists {
                key: String::from_utf8_lossy(key).into_owned(),
            });
        }
        self.writes.insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}

impl TransactionalStore for FileStore {
    fn fetch(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.load()?.remove(key))
    }

    fn transaction<T, E, F>(&self, mut body: F) -> Result<T, E>
    where
        F: FnMut(&mut dyn StoreTxn) -> Result<T, E>,
        E: From<StoreError>,
    {
        let _lock = TransactionLock::acquire(&self.lock_path, &self.config.txn)
            .map_err(StoreError::from)?;

        let mut txn = FileTxn {
            snapshot: self.load()?,
            writes: Records::new(),
        };
        let value = body(&mut txn)?;

        if !txn.writes.is_empty() {
            let written = txn.writes.len();
            let mut records = txn.snapshot;
            records.append(&mut txn.writes);
            self.persist(&records)?;
            debug!(
                "[autorid] Committed {} records to {}",
                written,
                self.path().display()
            );
        }
        Ok(value)
    }
}
