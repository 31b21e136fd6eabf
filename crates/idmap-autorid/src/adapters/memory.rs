//! # In-Memory Transactional Store
//!
//! Optimistic concurrency control over a versioned `HashMap`:
//!
//! 1. The body runs without holding any lock; every read records the version
//!    it observed (0 for an absent key) and writes are buffered.
//! 2. Under the write lock the read set is validated. If every observed
//!    version is still current the buffered writes are applied, else the body
//!    is run again after a backoff.
//!
//! A body that fails after reading stale data is retried as well, so callers
//! never see an error computed from a state that never existed.

use crate::adapters::retry::{Backoff, TxnConfig};
use crate::domain::errors::StoreError;
use crate::ports::outbound::{StoreMode, StoreTxn, TransactionalStore};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

struct Versioned {
    value: Vec<u8>,
    version: u64,
}

#[derive(Default)]
struct MemState {
    records: HashMap<Vec<u8>, Versioned>,
    /// Last commit sequence number; record versions are drawn from it.
    sequence: u64,
}

impl MemState {
    fn version_of(&self, key: &[u8]) -> u64 {
        self.records.get(key).map_or(0, |r| r.version)
    }
}

/// Commit statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxnStats {
    pub commits: u64,
    pub conflicts: u64,
}

/// In-memory store for tests and single-process embedding.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemState>,
    config: TxnConfig,
    commits: AtomicU64,
    conflicts: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TxnConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn stats(&self) -> TxnStats {
        TxnStats {
            commits: self.commits.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct MemTxn<'a> {
    state: &'a RwLock<MemState>,
    reads: HashMap<Vec<u8>, u64>,
    writes: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl<'a> MemTxn<'a> {
    fn new(state: &'a RwLock<MemState>) -> Self {
        Self {
            state,
            reads: HashMap::new(),
            writes: BTreeMap::new(),
        }
    }

    /// First key whose committed version moved since it was read.
    fn stale_read(&self, state: &MemState) -> Option<&[u8]> {
        self.reads
            .iter()
            .find(|(key, seen)| state.version_of(key) != **seen)
            .map(|(key, _)| key.as_slice())
    }
}

impl StoreTxn for MemTxn<'_> {
    fn fetch(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(value) = self.writes.get(key) {
            return Ok(Some(value.clone()));
        }

        let state = self.state.read();
        let (value, version) = match state.records.get(key) {
            Some(record) => (Some(record.value.clone()), record.version),
            None => (None, 0),
        };
        self.reads.entry(key.to_vec()).or_insert(version);
        Ok(value)
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

impl TransactionalStore for InMemoryStore {
    fn fetch(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.state.read().records.get(key).map(|r| r.value.clone()))
    }

    fn transaction<T, E, F>(&self, mut body: F) -> Result<T, E>
    where
        F: FnMut(&mut dyn StoreTxn) -> Result<T, E>,
        E: From<StoreError>,
    {
        let attempts = self.config.attempts();
        let mut backoff = Backoff::new(&self.config);

        for attempt in 1..=attempts {
            let mut txn = MemTxn::new(&self.state);
            let outcome = body(&mut txn);

            let mut state = self.state.write();
            if let Some(key) = txn.stale_read(&state) {
                debug!(
                    "[autorid] Transaction conflict on '{}' (attempt {}/{})",
                    String::from_utf8_lossy(key),
                    attempt,
                    attempts
                );
                drop(state);
                self.conflicts.fetch_add(1, Ordering::Relaxed);
                if attempt < attempts {
                    backoff.wait();
                }
                continue;
            }

            let value = outcome?;
            if !txn.writes.is_empty() {
                state.sequence += 1;
                let version = state.sequence;
                for (key, value) in txn.writes {
                    state.records.insert(key, Versioned { value, version });
                }
            }
            self.commits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        warn!(
            "[autorid] Transaction abandoned after {} conflicting attempts",
            attempts
        );
        Err(StoreError::RetriesExhausted { attempts }.into())
    }
}
