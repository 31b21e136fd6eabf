//! # Outbound Ports (Driven Ports)
//!
//! The transactional key-value store the allocator runs on.
//!
//! Production: `FileStore` (adapters/file.rs), shared between processes
//! Testing: `InMemoryStore` (adapters/memory.rs)

use crate::domain::errors::StoreError;
use std::sync::Arc;

/// Write mode for `StoreTxn::store`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Fail with `StoreError::AlreadyExists` if the key is present.
    Insert,
    /// Create or overwrite.
    Replace,
}

/// Reads and writes available to a transaction body.
///
/// Writes are buffered and become visible to other parties only when the
/// enclosing transaction commits. Reads see the transaction's own writes.
pub trait StoreTxn {
    /// Fetch a record.
    fn fetch(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store a record.
    fn store(&mut self, key: &[u8], value: &[u8], mode: StoreMode) -> Result<(), StoreError>;

    /// Fetch a record holding a little-endian u32.
    fn fetch_u32(&mut self, key: &str) -> Result<Option<u32>, StoreError> {
        self.fetch(key.as_bytes())?
            .map(|raw| decode_u32(key.as_bytes(), &raw))
            .transpose()
    }

    /// Replace a u32 record.
    fn store_u32(&mut self, key: &str, value: u32) -> Result<(), StoreError> {
        self.store(key.as_bytes(), &value.to_le_bytes(), StoreMode::Replace)
    }

    /// Add `delta` to a u32 counter and return the previous value.
    ///
    /// An absent counter starts at 0.
    fn change_u32_atomic(&mut self, key: &str, delta: u32) -> Result<u32, StoreError> {
        let previous = self.fetch_u32(key)?.unwrap_or(0);
        let next = previous
            .checked_add(delta)
            .ok_or_else(|| StoreError::corruption(key.as_bytes(), "counter overflow"))?;
        self.store_u32(key, next)?;
        Ok(previous)
    }
}

/// Durable key-value store with serializable transactions.
///
/// ## Contract
///
/// - `transaction` commits all of the body's writes or none of them
/// - Concurrent transactions touching the same keys serialize; the runner may
///   call the body again after a conflict, so the body must not keep state
///   from an earlier attempt
/// - A conflict that outlasts the retry budget surfaces as
///   `StoreError::RetriesExhausted`
/// - `fetch` outside a transaction only ever observes committed data
pub trait TransactionalStore: Send + Sync {
    /// Non-transactional read of committed data.
    fn fetch(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Run `body` atomically.
    ///
    /// If the body returns `Err`, nothing it wrote is applied.
    fn transaction<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnMut(&mut dyn StoreTxn) -> Result<T, E>,
        E: From<StoreError>;

    /// Non-transactional read of a u32 record.
    fn fetch_u32(&self, key: &str) -> Result<Option<u32>, StoreError> {
        self.fetch(key.as_bytes())?
            .map(|raw| decode_u32(key.as_bytes(), &raw))
            .transpose()
    }

    /// Store a single record in its own transaction.
    fn trans_store(&self, key: &[u8], value: &[u8], mode: StoreMode) -> Result<(), StoreError> {
        self.transaction(|txn| txn.store(key, value, mode))
    }
}

impl<S: TransactionalStore> TransactionalStore for Arc<S> {
    fn fetch(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).fetch(key)
    }

    fn transaction<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnMut(&mut dyn StoreTxn) -> Result<T, E>,
        E: From<StoreError>,
    {
        (**self).transaction(body)
    }
}

/// Decode a stored u32 counter.
pub fn decode_u32(key: &[u8], raw: &[u8]) -> Result<u32, StoreError> {
    let bytes: [u8; 4] = raw.try_into().map_err(|_| {
        StoreError::corruption(key, format!("expected 4 bytes, found {}", raw.len()))
    })?;
    Ok(u32::from_le_bytes(bytes))
}
