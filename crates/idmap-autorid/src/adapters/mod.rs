//! # Adapters Module
//!
//! Implementations of the outbound store port.
//!
//! ## Modules
//!
//! - `file`: Durable single-file store shared between processes
//! - `memory`: Optimistic in-memory store for tests and embedding
//! - `lock`: Exclusive transaction lock (fs2)
//! - `retry`: Bounded retry and backoff policy

pub mod file;
pub mod lock;
pub mod memory;
pub mod retry;

pub use file::{FileStore, FileStoreConfig};
pub use lock::{LockError, TransactionLock};
pub use memory::{InMemoryStore, TxnStats};
pub use retry::TxnConfig;
