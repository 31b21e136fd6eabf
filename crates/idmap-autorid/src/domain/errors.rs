//! # Domain Errors
//!
//! Error types for the range allocator.
//!
//! ## Design Principles
//!
//! - `AutoridError` is a closed set: every failure a caller can see maps to
//!   exactly one variant
//! - Store failures are wrapped, never rewritten
//! - Nothing here is fatal; aborting is the caller's decision

use super::config::GlobalConfig;
use std::fmt;
use thiserror::Error;

/// Errors returned by the range allocator and configuration manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AutoridError {
    /// Malformed domain key or unusable range geometry.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A record the read path needs does not exist.
    #[error("Record not found: {key}")]
    NotFound { key: String },

    /// The request contradicts what is already stored.
    #[error("Conflict for '{key}': {reason}")]
    Conflict { key: String, reason: ConflictReason },

    /// The candidate range (or pool id) lies beyond the configured limit.
    #[error("Capacity exceeded: {requested} must be smaller than {limit}")]
    CapacityExceeded { requested: u32, limit: u32 },

    /// Explicit range below the current high-water mark.
    #[error("Range {requested} may not be smaller than the current HWM {hwm}")]
    OutOfOrder { requested: u32, hwm: u32 },

    /// Attempt to change `minvalue` or `rangesize` after first save.
    #[error("Configuration conflict: stored '{stored}', proposed '{proposed}'")]
    ConfigImmutableViolation {
        stored: GlobalConfig,
        proposed: GlobalConfig,
    },

    /// `maxranges` would no longer cover the ranges already handed out.
    #[error("maxranges {max_ranges} is too low to cover existing ranges (HWM {hwm})")]
    ConfigTooSmall { max_ranges: u32, hwm: u32 },

    /// The underlying store could not complete the operation.
    #[error("Store failure: {0}")]
    StoreFailure(#[from] StoreError),
}

impl AutoridError {
    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AutoridError::StoreFailure(StoreError::RetriesExhausted { .. })
        )
    }
}

/// Why a request conflicted with stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// Domain already mapped to a different range.
    RangeMismatch { requested: u32, stored: u32 },
    /// Reverse slot for the range already owned; indicates corruption.
    SlotOccupied { range_number: u32 },
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::RangeMismatch { requested, stored } => write!(
                f,
                "requested range {} differs from stored range {}",
                requested, stored
            ),
            ConflictReason::SlotOccupied { range_number } => {
                write!(f, "range {} is already owned by another domain", range_number)
            }
        }
    }
}

/// Errors raised by a `TransactionalStore` implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// `Insert` found an existing record.
    #[error("Record already exists: {key}")]
    AlreadyExists { key: String },

    /// The runner gave up after repeated commit conflicts or lock contention.
    #[error("Transaction did not commit after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// A stored value does not have the expected shape.
    #[error("Corrupt record {key}: {reason}")]
    Corruption { key: String, reason: String },

    /// I/O error in the backing storage.
    #[error("Store I/O error: {0}")]
    Io(String),
}

impl StoreError {
    pub(crate) fn corruption(key: &[u8], reason: impl Into<String>) -> Self {
        StoreError::Corruption {
            key: String::from_utf8_lossy(key).into_owned(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}
