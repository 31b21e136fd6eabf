//! # Domain Layer
//!
//! Pure allocation rules. No store access happens here.
//!
//! ## Modules
//!
//! - `config` - Global range geometry and its text record
//! - `entities` - Resolved ranges and pool kinds
//! - `errors` - Allocator and store error types
//! - `keys` - Record keys, counters and domain key validation
//! - `sid` - Structural SID parsing

pub mod config;
pub mod entities;
pub mod errors;
pub mod keys;
pub mod sid;

pub use config::{GlobalConfig, MIN_RANGE_SIZE};
pub use entities::{Pool, RangeRecord};
pub use errors::{AutoridError, ConflictReason, StoreError};
pub use keys::{Counter, DomainKey};
pub use sid::DomainSid;
