//! # Record Keys
//!
//! Key layout of the autorid database.
//!
//! | Key | Value |
//! |-----|-------|
//! | `NEXT RANGE` | range HWM (u32) |
//! | `NEXT ALLOC UID` / `NEXT ALLOC GID` | pool HWMs (u32) |
//! | `CONFIG` | `minvalue:<n> rangesize:<n> maxranges:<n>` |
//! | `<sid>` / `<sid>#<index>` | range number (u32) |
//! | `<range number>` | owning `<sid>[#<index>]` |

use super::errors::AutoridError;
use super::sid::DomainSid;
use serde::Serialize;
use std::fmt;

/// Range high-water mark.
pub const HWM: &str = "NEXT RANGE";

/// Next free uid inside the allocation pool range.
pub const ALLOC_HWM_UID: &str = "NEXT ALLOC UID";

/// Next free gid inside the allocation pool range.
pub const ALLOC_HWM_GID: &str = "NEXT ALLOC GID";

/// Global configuration record.
pub const CONFIG_KEY: &str = "CONFIG";

/// Reserved domain id owning the allocation pool range.
pub const ALLOC_RANGE: &str = "ALLOC";

/// Longest composite key accepted.
pub const MAX_KEY_LEN: usize = 255;

/// The monotonic counters kept in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    Range,
    AllocUid,
    AllocGid,
}

impl Counter {
    pub const ALL: [Counter; 3] = [Counter::Range, Counter::AllocUid, Counter::AllocGid];

    pub const fn key(self) -> &'static str {
        match self {
            Counter::Range => HWM,
            Counter::AllocUid => ALLOC_HWM_UID,
            Counter::AllocGid => ALLOC_HWM_GID,
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A validated domain id plus sub-range index.
///
/// Index 0 is the domain's primary range; larger indexes are used once a
/// domain has more RIDs than one range holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DomainKey {
    domain_id: String,
    index: u32,
}

impl DomainKey {
    /// Validate `domain_id` and build the key.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the id is neither a SID nor `ALLOC`, or the
    /// composite key is longer than `MAX_KEY_LEN`.
    pub fn new(domain_id: impl Into<String>, index: u32) -> Result<Self, AutoridError> {
        let domain_id = domain_id.into();
        if !is_valid_domain_id(&domain_id) {
            return Err(AutoridError::InvalidArgument(format!(
                "invalid domain SID: '{}'",
                domain_id
            )));
        }

        let key = Self { domain_id, index };
        let len = key.keystr().len();
        if len > MAX_KEY_LEN {
            return Err(AutoridError::InvalidArgument(format!(
                "domain key is {} bytes, at most {} allowed",
                len, MAX_KEY_LEN
            )));
        }
        Ok(key)
    }

    /// Key of the allocation pool range.
    pub fn alloc_pool() -> Self {
        Self {
            domain_id: ALLOC_RANGE.to_string(),
            index: 0,
        }
    }

    /// Forward-mapping key: `<sid>` for index 0, `<sid>#<index>` otherwise.
    pub fn keystr(&self) -> String {
        if self.index > 0 {
            format!("{}#{}", self.domain_id, self.index)
        } else {
            self.domain_id.clone()
        }
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.keystr())
    }
}

/// A domain id is either a well-formed SID or the pool sentinel.
pub fn is_valid_domain_id(domain_id: &str) -> bool {
    domain_id == ALLOC_RANGE || DomainSid::parse(domain_id).is_some()
}

/// Reverse-mapping key for a range number.
pub fn reverse_key(range_number: u32) -> String {
    range_number.to_string()
}
