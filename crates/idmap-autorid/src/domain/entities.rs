//! # Domain Entities

use super::config::GlobalConfig;
use super::errors::AutoridError;
use super::keys::{Counter, DomainKey};
use serde::Serialize;

/// A domain key resolved to its range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeRecord {
    pub domain_key: DomainKey,
    pub range_number: u32,
    /// `min_value + range_number * range_size`; never stored.
    pub low_id: u32,
}

impl RangeRecord {
    /// Combine a stored range number with the geometry.
    pub fn resolve(
        domain_key: DomainKey,
        range_number: u32,
        config: &GlobalConfig,
    ) -> Result<Self, AutoridError> {
        Ok(Self {
            low_id: config.low_id(range_number)?,
            domain_key,
            range_number,
        })
    }

    /// Last id of the range.
    ///
    /// A stored configuration is not re-validated on load, so a zero
    /// `range_size` yields `low_id` instead of wrapping.
    pub fn high_id(&self, config: &GlobalConfig) -> u32 {
        self.low_id.saturating_add(config.range_size.saturating_sub(1))
    }
}

/// Numeric space served by the allocation pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pool {
    Uid,
    Gid,
}

impl Pool {
    pub const fn counter(self) -> Counter {
        match self {
            Pool::Uid => Counter::AllocUid,
            Pool::Gid => Counter::AllocGid,
        }
    }
}
