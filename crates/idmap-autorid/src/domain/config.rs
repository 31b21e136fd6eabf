//! # Global Range Geometry
//!
//! The `CONFIG` record fixes where ranges start (`minvalue`), how large each one
//! is (`rangesize`) and how many exist (`maxranges`).
//!
//! ## Stored Form
//!
//! ```text
//! minvalue:10000 rangesize:100000 maxranges:42949
//! ```

use super::errors::AutoridError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest accepted range size.
pub const MIN_RANGE_SIZE: u32 = 2000;

/// Range geometry shared by every process using the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// First id of range 0.
    pub min_value: u32,
    /// Number of ids per range.
    pub range_size: u32,
    /// Number of ranges available.
    pub max_ranges: u32,
}

impl GlobalConfig {
    pub fn new(min_value: u32, range_size: u32, max_ranges: u32) -> Self {
        Self {
            min_value,
            range_size,
            max_ranges,
        }
    }

    /// Check the geometry is usable before it is stored.
    ///
    /// The last id of the last range must still fit in 32 bits.
    pub fn validate(&self) -> Result<(), AutoridError> {
        if self.range_size < MIN_RANGE_SIZE {
            return Err(AutoridError::InvalidArgument(format!(
                "rangesize must be at least {}, got {}",
                MIN_RANGE_SIZE, self.range_size
            )));
        }
        if self.max_ranges == 0 {
            return Err(AutoridError::InvalidArgument(
                "maxranges of 0 is invalid, at least one range must be available".to_string(),
            ));
        }

        let span = u64::from(self.max_ranges) * u64::from(self.range_size);
        if u64::from(self.min_value) + span - 1 > u64::from(u32::MAX) {
            return Err(AutoridError::InvalidArgument(format!(
                "{} ranges of {} ids starting at {} exceed the 32-bit id space",
                self.max_ranges, self.range_size, self.min_value
            )));
        }
        Ok(())
    }

    /// First id of `range_number`.
    pub fn low_id(&self, range_number: u32) -> Result<u32, AutoridError> {
        range_number
            .checked_mul(self.range_size)
            .and_then(|offset| offset.checked_add(self.min_value))
            .ok_or_else(|| {
                AutoridError::InvalidArgument(format!(
                    "range {} lies outside the 32-bit id space",
                    range_number
                ))
            })
    }

    /// Reject a replacement that moves existing ranges.
    ///
    /// Only `max_ranges` may differ from the stored geometry.
    pub fn check_compatible(&self, stored: &GlobalConfig) -> Result<(), AutoridError> {
        if stored.min_value != self.min_value || stored.range_size != self.range_size {
            return Err(AutoridError::ConfigImmutableViolation {
                stored: *stored,
                proposed: *self,
            });
        }
        Ok(())
    }

    /// Reject a `max_ranges` that no longer covers `hwm` allocated ranges.
    pub fn check_covers(&self, hwm: u32) -> Result<(), AutoridError> {
        if hwm > self.max_ranges {
            return Err(AutoridError::ConfigTooSmall {
                max_ranges: self.max_ranges,
                hwm,
            });
        }
        Ok(())
    }

    /// Decode the raw `CONFIG` record.
    pub fn from_record(raw: &[u8]) -> Result<Self, AutoridError> {
        std::str::from_utf8(raw)
            .map_err(|_| {
                AutoridError::InvalidArgument("configuration record is not valid text".to_string())
            })?
            .parse()
    }
}

impl fmt::Display for GlobalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "minvalue:{} rangesize:{} maxranges:{}",
            self.min_value, self.range_size, self.max_ranges
        )
    }
}

impl FromStr for GlobalConfig {
    type Err = AutoridError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let malformed = || {
            AutoridError::InvalidArgument(format!("invalid configuration data: '{}'", text))
        };

        let mut fields = text.split_whitespace();
        let mut field = |name: &str| -> Result<u32, AutoridError> {
            fields
                .next()
                .and_then(|token| token.strip_prefix(name))
                .and_then(|value| value.strip_prefix(':'))
                .and_then(|value| value.parse().ok())
                .ok_or_else(malformed)
        };

        let config = GlobalConfig {
            min_value: field("minvalue")?,
            range_size: field("rangesize")?,
            max_ranges: field("maxranges")?,
        };

        if fields.next().is_some() {
            return Err(malformed());
        }
        Ok(config)
    }
}
