//! # Inbound Ports (Driving Ports)
//!
//! The API this library exposes to the identity-mapping service and to
//! administrative tools.

use crate::domain::config::GlobalConfig;
use crate::domain::entities::{Pool, RangeRecord};
use crate::domain::errors::AutoridError;
use crate::domain::keys::Counter;

/// Range allocation. Every call is one store transaction.
pub trait RangeAllocatorApi {
    /// Return the range of `(domain, index)`, allocating the next free one if
    /// the domain has none yet.
    ///
    /// ## Idempotence
    ///
    /// Repeated calls return the same record.
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: malformed domain id
    /// - `NotFound`: no configuration stored yet
    /// - `CapacityExceeded`: HWM already equals `maxranges`
    /// - `Conflict`: the next slot is already owned (corruption)
    fn acquire_range(&self, domain: &str, index: u32) -> Result<RangeRecord, AutoridError>;

    /// Map `(domain, index)` to the explicit `range_number`.
    ///
    /// ## Errors
    ///
    /// - `Conflict`: domain already mapped to a different range, or the slot
    ///   is owned by another domain
    /// - `OutOfOrder`: `range_number` is below the current HWM
    /// - `CapacityExceeded`: `range_number >= maxranges`
    fn set_range(
        &self,
        domain: &str,
        index: u32,
        range_number: u32,
    ) -> Result<RangeRecord, AutoridError>;

    /// Hand out the next id of the allocation pool range.
    ///
    /// The pool range itself is acquired on first use.
    fn allocate_pool_id(&self, pool: Pool) -> Result<u32, AutoridError>;
}

/// Read-only resolution of existing mappings.
pub trait RangeLookupApi {
    /// Resolve an existing mapping. Never allocates.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: domain not mapped, or no configuration stored
    fn get_range(&self, domain: &str, index: u32) -> Result<RangeRecord, AutoridError>;

    /// Resolve a mapping, falling back to `acquire_range` unless `read_only`.
    fn get_domain_range(
        &self,
        domain: &str,
        index: u32,
        read_only: bool,
    ) -> Result<RangeRecord, AutoridError>;
}

/// Global configuration management.
pub trait GlobalConfigApi {
    /// Load and parse the stored geometry.
    ///
    /// ## Errors
    ///
    /// - `NotFound`: nothing stored yet
    /// - `InvalidArgument`: the stored record does not parse
    fn load_config(&self) -> Result<GlobalConfig, AutoridError>;

    /// The stored configuration record, unparsed.
    fn load_config_str(&self) -> Result<String, AutoridError>;

    /// Validate and persist the geometry.
    ///
    /// Stricter than the classic autorid checks: a geometry whose last range
    /// ends past `u32::MAX` is refused (for example `minvalue:10000
    /// rangesize:100000 maxranges:42950`), since ids of its upper ranges
    /// could not be represented.
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: `rangesize < 2000`, `maxranges == 0`, or the id
    ///   space exceeds 32 bits
    /// - `ConfigImmutableViolation`: `minvalue`/`rangesize` differ from the
    ///   stored values
    /// - `ConfigTooSmall`: `maxranges` below the current HWM
    fn save_config(&self, config: &GlobalConfig) -> Result<(), AutoridError>;

    /// Parse a `minvalue:<n> rangesize:<n> maxranges:<n>` string and save it.
    fn save_config_str(&self, text: &str) -> Result<(), AutoridError>;
}

/// High-water-mark counters.
pub trait CounterApi {
    /// Create `counter` with value 0 unless it already exists.
    fn init_counter(&self, counter: Counter) -> Result<(), AutoridError>;

    /// Initialize all three counters.
    fn init_counters(&self) -> Result<(), AutoridError> {
        for counter in Counter::ALL {
            self.init_counter(counter)?;
        }
        Ok(())
    }

    /// Current committed value of `counter`.
    fn current_hwm(&self, counter: Counter) -> Result<u32, AutoridError>;
}
