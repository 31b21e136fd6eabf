//! # Range Allocator API Implementation
//!
//! Acquire-next-range, set-explicit-range and pool id allocation. Each call
//! is one store transaction whose body may run several times; the body only
//! talks to the transaction handle and keeps nothing between attempts.

use super::*;
use crate::domain::entities::{Pool, RangeRecord};
use crate::domain::errors::{ConflictReason, StoreError};
use crate::domain::keys::{reverse_key, DomainKey, HWM};
use crate::ports::inbound::RangeAllocatorApi;
use crate::ports::outbound::StoreMode;
use tracing::{debug, warn};

/// Resolve or create the mapping of `key` inside `txn`.
///
/// Returns the record and whether it was created by this call.
pub(crate) fn add_range_action(
    txn: &mut dyn StoreTxn,
    key: &DomainKey,
    explicit: Option<u32>,
) -> Result<(RangeRecord, bool), AutoridError> {
    let keystr = key.keystr();

    if let Some(stored) = txn.fetch_u32(&keystr)? {
        if let Some(requested) = explicit {
            if requested != stored {
                return Err(AutoridError::Conflict {
                    key: keystr,
                    reason: ConflictReason::RangeMismatch { requested, stored },
                });
            }
        }
        let config = require_config(txn)?;
        return Ok((RangeRecord::resolve(key.clone(), stored, &config)?, false));
    }

    let hwm = txn.fetch_u32(HWM)?.ok_or_else(|| AutoridError::NotFound {
        key: HWM.to_string(),
    })?;
    let config = require_config(txn)?;

    let candidate = match explicit {
        Some(requested) if requested < hwm => {
            return Err(AutoridError::OutOfOrder { requested, hwm });
        }
        Some(requested) => requested,
        None => hwm,
    };
    if candidate >= config.max_ranges {
        return Err(AutoridError::CapacityExceeded {
            requested: candidate,
            limit: config.max_ranges,
        });
    }

    let record = RangeRecord::resolve(key.clone(), candidate, &config)?;

    // candidate < max_ranges, so candidate + 1 cannot overflow
    txn.change_u32_atomic(HWM, candidate + 1 - hwm)?;
    txn.store(keystr.as_bytes(), &candidate.to_le_bytes(), StoreMode::Replace)?;
    txn.store(
        reverse_key(candidate).as_bytes(),
        keystr.as_bytes(),
        StoreMode::Insert,
    )
    .map_err(|err| match err {
        StoreError::AlreadyExists { .. } => AutoridError::Conflict {
            key: keystr.clone(),
            reason: ConflictReason::SlotOccupied {
                range_number: candidate,
            },
        },
        other => other.into(),
    })?;

    Ok((record, true))
}

/// The stored geometry; its absence is an error on every allocation path.
pub(crate) fn require_config(txn: &mut dyn StoreTxn) -> Result<GlobalConfig, AutoridError> {
    load_config_in(txn)?.ok_or_else(|| AutoridError::NotFound {
        key: CONFIG_KEY.to_string(),
    })
}

impl<S: TransactionalStore> RangeAllocatorService<S> {
    pub(crate) fn acquire_or_set_range(
        &self,
        domain: &str,
        index: u32,
        explicit: Option<u32>,
    ) -> Result<RangeRecord, AutoridError> {
        let key = DomainKey::new(domain, index)?;

        let result = self
            .store
            .transaction(|txn| add_range_action(txn, &key, explicit));

        match &result {
            Ok((record, true)) => info!(
                "[autorid] 📦 Range {} (low id {}) assigned to {}",
                record.range_number, record.low_id, key
            ),
            Ok((record, false)) => debug!(
                "[autorid] {} already owns range {}",
                key, record.range_number
            ),
            Err(err) => warn!("[autorid] Range request for {} rejected: {}", key, err),
        }
        result.map(|(record, _)| record)
    }
}

impl<S: TransactionalStore> RangeAllocatorApi for RangeAllocatorService<S> {
    fn acquire_range(&self, domain: &str, index: u32) -> Result<RangeRecord, AutoridError> {
        self.acquire_or_set_range(domain, index, None)
    }

    fn set_range(
        &self,
        domain: &str,
        index: u32,
        range_number: u32,
    ) -> Result<RangeRecord, AutoridError> {
        self.acquire_or_set_range(domain, index, Some(range_number))
    }

    fn allocate_pool_id(&self, pool: Pool) -> Result<u32, AutoridError> {
        let counter = pool.counter();

        let result: Result<u32, AutoridError> = self.store.transaction(|txn| {
            let (range, _) = add_range_action(txn, &DomainKey::alloc_pool(), None)?;
            let config = require_config(txn)?;

            let next = txn
                .fetch_u32(counter.key())?
                .ok_or_else(|| AutoridError::NotFound {
                    key: counter.key().to_string(),
                })?;
            if next >= config.range_size {
                return Err(AutoridError::CapacityExceeded {
                    requested: next,
                    limit: config.range_size,
                });
            }
            txn.change_u32_atomic(counter.key(), 1)?;

            range.low_id.checked_add(next).ok_or_else(|| {
                AutoridError::InvalidArgument(format!(
                    "pool id {} of range {} lies outside the 32-bit id space",
                    next, range.range_number
                ))
            })
        });

        match &result {
            Ok(id) => debug!("[autorid] Allocated {} from {}", id, counter),
            Err(err) => warn!("[autorid] Pool allocation from {} failed: {}", counter, err),
        }
        result
    }
}
