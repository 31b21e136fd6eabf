//! # HWM Bootstrap
//!
//! Idempotent creation of the monotonic counters.

use super::*;
use crate::domain::errors::StoreError;
use crate::domain::keys::Counter;
use crate::ports::outbound::StoreMode;
use tracing::debug;

impl<S: TransactionalStore> CounterApi for RangeAllocatorService<S> {
    fn init_counter(&self, counter: Counter) -> Result<(), AutoridError> {
        if self.store.fetch_u32(counter.key())?.is_some() {
            debug!("[autorid] Counter '{}' already initialized", counter);
            return Ok(());
        }

        // Another initializer may have won the race since the fast-path read;
        // Insert-if-absent never overwrites its value.
        let created = self.store.transaction(|txn| {
            if txn.fetch_u32(counter.key())?.is_some() {
                return Ok(false);
            }
            txn.store(counter.key().as_bytes(), &0u32.to_le_bytes(), StoreMode::Insert)?;
            Ok::<_, StoreError>(true)
        })?;

        if created {
            info!("[autorid] Initialized counter '{}'", counter);
        }
        Ok(())
    }

    fn current_hwm(&self, counter: Counter) -> Result<u32, AutoridError> {
        self.store
            .fetch_u32(counter.key())?
            .ok_or_else(|| AutoridError::NotFound {
                key: counter.key().to_string(),
            })
    }
}
