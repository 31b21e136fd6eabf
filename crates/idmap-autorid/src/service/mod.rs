//! # Range Allocator Service
//!
//! The main service implementing the allocator API on top of an injected
//! `TransactionalStore`.
//!
//! ## Architecture
//!
//! This service:
//! 1. Implements `RangeAllocatorApi` (acquire / set / pool ids)
//! 2. Implements `RangeLookupApi` (read-only resolution)
//! 3. Implements `GlobalConfigApi` and `CounterApi`
//! 4. Holds no state besides the store; every mutating call is exactly one
//!    store transaction
//!
//! ## Lifecycle
//!
//! `open` bootstraps the counters, `close` hands the store back.

mod allocator;
mod bootstrap;
mod config;
mod lookup;

use crate::domain::config::GlobalConfig;
use crate::domain::errors::AutoridError;
use crate::domain::keys::CONFIG_KEY;
use crate::ports::inbound::CounterApi;
use crate::ports::outbound::{StoreTxn, TransactionalStore};
use tracing::info;

/// The autorid range allocator.
///
/// Cheap to share: wrap it in an `Arc` and call it from as many threads as
/// needed. All coordination happens in the store.
pub struct RangeAllocatorService<S: TransactionalStore> {
    store: S,
}

impl<S: TransactionalStore> RangeAllocatorService<S> {
    /// Wrap a store without touching it.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Wrap a store and make sure the HWM counters exist.
    pub fn open(store: S) -> Result<Self, AutoridError> {
        let service = Self::new(store);
        service.init_counters()?;
        info!("[autorid] Allocator database ready");
        Ok(service)
    }

    /// Release the service and return the underlying store.
    pub fn close(self) -> S {
        self.store
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Load the geometry inside a running transaction.
pub(crate) fn load_config_in(txn: &mut dyn StoreTxn) -> Result<Option<GlobalConfig>, AutoridError> {
    txn.fetch(CONFIG_KEY.as_bytes())?
        .map(|raw| GlobalConfig::from_record(&raw))
        .transpose()
}
