//! # Range Lookup API Implementation
//!
//! Reads go straight to the store without a transaction; they only ever see
//! committed mappings.

use super::*;
use crate::domain::entities::RangeRecord;
use crate::domain::keys::DomainKey;
use crate::ports::inbound::{RangeAllocatorApi, RangeLookupApi};

impl<S: TransactionalStore> RangeLookupApi for RangeAllocatorService<S> {
    fn get_range(&self, domain: &str, index: u32) -> Result<RangeRecord, AutoridError> {
        let key = DomainKey::new(domain, index)?;
        let keystr = key.keystr();

        let range_number = self
            .store
            .fetch_u32(&keystr)?
            .ok_or(AutoridError::NotFound { key: keystr })?;

        let raw = self
            .store
            .fetch(CONFIG_KEY.as_bytes())?
            .ok_or_else(|| AutoridError::NotFound {
                key: CONFIG_KEY.to_string(),
            })?;
        let config = GlobalConfig::from_record(&raw)?;

        RangeRecord::resolve(key, range_number, &config)
    }

    fn get_domain_range(
        &self,
        domain: &str,
        index: u32,
        read_only: bool,
    ) -> Result<RangeRecord, AutoridError> {
        match self.get_range(domain, index) {
            Err(AutoridError::NotFound { key }) if !read_only && key != CONFIG_KEY => {
                tracing::debug!("[autorid] {} not mapped yet, acquiring", key);
                self.acquire_range(domain, index)
            }
            other => other,
        }
    }
}
