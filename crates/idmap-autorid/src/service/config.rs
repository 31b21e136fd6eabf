//! # Global Configuration API Implementation

use super::*;
use crate::domain::keys::HWM;
use crate::ports::inbound::GlobalConfigApi;
use crate::ports::outbound::StoreMode;
use tracing::warn;

impl<S: TransactionalStore> RangeAllocatorService<S> {
    fn fetch_config_record(&self) -> Result<Vec<u8>, AutoridError> {
        self.store
            .fetch(CONFIG_KEY.as_bytes())?
            .ok_or_else(|| AutoridError::NotFound {
                key: CONFIG_KEY.to_string(),
            })
    }
}

impl<S: TransactionalStore> GlobalConfigApi for RangeAllocatorService<S> {
    fn load_config(&self) -> Result<GlobalConfig, AutoridError> {
        GlobalConfig::from_record(&self.fetch_config_record()?)
    }

    fn load_config_str(&self) -> Result<String, AutoridError> {
        let raw = self.fetch_config_record()?;
        String::from_utf8(raw).map_err(|_| {
            AutoridError::InvalidArgument("configuration record is not valid text".to_string())
        })
    }

    fn save_config(&self, config: &GlobalConfig) -> Result<(), AutoridError> {
        config.validate()?;

        // Compatibility and coverage are checked in the same transaction as
        // the write so no allocation can move the HWM in between.
        let result: Result<(), AutoridError> = self.store.transaction(|txn| {
            if let Some(stored) = load_config_in(txn)? {
                config.check_compatible(&stored)?;
            }
            let hwm = txn.fetch_u32(HWM)?.unwrap_or(0);
            config.check_covers(hwm)?;
            txn.store(
                CONFIG_KEY.as_bytes(),
                config.to_string().as_bytes(),
                StoreMode::Replace,
            )?;
            Ok(())
        });

        match &result {
            Ok(()) => info!("[autorid] ⚙️  Saved configuration '{}'", config),
            Err(err) => warn!("[autorid] Configuration '{}' rejected: {}", config, err),
        }
        result
    }

    fn save_config_str(&self, text: &str) -> Result<(), AutoridError> {
        let config: GlobalConfig = text.parse()?;
        self.save_config(&config)
    }
}
