//! # Allocator Flows over the File Store
//!
//! End-to-end use of the allocator with durable storage: configuration,
//! allocation, lookup, reopening, and the persisted record layout.

#[cfg(test)]
mod tests {
    use crate::support::check_invariants;
    use idmap_autorid::{
        AutoridError, Counter, CounterApi, FileStore, FileStoreConfig, GlobalConfig,
        GlobalConfigApi, Pool, RangeAllocatorApi, RangeAllocatorService, RangeLookupApi,
        TransactionalStore,
    };
    use std::path::Path;
    use tempfile::TempDir;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn open(path: &Path) -> RangeAllocatorService<FileStore> {
        let store = FileStore::open(FileStoreConfig::for_testing(path)).unwrap();
        RangeAllocatorService::open(store).unwrap()
    }

    fn configured(path: &Path, max_ranges: u32) -> RangeAllocatorService<FileStore> {
        let service = open(path);
        service
            .save_config(&GlobalConfig::new(10000, 2000, max_ranges))
            .unwrap();
        service
    }

    // =============================================================================
    // FLOWS
    // =============================================================================

    #[test]
    fn test_reference_scenario_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("autorid.tdb");
        let service = configured(&path, 5);

        let first = service.acquire_range("S-1-5-21-1", 0).unwrap();
        let second = service.acquire_range("S-1-5-21-2", 0).unwrap();
        assert_eq!((first.range_number, first.low_id), (0, 10000));
        assert_eq!((second.range_number, second.low_id), (1, 12000));

        assert!(matches!(
            service.set_range("S-1-5-21-3", 0, 1),
            Err(AutoridError::OutOfOrder { requested: 1, hwm: 2 })
        ));

        for n in 3..=5 {
            service.acquire_range(&format!("S-1-5-21-{}", n), 0).unwrap();
        }
        assert!(matches!(
            service.acquire_range("S-1-5-21-6", 0),
            Err(AutoridError::CapacityExceeded { .. })
        ));

        let summary = check_invariants(service.store()).unwrap();
        assert_eq!(summary.hwm, 5);
        assert_eq!(summary.ranges.len(), 5);
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("autorid.tdb");

        let record = {
            let service = configured(&path, 10);
            service.acquire_range("S-1-5-21-7", 2).unwrap()
        };

        let service = open(&path);
        assert_eq!(service.get_range("S-1-5-21-7", 2).unwrap(), record);
        assert_eq!(service.current_hwm(Counter::Range).unwrap(), 1);
        assert_eq!(
            service.load_config().unwrap(),
            GlobalConfig::new(10000, 2000, 10)
        );
    }

    #[test]
    fn test_persisted_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("autorid.tdb");
        let service = configured(&path, 10);
        service.acquire_range("S-1-5-21-9", 0).unwrap();
        service.acquire_range("S-1-5-21-9", 1).unwrap();

        let store = service.store();
        assert_eq!(store.fetch_u32("NEXT RANGE").unwrap(), Some(2));
        assert_eq!(store.fetch_u32("NEXT ALLOC UID").unwrap(), Some(0));
        assert_eq!(store.fetch_u32("NEXT ALLOC GID").unwrap(), Some(0));
        assert_eq!(
            store.fetch(b"CONFIG").unwrap(),
            Some(b"minvalue:10000 rangesize:2000 maxranges:10".to_vec())
        );
        assert_eq!(
            store.fetch(b"S-1-5-21-9").unwrap(),
            Some(0u32.to_le_bytes().to_vec())
        );
        assert_eq!(
            store.fetch(b"S-1-5-21-9#1").unwrap(),
            Some(1u32.to_le_bytes().to_vec())
        );
        assert_eq!(store.fetch(b"1").unwrap(), Some(b"S-1-5-21-9#1".to_vec()));
    }

    #[test]
    fn test_config_rules_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("autorid.tdb");
        let service = configured(&path, 4);
        for n in 0..3 {
            service.acquire_range(&format!("S-1-5-21-{}", n), 0).unwrap();
        }

        assert!(matches!(
            service.save_config(&GlobalConfig::new(10000, 2000, 2)),
            Err(AutoridError::ConfigTooSmall { max_ranges: 2, hwm: 3 })
        ));
        assert!(matches!(
            service.save_config(&GlobalConfig::new(0, 2000, 4)),
            Err(AutoridError::ConfigImmutableViolation { .. })
        ));

        // A second handle sees the raised limit at once.
        service.save_config_str("minvalue:10000 rangesize:2000 maxranges:8").unwrap();
        let other = open(&path);
        assert_eq!(other.load_config().unwrap().max_ranges, 8);
        check_invariants(other.store()).unwrap();
    }

    #[test]
    fn test_pool_ids_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("autorid.tdb");
        let service = configured(&path, 10);

        let uids: Vec<u32> = (0..5)
            .map(|_| service.allocate_pool_id(Pool::Uid).unwrap())
            .collect();
        assert_eq!(uids, vec![10000, 10001, 10002, 10003, 10004]);
        assert_eq!(service.allocate_pool_id(Pool::Gid).unwrap(), 10000);

        let reopened = open(&path);
        assert_eq!(reopened.allocate_pool_id(Pool::Uid).unwrap(), 10005);
        assert_eq!(reopened.current_hwm(Counter::AllocUid).unwrap(), 6);
        check_invariants(reopened.store()).unwrap();
    }

    #[test]
    fn test_lookup_fallback_allocates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("autorid.tdb");
        let service = configured(&path, 10);

        assert!(matches!(
            service.get_domain_range("S-1-5-21-42", 0, true),
            Err(AutoridError::NotFound { .. })
        ));
        let record = service.get_domain_range("S-1-5-21-42", 0, false).unwrap();
        assert_eq!(service.get_range("S-1-5-21-42", 0).unwrap(), record);
    }
}
