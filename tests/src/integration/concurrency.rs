//! # Many Handles, One Database
//!
//! Each thread opens its own `FileStore` on the same path, which is how
//! separate processes share an autorid database. The transaction lock is the
//! only coordination between them.

#[cfg(test)]
mod tests {
    use crate::support::check_invariants;
    use idmap_autorid::{
        AutoridError, FileStore, FileStoreConfig, GlobalConfig, GlobalConfigApi, Pool,
        RangeAllocatorApi, RangeAllocatorService,
    };
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Barrier};
    use std::thread::JoinHandle;
    use tempfile::TempDir;

    fn open(path: &Path) -> RangeAllocatorService<FileStore> {
        let store = FileStore::open(FileStoreConfig::for_testing(path)).unwrap();
        RangeAllocatorService::open(store).unwrap()
    }

    fn reopen(path: &Path) -> FileStore {
        FileStore::open(FileStoreConfig::for_testing(path)).unwrap()
    }

    fn setup(max_ranges: u32) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("autorid.tdb");
        open(&path)
            .save_config(&GlobalConfig::new(10000, 2000, max_ranges))
            .unwrap();
        (dir, path)
    }

    /// Run `work(i, service)` on `n` threads, each with its own handle,
    /// released together.
    fn spawn_handles<T, F>(path: &Path, n: u32, work: F) -> Vec<T>
    where
        T: Send + 'static,
        F: Fn(u32, RangeAllocatorService<FileStore>) -> T + Send + Sync + 'static,
    {
        let barrier = Arc::new(Barrier::new(n as usize));
        let work = Arc::new(work);

        let handles: Vec<JoinHandle<T>> = (0..n)
            .map(|i| {
                let service = open(path);
                let barrier = Arc::clone(&barrier);
                let work = Arc::clone(&work);
                std::thread::spawn(move || {
                    barrier.wait();
                    work(i, service)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    }

    #[test]
    fn test_distinct_domains_get_distinct_ranges() {
        let n = 8;
        let (_dir, path) = setup(100);

        let records = spawn_handles(&path, n, |i, service| {
            service
                .acquire_range(&format!("S-1-5-21-100-{}", i), 0)
                .unwrap()
        });

        let numbers: HashSet<u32> = records.iter().map(|r| r.range_number).collect();
        assert_eq!(numbers, (0..n).collect::<HashSet<u32>>());

        let summary = check_invariants(&reopen(&path)).unwrap();
        assert_eq!(summary.hwm, n);
    }

    #[test]
    fn test_same_domain_from_every_handle() {
        let (_dir, path) = setup(100);

        let records = spawn_handles(&path, 6, |_, service| {
            service.acquire_range("S-1-5-21-555", 0).unwrap()
        });

        assert!(records.iter().all(|r| *r == records[0]));
        let summary = check_invariants(&reopen(&path)).unwrap();
        assert_eq!(summary.hwm, 1);
    }

    #[test]
    fn test_capacity_holds_under_contention() {
        let (_dir, path) = setup(3);

        let results = spawn_handles(&path, 8, |i, service| {
            service.acquire_range(&format!("S-1-5-21-200-{}", i), 0)
        });

        let granted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(granted, 3);
        assert!(results.iter().all(|r| match r {
            Ok(record) => record.range_number < 3,
            Err(err) => matches!(err, AutoridError::CapacityExceeded { .. }),
        }));
        check_invariants(&reopen(&path)).unwrap();
    }

    #[test]
    fn test_mixed_explicit_and_automatic_allocation() {
        let (_dir, path) = setup(200);

        // Even threads pick explicit ranges far ahead; odd threads allocate.
        let results = spawn_handles(&path, 8, |i, service| {
            let domain = format!("S-1-5-21-300-{}", i);
            if i % 2 == 0 {
                service.set_range(&domain, 0, 100 + i)
            } else {
                service.acquire_range(&domain, 0)
            }
        });

        for result in &results {
            match result {
                Ok(_) | Err(AutoridError::OutOfOrder { .. }) => {}
                Err(other) => panic!("unexpected error {:?}", other),
            }
        }
        let summary = check_invariants(&reopen(&path)).unwrap();
        let granted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(summary.ranges.len(), granted);
    }

    #[test]
    fn test_pool_ids_unique_across_handles() {
        let (_dir, path) = setup(10);

        let batches = spawn_handles(&path, 4, |_, service| {
            (0..10)
                .map(|_| service.allocate_pool_id(Pool::Uid).unwrap())
                .collect::<Vec<u32>>()
        });

        let all: Vec<u32> = batches.into_iter().flatten().collect();
        let unique: HashSet<u32> = all.iter().copied().collect();
        assert_eq!(unique.len(), 40);
        assert_eq!(unique, (10000..10040).collect::<HashSet<u32>>());
    }
}
