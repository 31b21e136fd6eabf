//! # Transaction Isolation Harness
//!
//! Several participants, each with its own `FileStore` handle, bump their
//! slot of the shared counter vector. Every participant must observe each
//! slot as non-decreasing, and the final vector must count every round.
//!
//! The observed runs go further: every vector anyone has seen is folded into
//! a shared slot-wise maximum, and each new observation (committed or read
//! without the lock) must be at least what was known when it started.

#[cfg(test)]
mod tests {
    use autorid_ctl::stress::{self, CounterVector, StressConfig, TEST_KEY};
    use idmap_autorid::{FileStore, FileStoreConfig, InMemoryStore, TransactionalStore, TxnConfig};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    fn final_vector<S: TransactionalStore>(store: &S) -> CounterVector {
        let raw = store.fetch(TEST_KEY.as_bytes()).unwrap().unwrap();
        CounterVector::decode(&raw).unwrap()
    }

    fn run_participants(path: &Path, participants: usize, rounds: u64) {
        let handles: Vec<_> = (0..participants)
            .map(|slot| {
                let store = FileStore::open(FileStoreConfig::for_testing(path)).unwrap();
                std::thread::spawn(move || {
                    let config = StressConfig::new(slot)
                        .with_time_limit(None)
                        .with_max_rounds(Some(rounds));
                    stress::run(&store, &config).unwrap()
                })
            })
            .collect();

        for handle in handles {
            let report = handle.join().unwrap();
            assert_eq!(report.rounds, rounds);
            // Our own slot counts exactly our commits.
            assert_eq!(u64::from(report.last.get(report.slot)), rounds);
        }
    }

    /// Check `observed` against what was known before it was taken, then
    /// publish it.
    fn observe(seen: &Mutex<CounterVector>, before: &CounterVector, observed: &CounterVector) {
        if let Err(err) = observed.check_monotonic(before) {
            panic!("{} (known {}, observed {})", err, before, observed);
        }
        seen.lock().unwrap().absorb(observed);
    }

    /// `participants` writers plus one lock-free reader, each on the handle
    /// returned by `open`.
    fn run_observed<S, F>(open: F, participants: usize, rounds: u32)
    where
        S: TransactionalStore + Send,
        F: Fn() -> S,
    {
        let seen = Mutex::new(CounterVector::default());
        let finished = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for slot in 0..participants {
                let store = open();
                let (seen, finished) = (&seen, &finished);
                scope.spawn(move || {
                    for _ in 0..rounds {
                        let before = seen.lock().unwrap().clone();
                        let committed = stress::bump_once(&store, slot, Duration::ZERO).unwrap();
                        observe(seen, &before, &committed);
                    }
                    finished.fetch_add(1, Ordering::SeqCst);
                });
            }

            let reader = open();
            let (seen, finished) = (&seen, &finished);
            scope.spawn(move || {
                let mut reads = 0u32;
                loop {
                    let last_pass = finished.load(Ordering::SeqCst) == participants;
                    let before = seen.lock().unwrap().clone();
                    if let Some(raw) = reader.fetch(TEST_KEY.as_bytes()).unwrap() {
                        observe(seen, &before, &CounterVector::decode(&raw).unwrap());
                        reads += 1;
                    }
                    if last_pass {
                        break;
                    }
                }
                assert!(reads > 0);
            });
        });

        let totals = seen.into_inner().unwrap();
        assert_eq!(totals.as_slice(), vec![rounds; participants].as_slice());
    }

    #[test]
    fn test_observations_never_go_back_on_file_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("transaction.tdb");

        run_observed(
            || FileStore::open(FileStoreConfig::for_testing(&path)).unwrap(),
            4,
            25,
        );
    }

    #[test]
    fn test_observations_never_go_back_on_optimistic_store() {
        let store = Arc::new(InMemoryStore::with_config(TxnConfig::for_testing()));

        run_observed(|| Arc::clone(&store), 6, 100);
    }

    #[test]
    fn test_counters_monotonic_across_handles() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("transaction.tdb");

        run_participants(&path, 4, 30);

        let store = FileStore::open(FileStoreConfig::for_testing(&path)).unwrap();
        assert_eq!(final_vector(&store).as_slice(), &[30, 30, 30, 30]);
    }

    #[test]
    fn test_sparse_slots() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("transaction.tdb");
        let store = FileStore::open(FileStoreConfig::for_testing(&path)).unwrap();

        // A participant with a high slot grows the vector for everyone.
        stress::bump_once(&store, 5, Duration::ZERO).unwrap();
        stress::bump_once(&store, 1, Duration::ZERO).unwrap();

        assert_eq!(final_vector(&store).as_slice(), &[0, 1, 0, 0, 0, 1]);
    }

    #[test]
    fn test_time_limited_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("transaction.tdb");
        let store = FileStore::open(FileStoreConfig::for_testing(&path)).unwrap();

        let config = StressConfig::new(0).with_time_limit(Some(Duration::from_millis(200)));
        let report = stress::run(&store, &config).unwrap();

        assert!(report.rounds > 0);
        assert_eq!(u64::from(final_vector(&store).get(0)), report.rounds);
    }

    #[test]
    fn test_optimistic_store_under_harness() {
        let store = Arc::new(InMemoryStore::with_config(TxnConfig::for_testing()));

        let handles: Vec<_> = (0..6)
            .map(|slot| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let config = StressConfig::new(slot)
                        .with_time_limit(None)
                        .with_max_rounds(Some(100));
                    stress::run(&store, &config).unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(final_vector(&store).as_slice(), &[100; 6]);
        assert!(store.stats().commits >= 600);
    }
}
