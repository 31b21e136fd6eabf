//! # Transaction Isolation Harness
//!
//! Every participant owns one slot of a vector of u32 counters stored under
//! `testkey`. Each round is one transaction: read the vector, grow it to cover
//! the own slot, bump the slot, store it back. After every commit the
//! participant compares the committed vector with what it saw last time; a
//! slot that went backwards means the store lost or reordered a commit.
//!
//! Run several instances (threads or processes) against the same database,
//! each with its own `slot`.

use idmap_autorid::{StoreError, StoreMode, TransactionalStore};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// Key holding the counter vector.
pub const TEST_KEY: &str = "testkey";

/// Harness failures.
#[derive(Debug, Error)]
pub enum StressError {
    #[error("Counter record has {len} bytes, not a multiple of 4")]
    Malformed { len: usize },

    #[error("Counter of slot {slot} decreased from {from} to {to}")]
    Regression { slot: usize, from: u32, to: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The shared vector of per-participant counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CounterVector(Vec<u32>);

impl CounterVector {
    pub fn decode(raw: &[u8]) -> Result<Self, StressError> {
        if raw.len() % 4 != 0 {
            return Err(StressError::Malformed { len: raw.len() });
        }
        Ok(Self(
            raw.chunks_exact(4)
                .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        ))
    }

    pub fn encode(&self) -> Vec<u8> {
        self.0.iter().flat_map(|c| c.to_le_bytes()).collect()
    }

    /// Increment `slot`, zero-extending the vector if it is too short.
    pub fn bump(&mut self, slot: usize) {
        if self.0.len() <= slot {
            self.0.resize(slot + 1, 0);
        }
        self.0[slot] = self.0[slot].wrapping_add(1);
    }

    pub fn get(&self, slot: usize) -> u32 {
        self.0.get(slot).copied().unwrap_or(0)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// Raise every slot to at least its value in `other`.
    pub fn absorb(&mut self, other: &CounterVector) {
        if self.0.len() < other.0.len() {
            self.0.resize(other.0.len(), 0);
        }
        for (mine, &theirs) in self.0.iter_mut().zip(&other.0) {
            *mine = (*mine).max(theirs);
        }
    }

    /// No slot of `self` may be smaller than in `previous`.
    ///
    /// A slot missing from `self` counts as 0.
    pub fn check_monotonic(&self, previous: &CounterVector) -> Result<(), StressError> {
        for (slot, &from) in previous.0.iter().enumerate() {
            let to = self.get(slot);
            if to < from {
                return Err(StressError::Regression { slot, from, to });
            }
        }
        Ok(())
    }
}

impl fmt::Display for CounterVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, counter) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:6}", counter)?;
        }
        Ok(())
    }
}

/// Parameters of one harness participant.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Counter slot owned by this participant.
    pub slot: usize,
    /// Stop after this long (`None`: no time limit).
    pub time_limit: Option<Duration>,
    /// Stop after this many rounds (`None`: no round limit).
    pub max_rounds: Option<u64>,
    /// Pause between the steps of a round; the pause after the fetch happens
    /// while the transaction is open.
    pub delay: Duration,
    /// Log the vector after every round.
    pub verbose: bool,
}

impl StressConfig {
    pub fn new(slot: usize) -> Self {
        Self {
            slot,
            time_limit: Some(Duration::from_secs(10)),
            max_rounds: None,
            delay: Duration::ZERO,
            verbose: false,
        }
    }

    pub fn with_time_limit(mut self, limit: Option<Duration>) -> Self {
        self.time_limit = limit;
        self
    }

    pub fn with_max_rounds(mut self, rounds: Option<u64>) -> Self {
        self.max_rounds = rounds;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct StressReport {
    pub slot: usize,
    pub rounds: u64,
    pub last: CounterVector,
}

/// One round: bump our slot inside a transaction and return what was committed.
pub fn bump_once<S: TransactionalStore>(
    store: &S,
    slot: usize,
    delay: Duration,
) -> Result<CounterVector, StressError> {
    store.transaction(|txn| {
        let mut counters = match txn.fetch(TEST_KEY.as_bytes())? {
            Some(raw) => CounterVector::decode(&raw)?,
            None => CounterVector::default(),
        };
        pause(delay);

        counters.bump(slot);
        txn.store(TEST_KEY.as_bytes(), &counters.encode(), StoreMode::Replace)?;
        Ok(counters)
    })
}

/// Run rounds until a limit is reached or a regression is observed.
pub fn run<S: TransactionalStore>(
    store: &S,
    config: &StressConfig,
) -> Result<StressReport, StressError> {
    let started = Instant::now();
    let mut last = CounterVector::default();
    let mut rounds = 0u64;

    info!(
        "[autorid] Starting transaction test on slot {} (time limit {:?}, delay {:?})",
        config.slot, config.time_limit, config.delay
    );

    loop {
        if config.time_limit.is_some_and(|limit| started.elapsed() >= limit)
            || config.max_rounds.is_some_and(|max| rounds >= max)
        {
            break;
        }

        let committed = bump_once(store, config.slot, config.delay)?;
        committed.check_monotonic(&last)?;
        last = committed;
        rounds += 1;

        if config.verbose {
            info!("[autorid] Counters: {}", last);
        } else {
            debug!("[autorid] Round {} committed", rounds);
        }
        pause(config.delay);
    }

    info!(
        "[autorid] Transaction test on slot {} finished after {} rounds",
        config.slot, rounds
    );
    Ok(StressReport {
        slot: config.slot,
        rounds,
        last,
    })
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}
