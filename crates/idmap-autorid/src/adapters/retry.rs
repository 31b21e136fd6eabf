//! # Transaction Retry Policy
//!
//! Bounded attempts with exponential backoff and jitter, shared by the store
//! adapters.

use rand::Rng;
use std::time::Duration;

/// Retry policy for transaction runners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnConfig {
    /// Attempts before `RetriesExhausted` is reported (default: 64).
    pub max_attempts: u32,
    /// First backoff delay in milliseconds (default: 1).
    pub initial_backoff_ms: u64,
    /// Backoff ceiling in milliseconds (default: 100).
    pub max_backoff_ms: u64,
}

impl Default for TxnConfig {
    fn default() -> Self {
        Self {
            max_attempts: 64,
            initial_backoff_ms: 1,
            max_backoff_ms: 100,
        }
    }
}

impl TxnConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generous budget, no sleeping. For heavily contended unit tests.
    pub fn for_testing() -> Self {
        Self {
            max_attempts: 10_000,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_backoff(mut self, initial_ms: u64, max_ms: u64) -> Self {
        self.initial_backoff_ms = initial_ms;
        self.max_backoff_ms = max_ms.max(initial_ms);
        self
    }

    /// At least one attempt is always made.
    pub(crate) fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Exponential backoff state for one logical transaction.
pub(crate) struct Backoff {
    next_ms: u64,
    max_ms: u64,
}

impl Backoff {
    pub(crate) fn new(config: &TxnConfig) -> Self {
        Self {
            next_ms: config.initial_backoff_ms,
            max_ms: config.max_backoff_ms,
        }
    }

    /// Sleep for the current delay plus up to 50% jitter, then double it.
    pub(crate) fn wait(&mut self) {
        if self.next_ms > 0 {
            let jitter = rand::thread_rng().gen_range(0..=self.next_ms / 2);
            std::thread::sleep(Duration::from_millis(self.next_ms + jitter));
        }
        self.next_ms = self.next_ms.saturating_mul(2).min(self.max_ms);
    }
}
