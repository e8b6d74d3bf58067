// Package lifecycle provides per-manager lifecycle counters.

use std::sync::atomic::{AtomicI64, Ordering};

/// Counters for lifecycle transitions of one manager.
pub struct Counters {
    /// Copies produced from the template.
    pub copies: AtomicI64,
    /// Failed copy attempts.
    pub clone_failures: AtomicI64,
    /// Successful setup hooks.
    pub setups: AtomicI64,
    /// Failed setup hooks.
    pub setup_failures: AtomicI64,
    /// Teardown hooks invoked, successful or not.
    pub teardowns: AtomicI64,
    /// Failed teardown hooks.
    pub teardown_failures: AtomicI64,
}

/// Point-in-time copy of `Counters`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub copies: i64,
    pub clone_failures: i64,
    pub setups: i64,
    pub setup_failures: i64,
    pub teardowns: i64,
    pub teardown_failures: i64,
}

impl CountersSnapshot {
    /// Copies that passed setup and have not been torn down yet.
    pub fn outstanding(&self) -> i64 {
        self.setups - self.teardowns
    }
}

impl Counters {
    pub fn new() -> Self {
        Self {
            copies: AtomicI64::new(0),
            clone_failures: AtomicI64::new(0),
            setups: AtomicI64::new(0),
            setup_failures: AtomicI64::new(0),
            teardowns: AtomicI64::new(0),
            teardown_failures: AtomicI64::new(0),
        }
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            copies: self.copies.load(Ordering::Relaxed),
            clone_failures: self.clone_failures.load(Ordering::Relaxed),
            setups: self.setups.load(Ordering::Relaxed),
            setup_failures: self.setup_failures.load(Ordering::Relaxed),
            teardowns: self.teardowns.load(Ordering::Relaxed),
            teardown_failures: self.teardown_failures.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn inc(counter: &AtomicI64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}
