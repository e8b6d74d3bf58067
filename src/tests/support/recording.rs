//! Worker function that records every hook call.

use anyhow::bail;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::lifecycle::WorkerFn;

/// Shared observer for all copies of a `RecordingFn`.
#[derive(Default)]
pub struct Probe {
    setups: AtomicUsize,
    teardowns: AtomicUsize,
    /// Hook called on a copy that was already set up / torn down.
    violations: AtomicUsize,
    fail_setups: AtomicUsize,
    in_setup: AtomicUsize,
    max_in_setup: AtomicUsize,
    /// When > 0, setup waits until this many setups run at once (or the deadline passes).
    rendezvous: AtomicUsize,
    setup_delay_ms: AtomicUsize,
}

impl Probe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn setups(&self) -> usize {
        self.setups.load(Ordering::SeqCst)
    }

    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }

    pub fn violations(&self) -> usize {
        self.violations.load(Ordering::SeqCst)
    }

    /// Blocks until some setup is running, or five seconds pass.
    pub fn wait_for_setup(&self) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.in_setup.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(self.in_setup.load(Ordering::SeqCst) > 0, "no setup started");
    }

    pub fn max_in_setup(&self) -> usize {
        self.max_in_setup.load(Ordering::SeqCst)
    }

    /// Makes the next `n` setups fail.
    pub fn fail_next_setups(&self, n: usize) {
        self.fail_setups.store(n, Ordering::SeqCst);
    }

    pub fn rendezvous_in_setup(&self, parties: usize) {
        self.rendezvous.store(parties, Ordering::SeqCst);
    }

    pub fn delay_setup(&self, delay: Duration) {
        self.setup_delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    fn take_setup_failure(&self) -> bool {
        self.fail_setups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn enter_setup(&self) {
        let now = self.in_setup.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_setup.fetch_max(now, Ordering::SeqCst);

        let parties = self.rendezvous.load(Ordering::SeqCst);
        if parties > 0 {
            let deadline = Instant::now() + Duration::from_secs(5);
            while self.in_setup.load(Ordering::SeqCst) < parties && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(1));
            }
        }

        let delay = self.setup_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay as u64));
        }
    }

    fn leave_setup(&self) {
        self.in_setup.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Worker function with per-copy state and observable hooks.
#[derive(Clone)]
pub struct RecordingFn {
    probe: Arc<Probe>,
    /// Per-copy scratch state, used to check isolation.
    pub seen: Vec<u64>,
    pub fail_teardown: bool,
    set_up: bool,
    torn_down: bool,
}

impl RecordingFn {
    pub fn new(probe: Arc<Probe>) -> Self {
        Self {
            probe,
            seen: Vec::new(),
            fail_teardown: false,
            set_up: false,
            torn_down: false,
        }
    }

    pub fn is_set_up(&self) -> bool {
        self.set_up
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

impl WorkerFn for RecordingFn {
    fn setup(&mut self) -> anyhow::Result<()> {
        if self.set_up {
            self.probe.violations.fetch_add(1, Ordering::SeqCst);
        }
        self.probe.enter_setup();
        let fail = self.probe.take_setup_failure();
        self.probe.leave_setup();
        if fail {
            bail!("setup refused");
        }
        self.set_up = true;
        self.probe.setups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn teardown(&mut self) -> anyhow::Result<()> {
        if self.torn_down || !self.set_up {
            self.probe.violations.fetch_add(1, Ordering::SeqCst);
        }
        self.torn_down = true;
        self.probe.teardowns.fetch_add(1, Ordering::SeqCst);
        if self.fail_teardown {
            bail!("teardown refused");
        }
        Ok(())
    }
}
