// Package runner provides the demo worker function driven by the binary.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::lifecycle::WorkerFn;

/// Runtime-only state opened in setup and closed in teardown.
#[derive(Debug)]
struct Session {
    opened_at: Instant,
    processed: u64,
}

/// Tags each element with a prefix. Not safe to share: every worker writes its own
/// session counters and scratch buffer.
#[derive(Debug, Serialize, Deserialize)]
pub struct Enricher {
    prefix: String,
    /// Reject every n-th element; 0 disables.
    fail_every: u64,
    #[serde(skip)]
    session: Option<Session>,
    #[serde(skip)]
    scratch: String,
}

impl Enricher {
    pub fn new(prefix: impl Into<String>, fail_every: u64) -> Self {
        Self {
            prefix: prefix.into(),
            fail_every,
            session: None,
            scratch: String::new(),
        }
    }

    /// Enriches one element. Only valid between setup and teardown.
    pub fn process(&mut self, element: u64) -> Result<usize> {
        let Some(session) = self.session.as_mut() else {
            bail!("enricher used outside of setup/teardown");
        };
        if self.fail_every > 0 && element > 0 && element % self.fail_every == 0 {
            bail!("element {} rejected", element);
        }

        self.scratch.clear();
        self.scratch.push_str(&self.prefix);
        self.scratch.push_str(&element.to_string());
        session.processed += 1;
        Ok(self.scratch.len())
    }

    /// True between setup and teardown.
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Elements processed by this copy since setup.
    pub fn processed(&self) -> u64 {
        self.session.as_ref().map(|s| s.processed).unwrap_or(0)
    }
}

impl WorkerFn for Enricher {
    fn setup(&mut self) -> Result<()> {
        if self.session.is_some() {
            bail!("enricher set up twice");
        }
        self.session = Some(Session {
            opened_at: Instant::now(),
            processed: 0,
        });
        Ok(())
    }

    fn teardown(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            bail!("enricher torn down without setup");
        };
        debug!(
            component = "enricher",
            processed = session.processed,
            alive_ms = session.opened_at.elapsed().as_millis() as u64,
            "session closed"
        );
        Ok(())
    }
}
