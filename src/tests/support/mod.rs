//! Shared helpers for lifecycle tests.

pub mod recording;

pub use recording::{Probe, RecordingFn};

use crate::lifecycle::{LifecycleManager, WorkerId};
use std::sync::Arc;

/// Manager over `RecordingFn` copies that all report to `probe`.
pub fn recording_manager(probe: &Arc<Probe>) -> LifecycleManager<RecordingFn> {
    LifecycleManager::from_clone(RecordingFn::new(probe.clone())).with_name("recording")
}

pub fn w(name: &str) -> WorkerId {
    WorkerId::named(name)
}
