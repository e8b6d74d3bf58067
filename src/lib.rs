//! fnlife: per-worker lifecycle management for worker functions that are not safe for
//! concurrent use.
//!
//! A [`lifecycle::LifecycleManager`] hands every worker its own deep copy of one original
//! function, runs its setup hook once before first use and its teardown hook once when
//! the copy is released or the manager is drained at the end of a run.

#[cfg(test)]
mod tests;

#[cfg(test)]
pub use tests::support;

pub mod config;
pub mod lifecycle;
pub mod runner;
pub mod shutdown;

pub use lifecycle::{
    release_all_from, CloneError, Instance, LifecycleError, LifecycleManager, ReleaseAll,
    TeardownErrors, Template, WorkerFn, WorkerId,
};
