//! Lifecycle management for non-thread-safe worker functions.

pub mod counters;
pub mod drain;
pub mod error;
pub mod instance;
pub mod manager;
pub mod telemetry;
pub mod template;
pub mod worker;
pub mod worker_fn;

#[cfg(test)]
mod template_test;

// Re-export main types
pub use counters::{Counters, CountersSnapshot};
pub use drain::{release_all_from, ReleaseAll};
pub use error::{CloneError, LifecycleError, TeardownErrors};
pub use instance::Instance;
pub use manager::LifecycleManager;
pub use template::{CloneTemplate, FnTemplate, SerializedTemplate, Template};
pub use worker::WorkerId;
pub use worker_fn::WorkerFn;
