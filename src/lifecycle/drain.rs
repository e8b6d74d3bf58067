// Package lifecycle provides end-of-run draining across several managers.

use tracing::{error, info};

use super::error::{LifecycleError, TeardownErrors};
use super::manager::LifecycleManager;
use super::worker_fn::WorkerFn;

/// Object-safe view of a manager for end-of-run draining. Lets managers of different
/// worker function types be drained together.
pub trait ReleaseAll: Send + Sync {
    fn name(&self) -> &str;
    fn release_all(&self) -> Vec<LifecycleError>;
}

impl<F: WorkerFn> ReleaseAll for LifecycleManager<F> {
    fn name(&self) -> &str {
        LifecycleManager::name(self)
    }

    fn release_all(&self) -> Vec<LifecycleError> {
        LifecycleManager::release_all(self)
    }
}

/// Drains every manager, even when earlier ones report failures, and fails if any
/// teardown failed.
pub fn release_all_from<'a, I>(managers: I) -> Result<(), TeardownErrors>
where
    I: IntoIterator<Item = &'a dyn ReleaseAll>,
{
    let mut thrown = Vec::new();
    let mut drained = 0usize;
    for manager in managers {
        let errors = manager.release_all();
        if !errors.is_empty() {
            error!(
                component = "lifecycle",
                event = "drain_failed",
                name = %manager.name(),
                failed = errors.len(),
                "manager drained with teardown failures"
            );
        }
        thrown.extend(errors);
        drained += 1;
    }
    info!(
        component = "lifecycle",
        event = "drained",
        managers = drained,
        failed = thrown.len(),
        "all managers drained"
    );
    TeardownErrors::into_result(thrown)
}
