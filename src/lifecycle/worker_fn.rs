// Package lifecycle provides the capability every managed worker function implements.

/// Stateful processing unit that is not safe for concurrent use.
///
/// The manager hands every worker its own copy. `setup` runs once on a fresh copy before
/// the copy is first handed out; `teardown` runs once when the copy is discarded.
/// Both hooks default to no-ops.
pub trait WorkerFn: Send + 'static {
    fn setup(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn teardown(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
