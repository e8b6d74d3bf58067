// Package lifecycle provides the handle to a single per-worker copy.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::worker::WorkerId;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a process-unique instance id.
pub(crate) fn next_id() -> u64 {
    NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed)
}

struct Shared<F> {
    id: u64,
    worker: WorkerId,
    live: AtomicBool,
    func: Mutex<F>,
}

/// Shared handle to a worker's private copy of the function.
///
/// Cloning the handle does not copy the function. Two handles refer to the same copy
/// iff their ids are equal.
pub struct Instance<F> {
    inner: Arc<Shared<F>>,
}

impl<F> Instance<F> {
    pub(crate) fn new(id: u64, worker: WorkerId, func: F) -> Self {
        Self {
            inner: Arc::new(Shared {
                id,
                worker,
                live: AtomicBool::new(true),
                func: Mutex::new(func),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Worker this copy is bound to.
    pub fn worker(&self) -> &WorkerId {
        &self.inner.worker
    }

    /// False once the copy has been claimed for teardown.
    pub fn is_live(&self) -> bool {
        self.inner.live.load(Ordering::Acquire)
    }

    /// Runs `f` with exclusive access to the copy. Must not call back into the manager for
    /// this worker's release from inside `f`.
    pub fn with<R>(&self, f: impl FnOnce(&mut F) -> R) -> R {
        let mut guard = self.inner.func.lock();
        f(&mut *guard)
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub(crate) fn retire(&self) {
        self.inner.live.store(false, Ordering::Release);
    }
}

impl<F> Clone for Instance<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F> fmt::Debug for Instance<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.inner.id)
            .field("worker", &self.inner.worker)
            .field("live", &self.is_live())
            .finish()
    }
}
