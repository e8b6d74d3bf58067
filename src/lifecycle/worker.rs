// Package lifecycle provides worker identities used as registry keys.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Opaque identity of the worker that calls into a `LifecycleManager`.
///
/// In practice this is the current thread. Named identities exist for callers that
/// multiplex logical workers over threads, and for tests.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum WorkerId {
    Thread(ThreadId),
    Named(Arc<str>),
}

impl WorkerId {
    /// Identity of the calling thread.
    pub fn current() -> Self {
        WorkerId::Thread(thread::current().id())
    }

    pub fn named(name: impl Into<Arc<str>>) -> Self {
        WorkerId::Named(name.into())
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerId::Thread(id) => write!(f, "thread {:?}", id),
            WorkerId::Named(name) => write!(f, "worker {}", name),
        }
    }
}

impl fmt::Debug for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<&str> for WorkerId {
    fn from(name: &str) -> Self {
        WorkerId::named(name)
    }
}

impl From<String> for WorkerId {
    fn from(name: String) -> Self {
        WorkerId::named(name)
    }
}

impl From<ThreadId> for WorkerId {
    fn from(id: ThreadId) -> Self {
        WorkerId::Thread(id)
    }
}
