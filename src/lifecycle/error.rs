//! Error types for the lifecycle manager.

use super::worker::WorkerId;

/// Failure to produce an independent copy of the original worker function.
#[derive(Debug, thiserror::Error)]
pub enum CloneError {
    #[error("encode original: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("decode copy: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

impl CloneError {
    /// Builds a free-form clone error, used by custom templates.
    pub fn msg(msg: impl Into<String>) -> Self {
        CloneError::Other(msg.into())
    }
}

/// Errors surfaced by `LifecycleManager`.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Original cannot be copied. Nothing was registered.
    #[error("{name}: failed to copy worker function for {worker}")]
    Clone {
        name: String,
        worker: WorkerId,
        #[source]
        source: CloneError,
    },

    /// The setup hook failed. The copy was discarded; a later `get` retries.
    #[error("{name}: setup failed for {worker} (instance #{instance})")]
    Setup {
        name: String,
        worker: WorkerId,
        instance: u64,
        #[source]
        source: anyhow::Error,
    },

    /// The teardown hook failed. The copy is unregistered regardless.
    #[error("{name}: teardown failed for {worker} (instance #{instance})")]
    Teardown {
        name: String,
        worker: WorkerId,
        instance: u64,
        #[source]
        source: anyhow::Error,
    },
}

impl LifecycleError {
    /// Worker the failure belongs to.
    pub fn worker(&self) -> &WorkerId {
        match self {
            LifecycleError::Clone { worker, .. }
            | LifecycleError::Setup { worker, .. }
            | LifecycleError::Teardown { worker, .. } => worker,
        }
    }

    pub fn is_clone(&self) -> bool {
        matches!(self, LifecycleError::Clone { .. })
    }

    pub fn is_setup(&self) -> bool {
        matches!(self, LifecycleError::Setup { .. })
    }

    pub fn is_teardown(&self) -> bool {
        matches!(self, LifecycleError::Teardown { .. })
    }
}

/// Non-empty set of teardown failures collected while draining one or more managers.
#[derive(Debug, thiserror::Error)]
#[error("{} teardown(s) failed", .errors.len())]
pub struct TeardownErrors {
    errors: Vec<LifecycleError>,
}

impl TeardownErrors {
    /// Wraps collected errors. Returns `Ok(())` when there are none.
    pub fn into_result(errors: Vec<LifecycleError>) -> Result<(), TeardownErrors> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(TeardownErrors { errors })
        }
    }

    pub fn errors(&self) -> &[LifecycleError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn into_inner(self) -> Vec<LifecycleError> {
        self.errors
    }
}
