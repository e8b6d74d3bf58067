//! Per-worker lifecycle manager.
//!
//! Keeps one private copy of a worker function per worker. A copy is produced from the
//! template and set up on the first `get` for a worker, handed back unchanged on later
//! calls, and torn down exactly once when the worker is released or the manager is drained.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::mem;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::counters::{Counters, CountersSnapshot};
use super::error::{CloneError, LifecycleError};
use super::instance::{self, Instance};
use super::telemetry;
use super::template::{CloneTemplate, SerializedTemplate, Template};
use super::worker::WorkerId;
use super::worker_fn::WorkerFn;

enum SlotState<F> {
    /// Registered but not populated yet.
    Vacant,
    Live(Instance<F>),
    /// Removed from the map. Never populated again.
    Retired,
}

/// Per-worker cell. Population and retirement of one worker serialize on `state`;
/// distinct workers never share a slot lock.
struct Slot<F> {
    state: Mutex<SlotState<F>>,
}

impl<F> Slot<F> {
    fn vacant() -> Self {
        Self {
            state: Mutex::new(SlotState::Vacant),
        }
    }

    /// Marks the slot retired and hands out its instance, if it had one.
    /// Waits for an in-flight population of the same worker to finish.
    fn retire(&self) -> Option<Instance<F>> {
        let mut state = self.state.lock();
        match mem::replace(&mut *state, SlotState::Retired) {
            SlotState::Live(instance) => Some(instance),
            SlotState::Vacant | SlotState::Retired => None,
        }
    }
}

/// Lifecycle manager for one worker function template.
pub struct LifecycleManager<F: WorkerFn> {
    name: String,
    template: Box<dyn Template<F>>,
    outstanding: DashMap<WorkerId, Arc<Slot<F>>>,
    counters: Counters,
}

impl<F> LifecycleManager<F>
where
    F: WorkerFn + Serialize + DeserializeOwned,
{
    /// Builds a manager that deep-copies `original` through serialization.
    /// Fails if `original` cannot be serialized and read back.
    pub fn of(original: F) -> Result<Self, CloneError> {
        let template = SerializedTemplate::new(&original)?;
        Ok(Self::with_template(template))
    }
}

impl<F> LifecycleManager<F>
where
    F: WorkerFn + Clone + Sync,
{
    /// Builds a manager that copies `original` through `Clone`.
    pub fn from_clone(original: F) -> Self {
        Self::with_template(CloneTemplate::new(original))
    }
}

impl<F: WorkerFn> LifecycleManager<F> {
    pub fn with_template(template: impl Template<F> + 'static) -> Self {
        Self {
            name: std::any::type_name::<F>().to_string(),
            template: Box::new(template),
            outstanding: DashMap::new(),
            counters: Counters::new(),
        }
    }

    /// Sets the label used in logs and errors.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the worker's copy, creating and setting it up on first use.
    pub fn get(&self, worker: &WorkerId) -> Result<Instance<F>, LifecycleError> {
        loop {
            let slot = self.slot(worker);
            let mut state = slot.state.lock();
            let retired = match &*state {
                SlotState::Live(instance) => return Ok(instance.clone()),
                SlotState::Vacant => false,
                SlotState::Retired => true,
            };
            if retired {
                // Lost a race with release or a failed setup; start over on a fresh slot.
                drop(state);
                self.outstanding
                    .remove_if(worker, |_, current| Arc::ptr_eq(current, &slot));
                continue;
            }

            match self.create(worker) {
                Ok(instance) => {
                    *state = SlotState::Live(instance.clone());
                    return Ok(instance);
                }
                Err(err) => {
                    *state = SlotState::Retired;
                    drop(state);
                    self.outstanding
                        .remove_if(worker, |_, current| Arc::ptr_eq(current, &slot));
                    return Err(err);
                }
            }
        }
    }

    /// Returns the worker's copy only if one is registered and set up.
    pub fn peek(&self, worker: &WorkerId) -> Option<Instance<F>> {
        let slot = self.outstanding.get(worker)?.value().clone();
        let state = slot.state.lock();
        match &*state {
            SlotState::Live(instance) => Some(instance.clone()),
            SlotState::Vacant | SlotState::Retired => None,
        }
    }

    /// Unregisters the worker's copy and tears it down.
    /// A worker without a copy is a no-op.
    pub fn release(&self, worker: &WorkerId) -> Result<(), LifecycleError> {
        let Some((_, slot)) = self.outstanding.remove(worker) else {
            return Ok(());
        };
        match slot.retire() {
            Some(instance) => self.teardown(instance),
            None => Ok(()),
        }
    }

    /// Tears down every registered copy. Each copy gets exactly one attempt; failures are
    /// collected in order and never stop the drain.
    ///
    /// A non-empty result means the run must be treated as failed.
    pub fn release_all(&self) -> Vec<LifecycleError> {
        let workers: Vec<WorkerId> = self
            .outstanding
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let mut thrown = Vec::new();
        for worker in workers {
            let Some((_, slot)) = self.outstanding.remove(&worker) else {
                continue;
            };
            if let Some(instance) = slot.retire() {
                if let Err(err) = self.teardown(instance) {
                    thrown.push(err);
                }
            }
        }

        if !thrown.is_empty() {
            warn!(
                component = "lifecycle",
                event = "release_all_failed",
                name = %self.name,
                failed = thrown.len(),
                "not all worker functions were torn down cleanly"
            );
        }
        thrown
    }

    /// Runs `f` against the worker's copy. When `f` fails the copy is released so a
    /// broken copy is never reused; a teardown failure at that point is logged and the
    /// processing error is returned.
    pub fn process<R, E>(
        &self,
        worker: &WorkerId,
        f: impl FnOnce(&mut F) -> Result<R, E>,
    ) -> anyhow::Result<R>
    where
        E: Into<anyhow::Error>,
    {
        let instance = self.get(worker)?;
        let result = instance.with(f);
        match result {
            Ok(out) => Ok(out),
            Err(err) => {
                let err: anyhow::Error = err.into();
                debug!(
                    component = "lifecycle",
                    event = "process_failed",
                    name = %self.name,
                    worker = %worker,
                    instance = instance.id(),
                    error = %err,
                    "discarding worker function after failure"
                );
                drop(instance);
                if let Err(teardown_err) = self.release(worker) {
                    error!(
                        component = "lifecycle",
                        event = "teardown_after_failure",
                        name = %self.name,
                        worker = %worker,
                        error = ?teardown_err,
                        "teardown after processing failure failed"
                    );
                }
                Err(err)
            }
        }
    }

    /// Number of registered workers, including ones whose copy is being set up.
    pub fn len(&self) -> usize {
        self.outstanding.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outstanding.is_empty()
    }

    pub fn contains(&self, worker: &WorkerId) -> bool {
        self.outstanding.contains_key(worker)
    }

    pub fn workers(&self) -> Vec<WorkerId> {
        self.outstanding
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn counters(&self) -> CountersSnapshot {
        self.counters.snapshot()
    }

    /// Logs the current counters.
    pub fn log_stats(&self) {
        telemetry::log_stats(&self.name, self.len(), &self.counters.snapshot());
    }

    /// Returns the worker's slot, registering a vacant one on miss. No map lock is held
    /// once this returns.
    fn slot(&self, worker: &WorkerId) -> Arc<Slot<F>> {
        if let Some(slot) = self.outstanding.get(worker) {
            return Arc::clone(slot.value());
        }
        let slot = Arc::clone(
            self.outstanding
                .entry(worker.clone())
                .or_insert_with(|| Arc::new(Slot::vacant()))
                .value(),
        );
        slot
    }

    /// Copies the template and runs setup. Called with the worker's slot locked.
    fn create(&self, worker: &WorkerId) -> Result<Instance<F>, LifecycleError> {
        let mut func = self.template.replicate().map_err(|source| {
            Counters::inc(&self.counters.clone_failures);
            error!(
                component = "lifecycle",
                event = "clone_failed",
                name = %self.name,
                worker = %worker,
                error = %source,
                "failed to copy worker function"
            );
            LifecycleError::Clone {
                name: self.name.clone(),
                worker: worker.clone(),
                source,
            }
        })?;
        Counters::inc(&self.counters.copies);

        let id = instance::next_id();
        if let Err(source) = func.setup() {
            Counters::inc(&self.counters.setup_failures);
            warn!(
                component = "lifecycle",
                event = "setup_failed",
                name = %self.name,
                worker = %worker,
                instance = id,
                error = %source,
                "setup failed, copy discarded"
            );
            return Err(LifecycleError::Setup {
                name: self.name.clone(),
                worker: worker.clone(),
                instance: id,
                source,
            });
        }
        Counters::inc(&self.counters.setups);

        debug!(
            component = "lifecycle",
            event = "setup",
            name = %self.name,
            worker = %worker,
            instance = id,
            "worker function set up"
        );
        Ok(Instance::new(id, worker.clone(), func))
    }

    /// Runs teardown on an instance already removed from the map.
    fn teardown(&self, instance: Instance<F>) -> Result<(), LifecycleError> {
        instance.retire();
        let result = instance.with(|func| func.teardown());
        Counters::inc(&self.counters.teardowns);

        match result {
            Ok(()) => {
                debug!(
                    component = "lifecycle",
                    event = "teardown",
                    name = %self.name,
                    worker = %instance.worker(),
                    instance = instance.id(),
                    "worker function torn down"
                );
                Ok(())
            }
            Err(source) => {
                Counters::inc(&self.counters.teardown_failures);
                error!(
                    component = "lifecycle",
                    event = "teardown_failed",
                    name = %self.name,
                    worker = %instance.worker(),
                    instance = instance.id(),
                    error = %source,
                    "teardown failed"
                );
                Err(LifecycleError::Teardown {
                    name: self.name.clone(),
                    worker: instance.worker().clone(),
                    instance: instance.id(),
                    source,
                })
            }
        }
    }
}
