// Package runner drives a pipeline of synthetic bundles through a lifecycle manager.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{Config, ConfigTrait};
use crate::lifecycle::{
    release_all_from, LifecycleError, LifecycleManager, ReleaseAll, TeardownErrors, WorkerId,
};

use super::enricher::Enricher;

/// Outcome of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub workers: usize,
    pub bundles: u64,
    pub failed_bundles: u64,
    pub elements: u64,
    pub output_bytes: u64,
    pub setups: i64,
    pub teardowns: i64,
    /// True when the run stopped before every bundle was claimed.
    pub cancelled: bool,
}

#[derive(Default)]
struct Progress {
    bundles: AtomicU64,
    failed_bundles: AtomicU64,
    elements: AtomicU64,
    output_bytes: AtomicU64,
}

/// Builds the manager for the configured enricher.
pub fn new_manager(cfg: &Config) -> Result<Arc<LifecycleManager<Enricher>>> {
    let pipeline = cfg.pipeline();
    let original = Enricher::new(
        pipeline.and_then(|p| p.prefix.clone()).unwrap_or_default(),
        pipeline.map(|p| p.fail_every).unwrap_or(0),
    );
    Ok(Arc::new(
        LifecycleManager::of(original)
            .context("worker function cannot be copied")?
            .with_name(cfg.pipeline_name()),
    ))
}

/// Runs the configured pipeline to completion or until `token` is cancelled, then tears
/// down every worker's copy. Fails if any teardown failed.
pub async fn run(cfg: &Config, token: CancellationToken) -> Result<Summary> {
    run_with(new_manager(cfg)?, cfg, token).await
}

/// Same as [`run`] over a caller-owned manager, so the caller can still drain it if the
/// run is abandoned.
pub async fn run_with(
    manager: Arc<LifecycleManager<Enricher>>,
    cfg: &Config,
    token: CancellationToken,
) -> Result<Summary> {
    let release_after_bundle = cfg
        .pipeline()
        .map(|p| p.release_after_bundle)
        .unwrap_or(false);

    let elements = cfg.elements();
    let bundle_size = cfg.bundle_size();
    let workers = cfg.num_workers();
    let cursor = Arc::new(AtomicU64::new(0));
    let progress = Arc::new(Progress::default());
    let started = Instant::now();

    info!(
        component = "runner",
        event = "start",
        name = %manager.name(),
        workers,
        elements,
        bundle_size,
        release_after_bundle,
        "pipeline started"
    );

    let mut tasks = Vec::with_capacity(workers);
    for _ in 0..workers {
        let manager = manager.clone();
        let cursor = cursor.clone();
        let progress = progress.clone();
        let token = token.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            work(
                &manager,
                &cursor,
                &progress,
                &token,
                elements,
                bundle_size,
                release_after_bundle,
            )
        }));
    }

    let mut thrown: Vec<LifecycleError> = Vec::new();
    for task in tasks {
        thrown.extend(task.await.context("worker task panicked")?);
    }

    manager.log_stats();
    let drained = release_all_from([&*manager as &dyn ReleaseAll]);
    let counters = manager.counters();

    let summary = Summary {
        workers,
        bundles: progress.bundles.load(Ordering::Relaxed),
        failed_bundles: progress.failed_bundles.load(Ordering::Relaxed),
        elements: progress.elements.load(Ordering::Relaxed),
        output_bytes: progress.output_bytes.load(Ordering::Relaxed),
        setups: counters.setups,
        teardowns: counters.teardowns,
        cancelled: cursor.load(Ordering::Relaxed) < elements,
    };

    info!(
        component = "runner",
        event = "finish",
        name = %manager.name(),
        bundles = summary.bundles,
        failed_bundles = summary.failed_bundles,
        elements = summary.elements,
        setups = summary.setups,
        teardowns = summary.teardowns,
        cancelled = summary.cancelled,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "pipeline finished"
    );

    if let Err(err) = drained {
        thrown.extend(err.into_inner());
    }
    TeardownErrors::into_result(thrown)?;
    Ok(summary)
}

/// Tears down whatever copies are still registered after the run was given up on, e.g.
/// when graceful shutdown timed out. Workers still running may register new copies.
pub fn teardown_abandoned(manager: &LifecycleManager<Enricher>) -> Result<()> {
    let remaining = manager.len();
    let thrown = manager.release_all();
    error!(
        component = "runner",
        event = "teardown_abandoned",
        name = %manager.name(),
        remaining,
        failed = thrown.len(),
        "run abandoned, tore down remaining worker functions"
    );
    TeardownErrors::into_result(thrown)?;
    Ok(())
}

/// Claims bundles until the input is exhausted or the run is cancelled. Returns teardown
/// failures from per-bundle releases.
fn work(
    manager: &LifecycleManager<Enricher>,
    cursor: &AtomicU64,
    progress: &Progress,
    token: &CancellationToken,
    elements: u64,
    bundle_size: u64,
    release_after_bundle: bool,
) -> Vec<LifecycleError> {
    let me = WorkerId::current();
    let mut thrown = Vec::new();

    while !token.is_cancelled() {
        let start = cursor.fetch_add(bundle_size, Ordering::Relaxed);
        if start >= elements {
            break;
        }
        let end = (start + bundle_size).min(elements);

        let result = manager.process(&me, |enricher| {
            let mut bytes = 0u64;
            for element in start..end {
                bytes += enricher.process(element)? as u64;
            }
            Ok::<_, anyhow::Error>(bytes)
        });

        progress.bundles.fetch_add(1, Ordering::Relaxed);
        match result {
            Ok(bytes) => {
                progress.elements.fetch_add(end - start, Ordering::Relaxed);
                progress.output_bytes.fetch_add(bytes, Ordering::Relaxed);
            }
            Err(err) => {
                progress.failed_bundles.fetch_add(1, Ordering::Relaxed);
                warn!(
                    component = "runner",
                    event = "bundle_failed",
                    worker = %me,
                    start,
                    end,
                    error = %err,
                    "bundle failed"
                );
            }
        }

        if release_after_bundle {
            if let Err(err) = manager.release(&me) {
                thrown.push(err);
            }
        }
    }
    thrown
}
