// Package lifecycle provides telemetry for lifecycle managers.

use super::counters::CountersSnapshot;

/// Emits one stats line for a manager.
pub fn log_stats(name: &str, registered: usize, stats: &CountersSnapshot) {
    tracing::info!(
        component = "lifecycle",
        name = %name,
        registered = registered,
        copies = stats.copies,
        clone_failures = stats.clone_failures,
        setups = stats.setups,
        setup_failures = stats.setup_failures,
        teardowns = stats.teardowns,
        teardown_failures = stats.teardown_failures,
        "lifecycle manager stats"
    );
}
