// Direct runner used by the binary: drives a demo worker function over synthetic bundles.

pub mod enricher;
pub mod runner;


// Re-export main types
pub use enricher::Enricher;
pub use runner::{new_manager, run, run_with, teardown_abandoned, Summary};
