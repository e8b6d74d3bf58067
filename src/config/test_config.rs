use super::{Config, Logs, Pipeline, RunnerBox, Runtime, Shutdown};
use std::time::Duration;

/// Creates a new test configuration.
pub fn new_test_config() -> Config {
    Config {
        runner: RunnerBox {
            env: super::TEST.to_string(),
            logs: Some(Logs {
                level: Some("debug".to_string()),
            }),
            runtime: Some(Runtime { workers: 4 }),
            pipeline: Some(Pipeline {
                name: Some("test-pipeline".to_string()),
                elements: Some(10_000),
                bundle_size: Some(100),
                release_after_bundle: false,
                fail_every: 0,
                prefix: Some("el-".to_string()),
            }),
            shutdown: Some(Shutdown {
                graceful_timeout: Some(Duration::from_secs(5)),
            }),
        },
    }
}
