// Configuration loading and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const PROD: &str = "prod";
pub const DEV: &str = "dev";
pub const TEST: &str = "test";

const DEFAULT_ELEMENTS: u64 = 100_000;
const DEFAULT_BUNDLE_SIZE: u64 = 1_000;
const DEFAULT_GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Runner {
    #[serde(rename = "runner")]
    pub runner: RunnerBox,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerBox {
    pub env: String,
    pub logs: Option<Logs>,
    pub runtime: Option<Runtime>,
    pub pipeline: Option<Pipeline>,
    pub shutdown: Option<Shutdown>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Runtime {
    /// Number of worker threads; 0 means one per available core.
    pub workers: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Pipeline {
    pub name: Option<String>,
    pub elements: Option<u64>,
    #[serde(rename = "bundle_size")]
    pub bundle_size: Option<u64>,
    /// Release a worker's function copy after every bundle instead of at end of run.
    #[serde(rename = "release_after_bundle", default)]
    pub release_after_bundle: bool,
    /// Fail every n-th element; 0 disables injection.
    #[serde(rename = "fail_every", default)]
    pub fail_every: u64,
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Shutdown {
    #[serde(rename = "graceful_timeout", with = "humantime_serde", default)]
    pub graceful_timeout: Option<Duration>,
}

// Config trait
pub trait ConfigTrait {
    fn logs(&self) -> Option<&Logs>;
    fn is_prod(&self) -> bool;
    #[allow(dead_code)]
    fn is_test(&self) -> bool;
    fn num_workers(&self) -> usize;
    fn pipeline(&self) -> Option<&Pipeline>;
    fn pipeline_name(&self) -> &str;
    fn elements(&self) -> u64;
    fn bundle_size(&self) -> u64;
    fn graceful_timeout(&self) -> Duration;
}

// Config type alias for convenience
pub type Config = Runner;

impl ConfigTrait for Config {
    fn logs(&self) -> Option<&Logs> {
        self.runner.logs.as_ref()
    }

    fn is_prod(&self) -> bool {
        self.runner.env == PROD
    }

    fn is_test(&self) -> bool {
        self.runner.env == TEST
    }

    fn num_workers(&self) -> usize {
        match self.runner.runtime.as_ref().map(|r| r.workers) {
            Some(n) if n > 0 => n,
            _ => num_cpus::get(),
        }
    }

    fn pipeline(&self) -> Option<&Pipeline> {
        self.runner.pipeline.as_ref()
    }

    fn pipeline_name(&self) -> &str {
        self.pipeline()
            .and_then(|p| p.name.as_deref())
            .unwrap_or("pipeline")
    }

    fn elements(&self) -> u64 {
        self.pipeline()
            .and_then(|p| p.elements)
            .unwrap_or(DEFAULT_ELEMENTS)
    }

    fn bundle_size(&self) -> u64 {
        self.pipeline()
            .and_then(|p| p.bundle_size)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_BUNDLE_SIZE)
    }

    fn graceful_timeout(&self) -> Duration {
        self.runner
            .shutdown
            .as_ref()
            .and_then(|s| s.graceful_timeout)
            .unwrap_or(DEFAULT_GRACEFUL_TIMEOUT)
    }
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let abs_path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve absolute config filepath: {:?}", path))?;

        let data = std::fs::read_to_string(&abs_path)
            .with_context(|| format!("read config yaml file {:?}", abs_path))?;

        Self::parse(&data).with_context(|| format!("unmarshal yaml from {:?}", abs_path))
    }

    /// Loads the first candidate file that exists. A candidate that exists but fails to
    /// load or validate is an error, never skipped. `None` means no candidate exists.
    pub fn load_first<P: AsRef<Path>>(candidates: &[P]) -> Result<Option<(Self, PathBuf)>> {
        for candidate in candidates {
            let path = candidate.as_ref();
            if !path.exists() {
                continue;
            }
            let cfg = Self::load(path)
                .with_context(|| format!("failed to load config from {:?}", path))?;
            return Ok(Some((cfg, path.to_path_buf())));
        }
        Ok(None)
    }

    /// Parses and validates a YAML document.
    pub fn parse(data: &str) -> Result<Self> {
        let cfg: Runner = serde_yaml::from_str(data)?;

        if let Some(pipeline) = cfg.pipeline() {
            if pipeline.bundle_size == Some(0) {
                anyhow::bail!("pipeline.bundle_size must be positive");
            }
        }

        Ok(cfg)
    }

    /// Configuration used when no file is found.
    pub fn defaults() -> Self {
        Runner {
            runner: RunnerBox {
                env: DEV.to_string(),
                logs: Some(Logs {
                    level: Some("info".to_string()),
                }),
                runtime: Some(Runtime { workers: 0 }),
                pipeline: None,
                shutdown: None,
            },
        }
    }
}

// Test config is always available for integration tests
mod test_config;
#[allow(dead_code)]
pub use test_config::new_test_config;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_document() {
        let cfg = Config::parse(
            r#"
runner:
  env: prod
  logs:
    level: warn
  runtime:
    workers: 3
  pipeline:
    name: enrich
    elements: 500
    bundle_size: 50
    release_after_bundle: true
    fail_every: 7
    prefix: "id-"
  shutdown:
    graceful_timeout: 1m 30s
"#,
        )
        .unwrap();

        assert!(cfg.is_prod());
        assert_eq!(cfg.logs().and_then(|l| l.level.as_deref()), Some("warn"));
        assert_eq!(cfg.num_workers(), 3);
        assert_eq!(cfg.pipeline_name(), "enrich");
        assert_eq!(cfg.elements(), 500);
        assert_eq!(cfg.bundle_size(), 50);
        let pipeline = cfg.pipeline().unwrap();
        assert!(pipeline.release_after_bundle);
        assert_eq!(pipeline.fail_every, 7);
        assert_eq!(cfg.graceful_timeout(), Duration::from_secs(90));
    }

    #[test]
    fn test_parse_minimal_document_uses_defaults() {
        let cfg = Config::parse("runner:\n  env: dev\n").unwrap();

        assert!(!cfg.is_prod());
        assert_eq!(cfg.num_workers(), num_cpus::get());
        assert_eq!(cfg.pipeline_name(), "pipeline");
        assert_eq!(cfg.elements(), DEFAULT_ELEMENTS);
        assert_eq!(cfg.bundle_size(), DEFAULT_BUNDLE_SIZE);
        assert_eq!(cfg.graceful_timeout(), DEFAULT_GRACEFUL_TIMEOUT);
    }

    #[test]
    fn test_parse_rejects_zero_bundle_size() {
        let err = Config::parse("runner:\n  env: dev\n  pipeline:\n    bundle_size: 0\n");
        assert!(err.is_err());
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(Config::load("cfg/does-not-exist.yaml").is_err());
    }

    fn scratch_file(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("fnlife-{}-{}", std::process::id(), name));
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_first_skips_missing_candidates() {
        let present = scratch_file("present.yaml", "runner:\n  env: prod\n");
        let missing = std::env::temp_dir().join("fnlife-never-written.yaml");

        let (cfg, source) = Config::load_first(&[&missing, &present]).unwrap().unwrap();

        assert!(cfg.is_prod());
        assert_eq!(source, present);
        std::fs::remove_file(&present).unwrap();
    }

    #[test]
    fn test_load_first_without_candidates_on_disk_is_none() {
        let missing = std::env::temp_dir().join("fnlife-never-written.yaml");
        assert!(Config::load_first(&[&missing]).unwrap().is_none());
    }

    #[test]
    fn test_load_first_stops_on_invalid_existing_file() {
        let invalid = scratch_file(
            "invalid.yaml",
            "runner:\n  env: prod\n  pipeline:\n    bundle_size: 0\n",
        );
        let valid = scratch_file("valid.yaml", "runner:\n  env: dev\n");

        let err = Config::load_first(&[&invalid, &valid]).unwrap_err();

        assert!(format!("{:#}", err).contains("bundle_size must be positive"));
        std::fs::remove_file(&invalid).unwrap();
        std::fs::remove_file(&valid).unwrap();
    }

    #[test]
    fn test_shipped_config_parses() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/cfg/fnlife.cfg.yaml");
        let cfg = Config::load(path).unwrap();
        assert!(cfg.elements() > 0);
    }
}
