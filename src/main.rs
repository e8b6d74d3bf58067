// Main entrypoint for the fnlife direct runner.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use fnlife::config::{Config, ConfigTrait};
use fnlife::runner;
use fnlife::shutdown::GracefulShutdown;

const CONFIG_PATH: &str = "cfg/fnlife.cfg.yaml";
const CONFIG_PATH_LOCAL: &str = "cfg/fnlife.cfg.local.yaml";

/// fnlife - runs a demo pipeline over per-worker function copies
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, value_name = "FILE")]
    cfg: Option<PathBuf>,
}

/// Loads the configuration struct from YAML file.
/// Tries local config first, then the default config, then built-in defaults. A config
/// file that exists but does not load stops the binary.
fn load_cfg(path: Option<PathBuf>) -> Result<(Config, String)> {
    if let Some(custom_path) = path {
        let cfg = Config::load(&custom_path)
            .with_context(|| format!("failed to load custom config from {:?}", custom_path))?;
        return Ok((cfg, custom_path.display().to_string()));
    }

    match Config::load_first(&[CONFIG_PATH_LOCAL, CONFIG_PATH])? {
        Some((cfg, path)) => Ok((cfg, path.display().to_string())),
        None => Ok((Config::defaults(), "<defaults>".to_string())),
    }
}

/// Configures structured logging based on configuration.
fn configure_logger(cfg: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let log_level = cfg
        .logs()
        .and_then(|logs| logs.level.as_ref())
        .map(|s| s.as_str())
        .unwrap_or("info");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if cfg.is_prod() {
        // Production: JSON format
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        // Development: Pretty console format
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (cfg, source) = load_cfg(args.cfg)?;
    configure_logger(&cfg);
    info!(
        component = "config",
        event = "load_success",
        path = %source,
        "config loaded"
    );

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .max_blocking_threads(cfg.num_workers().max(1) + 16)
        .build()
        .context("Failed to create tokio runtime")?
        .block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<()> {
    let shutdown_token = CancellationToken::new();

    let graceful_shutdown = GracefulShutdown::new(shutdown_token.clone());
    graceful_shutdown
        .set_graceful_timeout(cfg.graceful_timeout())
        .await;
    graceful_shutdown.add(1);

    let manager = runner::new_manager(&cfg)?;
    let run_manager = manager.clone();
    let run_token = shutdown_token.clone();
    let run_done = graceful_shutdown.clone();
    let run = tokio::task::spawn(async move {
        let result = runner::run_with(run_manager, &cfg, run_token.clone()).await;
        run_done.done();
        // Finishing the run is itself a shutdown trigger.
        run_token.cancel();
        result
    });

    if let Err(e) = graceful_shutdown.await_shutdown().await {
        error!(
            component = "main",
            scope = "runner",
            event = "graceful_shutdown_failed",
            error = %e,
            "failed to gracefully shut down runner"
        );
        run.abort();
        if let Err(teardown_err) = runner::teardown_abandoned(&manager) {
            error!(
                component = "main",
                scope = "runner",
                event = "teardown_failed",
                error = %teardown_err,
                "worker functions were not torn down cleanly"
            );
        }
        return Err(e);
    }

    let summary = run.await.context("runner task panicked")??;
    info!(
        component = "main",
        event = "done",
        bundles = summary.bundles,
        failed_bundles = summary.failed_bundles,
        elements = summary.elements,
        cancelled = summary.cancelled,
        "run complete"
    );
    if summary.failed_bundles > 0 {
        anyhow::bail!("{} bundle(s) failed", summary.failed_bundles);
    }
    Ok(())
}
