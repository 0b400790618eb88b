use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use resc_core::app::{WorkerBuilder, WorkerGroup};
use resc_core::config::WorkerConfig;
use resc_core::impls::{RedisQueueStore, SimulatedWorkExecutor};

/// Input queue used when no config file is given.
const DEFAULT_INPUT_QUEUE: &str = "trt/plantA/todo";

/// Set to `json` for JSON log lines.
const LOG_FORMAT_ENV: &str = "RESC_LOG_FORMAT";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = if std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v == "json") {
        builder.json().with_target(false).try_init()
    } else {
        builder.try_init()
    };
}

/// usage: resc-worker [config.json]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // (A) config: file if given, defaults otherwise, env on top
    let config = match std::env::args().nth(1) {
        Some(path) => WorkerConfig::from_file(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => WorkerConfig::new(DEFAULT_INPUT_QUEUE),
    }
    .with_env_overrides();
    info!("----- starting resc worker -----");

    // (B) store + stub executor
    let store = RedisQueueStore::connect(&config.redis_url, config.pending_set_kind)
        .await
        .with_context(|| format!("connecting to {}", config.redis_url))?;
    let executor = Arc::new(SimulatedWorkExecutor::new(&config.simulated_work));

    // (C) one worker, recovery first, then listen until Ctrl-C
    let worker = WorkerBuilder::new(config)
        .store(Arc::new(store))
        .executor(executor)
        .build()?;
    let group = WorkerGroup::spawn(vec![worker]);

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested, finishing the current task");
    for counts in group.shutdown_and_join().await {
        info!(?counts, "worker stopped");
    }
    Ok(())
}
