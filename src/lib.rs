pub mod config;
pub mod counter;
pub mod engine;
pub mod error;
pub mod platform;
pub mod protocol;
pub mod server;
pub mod services;
pub mod store;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use engine::RuleEngine;
use platform::{Indicator, InMemoryRuleSink, LogIndicator, RuleSink};
use server::CommandServer;
use services::BackgroundServices;
use store::StateStore;

/// Run the daemon until the command server fails or ctrl-c arrives.
pub fn run() -> anyhow::Result<()> {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("PANIC in flowguard: {info}");
        default_hook(info);
    }));

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowguard=info".into()),
        )
        .init();

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(run_daemon())
}

async fn run_daemon() -> anyhow::Result<()> {
    let data_dir = data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

    let db_path = data_dir.join(config::STATE_DB_FILE);
    let store = Arc::new(StateStore::open(&db_path).context("failed to open state store")?);
    tracing::info!("State store opened at {}", db_path.display());

    let sink = Arc::new(InMemoryRuleSink::new());
    let engine = RuleEngine::new(
        Arc::clone(&sink) as Arc<dyn RuleSink>,
        Arc::clone(&store),
        Arc::new(LogIndicator) as Arc<dyn Indicator>,
    );

    BackgroundServices::start(&engine, &store, sink.as_ref()).await;

    let socket_path = socket_path(&data_dir);
    let server = CommandServer::bind(&socket_path, Arc::clone(&engine))
        .context("failed to bind command socket")?;

    tokio::select! {
        result = server.run() => {
            result.context("command server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl-C received, shutting down...");
        }
    }

    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}

fn data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(dir) = std::env::var(config::DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_local_dir()
        .map(|dir| dir.join("flowguard"))
        .context("could not resolve a data directory")
}

fn socket_path(data_dir: &Path) -> PathBuf {
    std::env::var(config::SOCKET_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_dir.join(config::COMMAND_SOCKET_FILE))
}
