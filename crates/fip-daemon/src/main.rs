mod input;
mod output;

use fip_engine::{EngineOptions, StateEngine, StaticCatalog};
use fip_proto::config::Config;
use fip_proto::store::JsonFileStore;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    // Stdout carries the state stream, so logs only go to the file.
    let log_path = config.daemon.log_file.clone();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,fip_engine=debug,fip_daemon=debug")
            }),
        )
        .init();

    info!("Log file: {:?}", log_path);
    info!("Config loaded from: {:?}", Config::config_path());

    let store = Arc::new(JsonFileStore::open(config.daemon.store_file.clone()));
    info!("Store file: {:?}", store.path());

    let catalog = Arc::new(StaticCatalog::new(config.catalog.entries.clone()));

    let credential = config.remote.credential();
    if credential.is_some() {
        warn!("[remote] credential configured but no remote account client is built in");
    }

    let (demux, channels, commands) = input::feeds(&config.channels.names);
    let updates = StateEngine::new(EngineOptions::from(&config), catalog, store)
        .spawn(credential, channels, commands);

    let reader = tokio::spawn(input::pump(BufReader::new(tokio::io::stdin()), demux));

    output::write_updates(updates, tokio::io::stdout()).await?;

    match reader.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("stdin reader failed: {:#}", e),
        Err(e) => error!("stdin reader panicked: {}", e),
    }

    info!("Daemon exiting");
    Ok(())
}
