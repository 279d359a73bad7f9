//! Hostcast - Entry point.
//!
//! This binary loads the inventory, publishes it as a registry snapshot, keeps
//! it fresh in the background and answers multicast DNS queries for it.

use std::borrow::Cow;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use hostcast::config::Config;
use hostcast::inventory::{ConfiguredInventory, RegistryRefresher, run_refresh};
use hostcast::registry::SnapshotStore;
use hostcast::server::{Responder, StopReason};

/// Spawn the background refresh task.
fn spawn_refresh_task(
    refresher: Arc<RegistryRefresher<ConfiguredInventory>>,
    config: &Config,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let interval = config.refresh_interval();
    let retry = config.retry_interval();
    tokio::spawn(async move {
        run_refresh(&refresher, interval, retry, cancel).await;
    })
}

/// Wait for Ctrl-C or for the responder to stop on its own.
async fn wait_for_shutdown(
    cancel: CancellationToken,
    mut responder_handle: JoinHandle<hostcast::Result<StopReason>>,
    refresh_handle: JoinHandle<()>,
) {
    let finished = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down...");
            None
        }
        result = &mut responder_handle => Some(result),
    };

    cancel.cancel();

    let result = match finished {
        Some(result) => result,
        None => responder_handle.await,
    };
    match result {
        Ok(Ok(reason)) => info!(reason = ?reason, "responder exited"),
        Ok(Err(err)) => error!("Responder failed to shut down cleanly: {err}"),
        Err(err) => error!("Responder task failed: {err}"),
    }

    let _ = refresh_handle.await;
    info!("Shutdown complete.");
}

async fn run() -> Result<()> {
    let config_path = std::env::var("CONFIG_PATH")
        .map(Cow::Owned)
        .unwrap_or(Cow::Borrowed("config.toml"));
    let config = Config::load(config_path.as_ref()).context("Failed to load configuration")?;

    // Initialize metrics (must be done early, before any metrics are recorded)
    hostcast::metrics::init(&config.metrics).context("Failed to initialize metrics")?;
    if config.metrics.enabled {
        info!("Metrics enabled on {}", config.metrics.listen);
    }

    info!("Starting Hostcast mDNS responder...");
    info!("Inventory sources configured: {}", config.inventory.len());

    let inventory = ConfiguredInventory::from_config(&config.inventory)
        .context("Failed to create inventory sources")?;
    let store = SnapshotStore::new();
    let refresher = Arc::new(RegistryRefresher::new(inventory, store.clone()));

    // Serving an empty registry beats not serving at all.
    match refresher.refresh().await {
        Ok(count) => info!("Registry initialized with {count} records"),
        Err(err) => warn!("Initial inventory fetch failed, starting empty: {err}"),
    }

    let status = refresher.status();
    debug!(
        generation = ?status.generation,
        records = status.record_count,
        last_error = ?status.last_error,
        "registry status"
    );

    let cancel = CancellationToken::new();

    let responder = Responder::bind(&config, store, cancel.child_token())
        .context("Failed to set up multicast socket")?;
    info!(
        "Answering on {} for group {} via {}",
        config.listen_addr(),
        config.group,
        config.interface
    );

    let refresh_handle = spawn_refresh_task(Arc::clone(&refresher), &config, cancel.clone());
    let responder_handle = tokio::spawn(responder.run());

    wait_for_shutdown(cancel, responder_handle, refresh_handle).await;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hostcast=info")),
        )
        .init();
    run().await
}
