//! Registry refresh with hot-swap support.
//!
//! The refresher fetches the inventory, builds a new [`RegistrySnapshot`] and
//! installs it in the [`SnapshotStore`] in one step. Query handling reads the
//! store concurrently and is never blocked by a refresh.

use std::time::Duration;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use super::{FetchError, InventorySource};
use crate::metrics::{REFRESH_FAILURES, REFRESH_SUCCESSES, REGISTRY_RECORDS};
use crate::registry::{RegistrySnapshot, SnapshotStore};

/// Outcome of the most recent refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStatus {
    /// Generation installed by the last successful refresh.
    pub generation: Option<u64>,
    /// Records in the last installed snapshot.
    pub record_count: usize,
    /// Message of the last failure, cleared on success.
    pub last_error: Option<String>,
}

/// Builds snapshots from an inventory and publishes them to a store.
pub struct RegistryRefresher<I: InventorySource> {
    inventory: I,
    store: SnapshotStore,
    status: RwLock<RefreshStatus>,
}

impl<I: InventorySource> RegistryRefresher<I> {
    pub fn new(inventory: I, store: SnapshotStore) -> Self {
        Self {
            inventory,
            store,
            status: RwLock::new(RefreshStatus::default()),
        }
    }

    /// Fetch the inventory and install a new snapshot.
    ///
    /// On failure the current snapshot stays in place.
    ///
    /// # Errors
    ///
    /// Returns the [`FetchError`] raised by the inventory.
    pub async fn refresh(&self) -> Result<usize, FetchError> {
        let bindings = match self.inventory.fetch().await {
            Ok(bindings) => bindings,
            Err(err) => {
                metrics::counter!(REFRESH_FAILURES).increment(1);
                self.status.write().last_error = Some(err.to_string());
                return Err(err);
            }
        };

        let snapshot = RegistrySnapshot::from_bindings(&bindings);
        let count = snapshot.len();
        let generation = self.store.replace(snapshot);

        metrics::counter!(REFRESH_SUCCESSES).increment(1);
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(REGISTRY_RECORDS).set(count as f64);

        *self.status.write() = RefreshStatus {
            generation: Some(generation),
            record_count: count,
            last_error: None,
        };

        tracing::info!(
            bindings = bindings.len(),
            records = count,
            generation,
            "installed registry snapshot"
        );
        Ok(count)
    }

    #[must_use]
    pub fn status(&self) -> RefreshStatus {
        self.status.read().clone()
    }
}

/// Refresh periodically until `cancel` fires.
///
/// Waits `interval` after a successful refresh and `retry` after a failed
/// one. The first refresh happens after the first wait; callers refresh once
/// themselves before serving.
pub async fn run_refresh<I: InventorySource>(
    refresher: &RegistryRefresher<I>,
    interval: Duration,
    retry: Duration,
    cancel: CancellationToken,
) {
    let mut delay = interval;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("refresh loop cancelled");
                return;
            }
            () = tokio::time::sleep(delay) => {}
        }

        let result = tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("refresh loop cancelled during fetch");
                return;
            }
            result = refresher.refresh() => result,
        };

        delay = match result {
            Ok(_) => interval,
            Err(err) => {
                tracing::warn!(error = %err, retry_secs = retry.as_secs(), "inventory refresh failed");
                retry
            }
        };
    }
}
