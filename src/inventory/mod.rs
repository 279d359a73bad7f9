//! Inventory sources supplying hostname/address bindings.
//!
//! An [`InventorySource`] returns the complete list of bindings it knows about
//! each time it is fetched. Sources do not retry; the refresh loop in
//! [`refresh`] owns the retry policy.
//!
//! # Supported Sources
//!
//! - **Static**: bindings listed inline in the configuration
//! - **Hosts**: an `/etc/hosts`-style file
//! - **Remote**: an HTTP endpoint returning a JSON array of bindings

mod hosts;
pub mod refresh;
mod remote;

use std::future::Future;
use std::net::IpAddr;
use std::path::PathBuf;

use serde::Deserialize;

pub use hosts::{HostsInventory, parse_hosts};
pub use refresh::{RegistryRefresher, run_refresh};
pub use remote::RemoteInventory;

use crate::config::{InventorySourceConfig, StaticRecord};

/// A raw hostname/address pair as delivered by an inventory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Binding {
    pub hostname: String,
    pub address: IpAddr,
}

impl Binding {
    pub fn new(hostname: impl Into<String>, address: IpAddr) -> Self {
        Self {
            hostname: hostname.into(),
            address,
        }
    }
}

/// Error type for inventory fetches.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// File was not found at the specified path.
    #[error("file not found: {0:?}")]
    NotFound(PathBuf),

    /// Permission denied when accessing the file.
    #[error("permission denied: {0:?}")]
    PermissionDenied(PathBuf),

    /// I/O error while reading the file.
    #[error("I/O error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP request failed with a non-success status code.
    #[error("HTTP request failed for {url}: status {status}")]
    HttpStatus { url: String, status: u16 },

    /// Network error during HTTP request.
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Timeout fetching the remote URL.
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// Response body is not a JSON array of bindings.
    #[error("invalid inventory document from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Failed to create HTTP client.
    #[error("failed to create HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// Task join error from spawning a blocking task.
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Trait for inventory implementations.
pub trait InventorySource: Send + Sync + 'static {
    /// Fetch the full current list of bindings.
    fn fetch(&self) -> impl Future<Output = Result<Vec<Binding>, FetchError>> + Send;
}

/// Bindings fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    bindings: Vec<Binding>,
}

impl StaticInventory {
    pub const fn new(bindings: Vec<Binding>) -> Self {
        Self { bindings }
    }
}

impl From<&[StaticRecord]> for StaticInventory {
    fn from(records: &[StaticRecord]) -> Self {
        Self::new(
            records
                .iter()
                .map(|r| Binding::new(r.hostname.clone(), IpAddr::V4(r.address)))
                .collect(),
        )
    }
}

impl InventorySource for StaticInventory {
    async fn fetch(&self) -> Result<Vec<Binding>, FetchError> {
        Ok(self.bindings.clone())
    }
}

/// One configured source.
#[derive(Debug)]
enum SourceKind {
    Static(StaticInventory),
    Hosts(HostsInventory),
    Remote(RemoteInventory),
}

impl SourceKind {
    async fn fetch(&self) -> Result<Vec<Binding>, FetchError> {
        match self {
            Self::Static(source) => source.fetch().await,
            Self::Hosts(source) => source.fetch().await,
            Self::Remote(source) => source.fetch().await,
        }
    }
}

/// Every configured source, fetched in order and concatenated.
///
/// A failing source fails the whole fetch so that a partial inventory never
/// replaces a complete one.
#[derive(Debug, Default)]
pub struct ConfiguredInventory {
    sources: Vec<SourceKind>,
}

impl ConfiguredInventory {
    /// Build the inventory described by the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if an HTTP client cannot be created
    /// for a remote source.
    pub fn from_config(sources: &[InventorySourceConfig]) -> Result<Self, FetchError> {
        let sources = sources
            .iter()
            .map(|source| {
                Ok(match source {
                    InventorySourceConfig::Static { records } => {
                        SourceKind::Static(StaticInventory::from(records.as_slice()))
                    }
                    InventorySourceConfig::Hosts { path } => {
                        SourceKind::Hosts(HostsInventory::new(path.clone()))
                    }
                    InventorySourceConfig::Remote { url, timeout_secs } => SourceKind::Remote(
                        RemoteInventory::new(url.clone(), std::time::Duration::from_secs(*timeout_secs))?,
                    ),
                })
            })
            .collect::<Result<Vec<_>, FetchError>>()?;

        Ok(Self { sources })
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl InventorySource for ConfiguredInventory {
    async fn fetch(&self) -> Result<Vec<Binding>, FetchError> {
        let mut bindings = Vec::new();
        for (index, source) in self.sources.iter().enumerate() {
            let fetched = source.fetch().await?;
            tracing::debug!(index, count = fetched.len(), "fetched inventory source");
            bindings.extend(fetched);
        }
        Ok(bindings)
    }
}
