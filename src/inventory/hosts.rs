//! Hosts file inventory.
//!
//! Reads bindings from standard `/etc/hosts` format files.

use std::io::BufRead;
use std::net::IpAddr;
use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::AsyncReadExt;

use super::{Binding, FetchError, InventorySource};

/// Names that never become bindings (system entries).
const IGNORED_NAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "broadcasthost",
    "ip6-localhost",
    "ip6-loopback",
    "ip6-localnet",
    "ip6-mcastprefix",
    "ip6-allnodes",
    "ip6-allrouters",
    "ip6-allhosts",
];

/// Parse hosts file content into bindings.
///
/// # Format
///
/// - `<ip> <name1> [name2] [name3]...`
/// - Comments start with `#`, inline or on their own line
/// - Empty lines are ignored
///
/// Every name on a line is bound to that line's address. Lines whose first
/// field is not an IP address are skipped.
///
/// # Example
///
/// ```text
/// # cluster nodes
/// 10.0.0.5 node1.local
/// 10.0.0.6 node2.local api.service.local   # two names, one address
/// ```
pub fn parse_hosts(reader: &mut dyn BufRead) -> std::io::Result<Vec<Binding>> {
    let mut bindings = Vec::new();
    let mut line = String::new();
    let mut line_number = 0usize;

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        line_number += 1;

        let content = line.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }

        let mut fields = content.split_whitespace();
        let Some(address) = fields.next() else {
            continue;
        };
        let Ok(address) = address.parse::<IpAddr>() else {
            tracing::debug!(line = line_number, "skipping hosts line without address");
            continue;
        };

        for name in fields {
            if IGNORED_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
                continue;
            }
            bindings.push(Binding::new(name, address));
        }
    }

    Ok(bindings)
}

/// Inventory backed by a hosts file, re-read on every fetch.
#[derive(Debug, Clone)]
pub struct HostsInventory {
    path: PathBuf,
}

impl HostsInventory {
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl InventorySource for HostsInventory {
    async fn fetch(&self) -> Result<Vec<Binding>, FetchError> {
        let path = self.path.clone();

        let mut file = File::open(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FetchError::NotFound(path.clone()),
            std::io::ErrorKind::PermissionDenied => FetchError::PermissionDenied(path.clone()),
            _ => FetchError::Io {
                path: path.clone(),
                source: e,
            },
        })?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .await
            .map_err(|e| FetchError::Io {
                path: path.clone(),
                source: e,
            })?;

        // Inventories can be large; keep parsing off the async runtime.
        tokio::task::spawn_blocking(move || parse_hosts(&mut content.as_bytes()))
            .await?
            .map_err(|source| FetchError::Io { path, source })
    }
}
