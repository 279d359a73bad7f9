//! Hostname/address bindings and immutable snapshots of them.
//!
//! A [`RegistrySnapshot`] is built wholesale from one inventory fetch and is
//! never edited afterwards. Refreshes publish a new snapshot through the
//! [`SnapshotStore`], which readers load without locking.

mod store;

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};

use hickory_proto::rr::Name;
use tracing::{debug, warn};

use crate::inventory::Binding;

pub use store::SnapshotStore;

/// Error raised when a binding cannot become a [`ServiceRecord`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("hostname cannot be empty")]
    EmptyHostname,

    #[error("invalid hostname {hostname:?}: {reason}")]
    InvalidHostname { hostname: String, reason: String },

    #[error("address {0} is unspecified")]
    UnspecifiedAddress(Ipv4Addr),

    #[error("address {0} is not IPv4")]
    NotIpv4(IpAddr),
}

/// Lowercase a hostname and strip its trailing dot for comparison.
pub fn normalize_hostname(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

/// A single hostname to IPv4 address binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    hostname: String,
    address: Ipv4Addr,
    /// Hostname as wire labels, bytes taken verbatim.
    name: Name,
    /// Lowercase hostname without trailing dot, used for deduplication.
    key: String,
}

impl ServiceRecord {
    /// Create a record, making the hostname fully qualified.
    ///
    /// Labels are kept as raw UTF-8 bytes, the way multicast DNS carries
    /// them, so names with spaces or non-ASCII characters are valid.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when the hostname is empty, cannot be encoded
    /// as DNS labels (empty label, label over 63 bytes, name over 255 bytes),
    /// or the address is `0.0.0.0`.
    pub fn new(hostname: &str, address: Ipv4Addr) -> Result<Self, RecordError> {
        let trimmed = hostname.trim();
        let key = normalize_hostname(trimmed);
        if key.is_empty() {
            return Err(RecordError::EmptyHostname);
        }
        if address.is_unspecified() {
            return Err(RecordError::UnspecifiedAddress(address));
        }

        let bare = trimmed.strip_suffix('.').unwrap_or(trimmed);
        let name = Name::from_labels(bare.split('.').map(str::as_bytes)).map_err(|e| {
            RecordError::InvalidHostname {
                hostname: hostname.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            hostname: format!("{bare}."),
            address,
            name,
            key,
        })
    }

    /// Fully-qualified, dot-terminated hostname.
    #[inline]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// The hostname as a wire name.
    #[inline]
    pub const fn name(&self) -> &Name {
        &self.name
    }

    #[inline]
    pub const fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// Whether `name` refers to this record.
    ///
    /// Labels are compared byte for byte, ignoring ASCII case. The root label
    /// is not part of the comparison, so a trailing dot never matters.
    pub fn matches(&self, name: &Name) -> bool {
        let mut ours = self.name.iter();
        let mut theirs = name.iter();
        loop {
            match (ours.next(), theirs.next()) {
                (None, None) => return true,
                (Some(a), Some(b)) if a.eq_ignore_ascii_case(b) => {}
                _ => return false,
            }
        }
    }
}

impl TryFrom<&Binding> for ServiceRecord {
    type Error = RecordError;

    fn try_from(binding: &Binding) -> Result<Self, Self::Error> {
        match binding.address {
            IpAddr::V4(address) => Self::new(&binding.hostname, address),
            other @ IpAddr::V6(_) => Err(RecordError::NotIpv4(other)),
        }
    }
}

/// An ordered, immutable set of records with unique hostnames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    records: Vec<ServiceRecord>,
    generation: u64,
}

impl RegistrySnapshot {
    /// Build a snapshot, keeping the first record for each hostname.
    pub fn new<I>(records: I) -> Self
    where
        I: IntoIterator<Item = ServiceRecord>,
    {
        let mut seen = HashSet::new();
        let records = records
            .into_iter()
            .filter(|record| {
                let fresh = seen.insert(record.key.clone());
                if !fresh {
                    debug!(
                        hostname = %record.hostname,
                        address = %record.address,
                        "dropping duplicate hostname"
                    );
                }
                fresh
            })
            .collect();

        Self {
            records,
            generation: 0,
        }
    }

    /// Build a snapshot from raw inventory bindings.
    ///
    /// Bindings that cannot become records are skipped with a warning.
    pub fn from_bindings(bindings: &[Binding]) -> Self {
        Self::new(bindings.iter().filter_map(|binding| {
            ServiceRecord::try_from(binding)
                .inspect_err(|err| {
                    warn!(
                        hostname = %binding.hostname,
                        address = %binding.address,
                        error = %err,
                        "skipping inventory binding"
                    );
                })
                .ok()
        }))
    }

    #[inline]
    pub fn records(&self) -> &[ServiceRecord] {
        &self.records
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sequence number assigned by the store when this snapshot was installed.
    ///
    /// Zero for snapshots that were never installed.
    #[inline]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) const fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }
}
