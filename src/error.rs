//! Error types for the hostcast responder.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};

use thiserror::Error;

/// Main error type for hostcast operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("metrics error: {0}")]
    Metrics(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Validation errors for configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("interface name cannot be empty")]
    EmptyInterface,

    #[error("group {0} is not an IPv4 multicast address")]
    NotMulticast(Ipv4Addr),

    #[error("port must be greater than 0")]
    ZeroPort,

    #[error("refresh_interval_secs must be greater than 0")]
    ZeroRefreshInterval,

    #[error("retry_interval_secs must be greater than 0")]
    ZeroRetryInterval,

    #[error("max_consecutive_receive_errors must be greater than 0")]
    ZeroReceiveErrorThreshold,

    #[error("static inventory entry {index} has an empty hostname")]
    EmptyStaticHostname { index: usize },

    #[error("hosts inventory has an empty file path")]
    EmptyHostsPath,

    #[error("remote inventory has invalid URL (must start with http:// or https://): {url:?}")]
    InvalidInventoryUrl { url: String },
}

/// Errors raised while acquiring the multicast endpoint.
///
/// These are fatal: the responder never reaches the running state.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("network interface {0:?} not found")]
    NoInterface(String),

    #[error("network interface {0:?} has no IPv4 address")]
    NoIpv4Address(String),

    #[error("failed to create socket: {0}")]
    Socket(#[source] io::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to join group {group} on {interface}: {source}")]
    Join {
        group: Ipv4Addr,
        interface: Ipv4Addr,
        #[source]
        source: io::Error,
    },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;
