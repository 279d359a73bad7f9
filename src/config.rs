//! Configuration loading and validation.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::dns::{MDNS_GROUP, MDNS_PORT};
use crate::error::{ConfigError, Result, ValidationError};

/// Main configuration for the hostcast responder.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Network interface whose IPv4 address is used to join the group.
    pub interface: String,

    /// Multicast group to join.
    #[serde(default = "default_group")]
    pub group: Ipv4Addr,

    /// UDP port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds between successful inventory refreshes.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Seconds to wait before retrying a failed refresh.
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,

    /// Consecutive receive failures tolerated before the responder stops.
    #[serde(default = "default_max_receive_errors")]
    pub max_consecutive_receive_errors: u32,

    /// Inventory sources, fetched and concatenated in order.
    #[serde(default)]
    pub inventory: Vec<InventorySourceConfig>,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// One inventory source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InventorySourceConfig {
    /// Bindings listed directly in the config file.
    Static { records: Vec<StaticRecord> },

    /// An `/etc/hosts`-style file.
    Hosts { path: PathBuf },

    /// An HTTP endpoint returning a JSON array of bindings.
    Remote {
        url: String,
        #[serde(default = "default_remote_timeout")]
        timeout_secs: u64,
    },
}

/// An inline hostname/address binding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticRecord {
    pub hostname: String,
    pub address: Ipv4Addr,
}

/// Metrics exporter settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}

const fn default_group() -> Ipv4Addr {
    MDNS_GROUP
}

const fn default_port() -> u16 {
    MDNS_PORT
}

const fn default_refresh_interval() -> u64 {
    60
}

const fn default_retry_interval() -> u64 {
    10
}

const fn default_max_receive_errors() -> u32 {
    32
}

const fn default_remote_timeout() -> u64 {
    30
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9090))
}

impl Config {
    /// Create a configuration with defaults for everything but the interface.
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            group: default_group(),
            port: default_port(),
            refresh_interval_secs: default_refresh_interval(),
            retry_interval_secs: default_retry_interval(),
            max_consecutive_receive_errors: default_max_receive_errors(),
            inventory: Vec::new(),
            metrics: MetricsConfig::default(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate().map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.interface.trim().is_empty() {
            return Err(ValidationError::EmptyInterface);
        }
        if !self.group.is_multicast() {
            return Err(ValidationError::NotMulticast(self.group));
        }
        if self.port == 0 {
            return Err(ValidationError::ZeroPort);
        }
        if self.refresh_interval_secs == 0 {
            return Err(ValidationError::ZeroRefreshInterval);
        }
        if self.retry_interval_secs == 0 {
            return Err(ValidationError::ZeroRetryInterval);
        }
        if self.max_consecutive_receive_errors == 0 {
            return Err(ValidationError::ZeroReceiveErrorThreshold);
        }

        for source in &self.inventory {
            match source {
                InventorySourceConfig::Static { records } => {
                    if let Some(index) = records.iter().position(|r| r.hostname.trim().is_empty())
                    {
                        return Err(ValidationError::EmptyStaticHostname { index });
                    }
                }
                InventorySourceConfig::Hosts { path } => {
                    if path.as_os_str().is_empty() {
                        return Err(ValidationError::EmptyHostsPath);
                    }
                }
                InventorySourceConfig::Remote { url, .. } => {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        return Err(ValidationError::InvalidInventoryUrl { url: url.clone() });
                    }
                }
            }
        }

        Ok(())
    }

    /// The address the responder binds and listens on.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub const fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn validation_error(toml: &str) -> ValidationError {
        match Config::parse(toml) {
            Err(Error::Config(ConfigError::Validation(err))) => err,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn should_apply_defaults_when_only_interface_is_set() {
        let config = Config::parse(r#"interface = "eth0""#).unwrap();

        assert_eq!(config.interface, "eth0");
        assert_eq!(config.group, Ipv4Addr::new(224, 0, 0, 251));
        assert_eq!(config.port, 5353);
        assert_eq!(config.refresh_interval_secs, 60);
        assert_eq!(config.retry_interval_secs, 10);
        assert_eq!(config.max_consecutive_receive_errors, 32);
        assert!(config.inventory.is_empty());
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn should_parse_every_inventory_source_type() {
        let toml = r#"
            interface = "en0"

            [[inventory]]
            type = "static"
            records = [{ hostname = "node1.local.", address = "10.0.0.5" }]

            [[inventory]]
            type = "hosts"
            path = "/etc/hostcast/hosts"

            [[inventory]]
            type = "remote"
            url = "https://inventory.example.com/bindings"
        "#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.inventory.len(), 3);
        assert_eq!(
            config.inventory[0],
            InventorySourceConfig::Static {
                records: vec![StaticRecord {
                    hostname: "node1.local.".into(),
                    address: Ipv4Addr::new(10, 0, 0, 5),
                }]
            }
        );
        assert_eq!(
            config.inventory[1],
            InventorySourceConfig::Hosts {
                path: PathBuf::from("/etc/hostcast/hosts")
            }
        );
        assert_eq!(
            config.inventory[2],
            InventorySourceConfig::Remote {
                url: "https://inventory.example.com/bindings".into(),
                timeout_secs: 30,
            }
        );
    }

    #[test]
    fn should_allow_overriding_group_and_port() {
        let toml = r#"
            interface = "lo"
            group = "239.1.2.3"
            port = 15353
        "#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.group, Ipv4Addr::new(239, 1, 2, 3));
        assert_eq!(config.listen_addr(), "0.0.0.0:15353".parse().unwrap());
    }

    #[test]
    fn should_reject_missing_interface() {
        assert!(Config::parse("port = 5353").is_err());
    }

    #[test]
    fn should_reject_empty_interface() {
        assert_eq!(
            validation_error(r#"interface = " ""#),
            ValidationError::EmptyInterface
        );
    }

    #[test]
    fn should_reject_unicast_group() {
        let toml = r#"
            interface = "eth0"
            group = "10.0.0.1"
        "#;
        assert_eq!(
            validation_error(toml),
            ValidationError::NotMulticast(Ipv4Addr::new(10, 0, 0, 1))
        );
    }

    #[test]
    fn should_reject_zero_values() {
        assert_eq!(
            validation_error("interface = \"eth0\"\nport = 0"),
            ValidationError::ZeroPort
        );
        assert_eq!(
            validation_error("interface = \"eth0\"\nrefresh_interval_secs = 0"),
            ValidationError::ZeroRefreshInterval
        );
        assert_eq!(
            validation_error("interface = \"eth0\"\nretry_interval_secs = 0"),
            ValidationError::ZeroRetryInterval
        );
        assert_eq!(
            validation_error("interface = \"eth0\"\nmax_consecutive_receive_errors = 0"),
            ValidationError::ZeroReceiveErrorThreshold
        );
    }

    #[test]
    fn should_reject_invalid_remote_url() {
        let toml = r#"
            interface = "eth0"

            [[inventory]]
            type = "remote"
            url = "ftp://inventory.example.com"
        "#;
        assert!(matches!(
            validation_error(toml),
            ValidationError::InvalidInventoryUrl { .. }
        ));
    }

    #[test]
    fn should_reject_empty_static_hostname() {
        let toml = r#"
            interface = "eth0"

            [[inventory]]
            type = "static"
            records = [
                { hostname = "ok.local.", address = "10.0.0.1" },
                { hostname = "", address = "10.0.0.2" },
            ]
        "#;
        assert_eq!(
            validation_error(toml),
            ValidationError::EmptyStaticHostname { index: 1 }
        );
    }

    #[test]
    fn should_reject_unknown_field() {
        let toml = r#"
            interface = "eth0"
            unknown_field = "value"
        "#;

        assert!(Config::parse(toml).is_err());
    }
}
