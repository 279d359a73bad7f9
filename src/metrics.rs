//! Metrics initialization for Prometheus exporter.
//!
//! Counter names are defined here so every call site records under the same
//! key. When the exporter is not installed the `metrics` macros are no-ops.

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;
use crate::error::Result;

pub const QUERIES_RECEIVED: &str = "hostcast_queries_received_total";
pub const DECODE_ERRORS: &str = "hostcast_decode_errors_total";
pub const QUERIES_ANSWERED: &str = "hostcast_queries_answered_total";
pub const QUERIES_UNANSWERED: &str = "hostcast_queries_unanswered_total";
pub const ENCODE_ERRORS: &str = "hostcast_encode_errors_total";
pub const SEND_ERRORS: &str = "hostcast_send_errors_total";
pub const RECEIVE_ERRORS: &str = "hostcast_receive_errors_total";
pub const REFRESH_SUCCESSES: &str = "hostcast_refresh_success_total";
pub const REFRESH_FAILURES: &str = "hostcast_refresh_failure_total";
pub const REGISTRY_RECORDS: &str = "hostcast_registry_records";

/// Initialize the metrics system based on configuration.
///
/// When metrics are enabled, this starts an HTTP server that exposes
/// a `/metrics` endpoint for Prometheus to scrape.
pub fn init(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(config.listen)
        .install()
        .map_err(|e| crate::error::Error::Metrics(e.to_string()))?;

    Ok(())
}
