//! Prometheus metrics for Wicket.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `wicket_connections_accepted_total` | Counter | - | Accepted TCP connections |
//! | `wicket_connections_active` | Gauge | - | Connections currently open |
//! | `wicket_requests_total` | Counter | `method`, `status` | Completed requests |
//! | `wicket_drain_duration_seconds` | Histogram | `outcome` | Time spent draining on shutdown |
//!
//! Recording functions are no-ops until [`init_metrics`] installs a recorder,
//! so library code can call them unconditionally.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are exported.
    pub enabled: bool,

    /// Address the Prometheus scrape endpoint listens on.
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Installs the Prometheus recorder and its scrape listener.
///
/// Must be called from within a tokio runtime; the exporter spawns its HTTP
/// listener on it.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsAddress` for an unparsable address and
/// `TelemetryError::Exporter` if a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|source| TelemetryError::MetricsAddress {
            addr: config.addr.clone(),
            source,
        })?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(TelemetryError::Exporter)?;

    register_metric_descriptions();
    tracing::info!(%addr, "Prometheus exporter listening");

    Ok(())
}

fn register_metric_descriptions() {
    describe_counter!(
        "wicket_connections_accepted_total",
        "Total number of TCP connections accepted"
    );
    describe_gauge!(
        "wicket_connections_active",
        "Number of connections currently being served"
    );
    describe_counter!(
        "wicket_requests_total",
        "Total number of HTTP requests answered"
    );
    describe_histogram!(
        "wicket_drain_duration_seconds",
        "Time spent waiting for connections to finish during shutdown"
    );
}

/// Records an accepted connection.
pub fn record_connection_accepted() {
    counter!("wicket_connections_accepted_total").increment(1);
}

/// Records an answered request.
pub fn record_request(method: &str, status_code: u16) {
    counter!(
        "wicket_requests_total",
        "method" => method.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);
}

/// Records how long the shutdown drain took.
///
/// `outcome` is `"drained"`, `"timeout"`, or `"forced"`.
pub fn record_drain(outcome: &'static str, elapsed: Duration) {
    histogram!("wicket_drain_duration_seconds", "outcome" => outcome)
        .record(elapsed.as_secs_f64());
}

/// Keeps `wicket_connections_active` in step with a connection's lifetime.
///
/// Increments on creation and decrements on drop, including on panic unwind.
#[derive(Debug)]
pub struct ActiveConnectionGuard {
    _private: (),
}

impl ActiveConnectionGuard {
    /// Creates a new guard and increments the active connection gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!("wicket_connections_active").increment(1.0);
        Self { _private: () }
    }
}

impl Default for ActiveConnectionGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ActiveConnectionGuard {
    fn drop(&mut self) {
        gauge!("wicket_connections_active").decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_disabled() {
        let config = MetricsConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.addr, "0.0.0.0:9090");
    }

    #[test]
    fn test_disabled_metrics_is_noop() {
        assert!(init_metrics(&MetricsConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_address() {
        let config = MetricsConfig {
            enabled: true,
            addr: "not-an-address".to_string(),
        };

        let err = init_metrics(&config).unwrap_err();
        assert!(matches!(err, TelemetryError::MetricsAddress { .. }));
    }

    #[test]
    fn test_record_functions_dont_panic() {
        record_connection_accepted();
        record_request("GET", 200);
        record_drain("drained", Duration::from_millis(12));
        drop(ActiveConnectionGuard::new());
    }
}
