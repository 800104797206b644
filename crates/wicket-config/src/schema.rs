//! Configuration sections.
//!
//! Every section deserializes with defaults for omitted keys and rejects
//! keys it does not know.

use serde::{Deserialize, Serialize};

/// Server configuration section.
///
/// Controls the listener address, the graceful drain deadline and
/// per-connection behaviour.
///
/// # Example
///
/// ```
/// use wicket_config::ServerConfig;
///
/// let config = ServerConfig {
///     http_addr: "127.0.0.1:8082".to_string(),
///     shutdown_timeout_secs: 10,
///     ..Default::default()
/// };
/// assert!(config.keep_alive);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address as "host:port".
    pub http_addr: String,

    /// Seconds in-flight requests get to finish after an interrupt.
    pub shutdown_timeout_secs: u64,

    /// Upper bound for reading a request body, in milliseconds.
    pub request_timeout_ms: u64,

    /// HTTP/1.1 keep-alive.
    pub keep_alive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8082".to_string(),
            shutdown_timeout_secs: 30,
            request_timeout_ms: 30_000,
            keep_alive: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable lines.
    Pretty,
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Install a log subscriber.
    pub enabled: bool,

    /// Filter directive ("info", "wicket_server=debug", ...).
    pub level: String,

    /// Output format.
    pub format: LogFormat,

    /// ANSI colors for the pretty format.
    pub ansi_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Json,
            ansi_enabled: false,
        }
    }
}

/// `[metrics]` section. The exporter is off unless enabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Run the Prometheus exporter.
    pub enabled: bool,

    /// Scrape endpoint address.
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
