//! Main configuration type.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, LoggingConfig, MetricsConfig, ServerConfig};

/// Directives accepted as a bare log level.
const KNOWN_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Complete Wicket configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use wicket_config::WicketConfig;
///
/// let config = WicketConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8082");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct WicketConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl WicketConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - The server or metrics address is not a socket address
    /// - The shutdown timeout is zero (the drain must be bounded but non-empty)
    /// - The log level is a bare word that is not a known level
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.http_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.server.shutdown_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "server.shutdown_timeout_secs",
                "must be greater than zero",
            ));
        }

        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "server.request_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.metrics.enabled && self.metrics.addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid(
                "metrics.addr",
                format!("invalid socket address: {}", self.metrics.addr),
            ));
        }

        // Full directives ("crate=debug,hyper=warn") are left to the filter parser.
        let level = self.logging.level.to_lowercase();
        if !level.contains('=') && !level.contains(',') && !KNOWN_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::invalid(
                "logging.level",
                format!("unknown level: {}", self.logging.level),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(WicketConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_http_addr() {
        let mut config = WicketConfig::default();
        config.server.http_addr = ":8082".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.http_addr"));
    }

    #[test]
    fn test_zero_shutdown_timeout_rejected() {
        let mut config = WicketConfig::default();
        config.server.shutdown_timeout_secs = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("shutdown_timeout_secs"));
    }

    #[test]
    fn test_metrics_addr_checked_only_when_enabled() {
        let mut config = WicketConfig::default();
        config.metrics.addr = "nowhere".to_string();
        assert!(config.validate().is_ok());

        config.metrics.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_validation() {
        let mut config = WicketConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "wicket_server=debug,hyper=warn".to_string();
        assert!(config.validate().is_ok());
    }
}
