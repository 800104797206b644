//! Telemetry errors.

use std::net::AddrParseError;

use thiserror::Error;

/// Failure to install logging or metrics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The log filter directive did not parse.
    #[error("invalid log filter '{directive}': {source}")]
    Filter {
        /// The directive as configured
        directive: String,
        /// Parser error
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    /// A global subscriber was already installed.
    #[error("failed to install log subscriber: {0}")]
    Subscriber(#[source] tracing_subscriber::util::TryInitError),

    /// The scrape endpoint address did not parse.
    #[error("invalid metrics address '{addr}': {source}")]
    MetricsAddress {
        /// The address as configured
        addr: String,
        /// Parse failure
        #[source]
        source: AddrParseError,
    },

    /// The Prometheus exporter could not be installed.
    #[error("failed to install Prometheus exporter: {0}")]
    Exporter(#[source] metrics_exporter_prometheus::BuildError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_address_display() {
        let source = "nowhere".parse::<std::net::SocketAddr>().unwrap_err();
        let err = TelemetryError::MetricsAddress {
            addr: "nowhere".to_string(),
            source,
        };
        assert!(err
            .to_string()
            .starts_with("invalid metrics address 'nowhere'"));
    }
}
