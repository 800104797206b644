//! Logging and metrics for Wicket services.
//!
//! - **Logging**: `tracing-subscriber` with JSON or pretty output
//! - **Metrics**: Prometheus exposition via the `metrics` crate
//!
//! # Example
//!
//! ```rust,ignore
//! use wicket_telemetry::{init_telemetry, LogConfig, MetricsConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     init_telemetry(&LogConfig::production(), &MetricsConfig::default())
//!         .expect("telemetry");
//! }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogOutput};
pub use metrics::{init_metrics, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging first, then metrics.
///
/// Logging goes first so that metrics initialisation can itself be logged.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(logging: &LogConfig, metrics: &MetricsConfig) -> TelemetryResult<()> {
    init_logging(logging)?;
    init_metrics(metrics)?;
    Ok(())
}
