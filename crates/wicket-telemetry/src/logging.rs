//! Structured logging.
//!
//! Installs a `tracing-subscriber` registry with one formatting layer behind
//! an [`EnvFilter`]. Every lifecycle message the server emits (listen
//! address, route table, drain progress, fatal shutdown) goes through
//! `tracing`, so this is the only place the output format is chosen.
//!
//! # Example
//!
//! ```rust,ignore
//! use wicket_telemetry::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::info!(addr = "0.0.0.0:8082", "Serving");
//! ```

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// One JSON object per line.
    Json,
    /// Human-readable lines.
    Pretty {
        /// Colorize levels and fields.
        ansi: bool,
    },
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Install a subscriber at all.
    pub enabled: bool,

    /// Filter directive, e.g. `info` or `wicket_server=debug,hyper=warn`.
    pub filter: String,

    /// Output format.
    pub output: LogOutput,

    /// Include source file and line.
    pub source_location: bool,

    /// Include the event target (module path).
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Colored human-readable output at debug level.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            filter: "debug".to_string(),
            output: LogOutput::Pretty { ansi: true },
            source_location: true,
            include_target: true,
        }
    }

    /// JSON output at info level.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            filter: "info".to_string(),
            output: LogOutput::Json,
            source_location: false,
            include_target: true,
        }
    }
}

/// Installs the global subscriber.
///
/// Does nothing when `config.enabled` is false.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for a bad directive and
/// [`TelemetryError::Subscriber`] if a global subscriber already exists.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.filter)?;

    let fmt = tracing_subscriber::fmt::layer()
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_target(config.include_target);

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.output {
        LogOutput::Json => fmt.json().boxed(),
        LogOutput::Pretty { ansi } => fmt.with_ansi(ansi).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

/// Parses a filter directive.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] if the directive does not parse.
pub fn create_env_filter(directive: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(directive).map_err(|source| TelemetryError::Filter {
        directive: directive.to_string(),
        source,
    })
}
