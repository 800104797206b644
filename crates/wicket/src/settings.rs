//! Bridges file/env configuration to the server and telemetry crates.

use std::path::Path;
use std::time::Duration;

use wicket_config::{ConfigError, ConfigLoader, LogFormat, LoggingConfig, WicketConfig};
use wicket_server::ServerConfig;
use wicket_telemetry::{LogConfig, LogOutput, MetricsConfig};

/// Config file read when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "wicket.toml";

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "WICKET_CONFIG";

/// Prefix for `PREFIX__SECTION__KEY` overrides.
pub const ENV_PREFIX: &str = "WICKET";

/// Loads the configuration.
///
/// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_PATH`] is
/// read if present. `.env` and `WICKET__*` variables are applied on top.
///
/// # Errors
///
/// Returns `ConfigError` if the file is unreadable or invalid, or an
/// override does not parse.
pub fn load(path: Option<&Path>) -> Result<WicketConfig, ConfigError> {
    let loader = ConfigLoader::new().with_dotenv();
    let loader = match path {
        Some(path) => loader.with_file(path)?,
        None => loader.with_optional_file(DEFAULT_CONFIG_PATH)?,
    };
    loader.with_env_prefix(ENV_PREFIX).load()
}

/// Server settings for [`wicket_server`].
pub fn server_config(config: &wicket_config::ServerConfig) -> ServerConfig {
    ServerConfig::builder()
        .http_addr(&config.http_addr)
        .shutdown_timeout(Duration::from_secs(config.shutdown_timeout_secs))
        .request_timeout(Duration::from_millis(config.request_timeout_ms))
        .keep_alive(config.keep_alive)
        .build()
}

/// Logging settings for [`wicket_telemetry`].
pub fn log_config(config: &LoggingConfig) -> LogConfig {
    let output = match config.format {
        LogFormat::Json => LogOutput::Json,
        LogFormat::Pretty => LogOutput::Pretty {
            ansi: config.ansi_enabled,
        },
    };

    LogConfig {
        enabled: config.enabled,
        filter: config.level.clone(),
        output,
        ..LogConfig::production()
    }
}

/// Metrics settings for [`wicket_telemetry`].
pub fn metrics_config(config: &wicket_config::MetricsConfig) -> MetricsConfig {
    MetricsConfig {
        enabled: config.enabled,
        addr: config.addr.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_server_config_conversion() {
        let config = wicket_config::ServerConfig {
            http_addr: "127.0.0.1:9000".to_string(),
            shutdown_timeout_secs: 5,
            request_timeout_ms: 1500,
            keep_alive: false,
        };

        let server = server_config(&config);
        assert_eq!(server.http_addr(), "127.0.0.1:9000");
        assert_eq!(server.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(server.request_timeout(), Duration::from_millis(1500));
        assert!(!server.keep_alive());
    }

    #[test]
    fn test_log_config_conversion() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            ansi_enabled: true,
            ..LoggingConfig::default()
        };

        let log = log_config(&config);
        assert!(log.enabled);
        assert_eq!(log.filter, "debug");
        assert_eq!(log.output, LogOutput::Pretty { ansi: true });
    }

    #[test]
    fn test_metrics_config_conversion() {
        let config = wicket_config::MetricsConfig {
            enabled: true,
            addr: "127.0.0.1:9100".to_string(),
        };

        let metrics = metrics_config(&config);
        assert!(metrics.enabled);
        assert_eq!(metrics.addr, "127.0.0.1:9100");
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
http_addr = "127.0.0.1:9001"
shutdown_timeout_secs = 7
"#
        )
        .unwrap();

        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.server.http_addr, "127.0.0.1:9001");
        assert_eq!(config.server.shutdown_timeout_secs, 7);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let result = load(Some(Path::new("/nonexistent/wicket.toml")));
        assert!(result.is_err());
    }
}
