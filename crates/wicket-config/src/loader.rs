//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, and environment variables.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, LogFormat, WicketConfig};

/// Configuration loader with layered approach.
///
/// Layers are applied in order, later ones overriding earlier ones:
/// 1. Default values
/// 2. Configuration file (TOML or JSON)
/// 3. Environment variables (`PREFIX__SECTION__KEY`)
///
/// # Example
///
/// ```no_run
/// use wicket_config::ConfigLoader;
///
/// # fn main() -> Result<(), wicket_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("wicket.toml")?
///     .with_env_prefix("WICKET")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: WicketConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new loader seeded with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: WicketConfig::default(),
            env_prefix: None,
        }
    }

    /// Load configuration from a file.
    ///
    /// The format is chosen by extension (`.toml` or `.json`). Sections the
    /// file leaves out keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, malformed,
    /// or contains unknown fields.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::Missing {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        self.config = Self::parse_file(&content, path)?;
        Ok(self)
    }

    /// Load configuration from a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in the given format ("toml" or "json").
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails or the format is unsupported.
    ///
    /// # Example
    ///
    /// ```
    /// use wicket_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [server]
    ///     http_addr = "127.0.0.1:3000"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.server.http_addr, "127.0.0.1:3000");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => return Err(ConfigError::UnsupportedFormat(format.to_string())),
        };
        Ok(self)
    }

    /// Set the environment variable prefix for overrides.
    ///
    /// With prefix "WICKET":
    /// - `WICKET__SERVER__HTTP_ADDR=127.0.0.1:9000`
    /// - `WICKET__LOGGING__FORMAT=pretty`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file from the working directory into the process
    /// environment, if one exists.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        // A missing .env is the normal case outside local development.
        let _ = dotenvy::dotenv();
        self
    }

    /// Apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override cannot be parsed or the final
    /// configuration is invalid.
    pub fn load(mut self) -> Result<WicketConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: HashMap<String, String> = env::vars()
                .filter(|(k, _)| k.starts_with(&prefix))
                .collect();
            self.apply_env_overrides(&prefix, &vars)?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    fn parse_file(content: &str, path: &Path) -> Result<WicketConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    fn apply_env_overrides(
        &mut self,
        prefix: &str,
        vars: &HashMap<String, String>,
    ) -> Result<(), ConfigError> {
        for (key, value) in vars {
            self.apply_env_var(key, value, prefix)?;
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(rest) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            // WICKET_CONFIG and friends share the prefix but are not overrides.
            return Ok(());
        };

        let parts: Vec<&str> = rest.split("__").collect();

        let server = &mut self.config.server;
        let logging = &mut self.config.logging;
        let metrics = &mut self.config.metrics;

        match parts.as_slice() {
            ["SERVER", "HTTP_ADDR"] => server.http_addr = value.to_string(),
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                server.shutdown_timeout_secs = parse_number(key, value)?;
            }
            ["SERVER", "REQUEST_TIMEOUT_MS"] => {
                server.request_timeout_ms = parse_number(key, value)?;
            }
            ["SERVER", "KEEP_ALIVE"] => server.keep_alive = parse_flag(key, value)?,

            ["LOGGING", "ENABLED"] => logging.enabled = parse_flag(key, value)?,
            ["LOGGING", "LEVEL"] => logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => return Err(bad_override(key, "'json' or 'pretty'")),
                };
            }
            ["LOGGING", "ANSI_ENABLED"] => logging.ansi_enabled = parse_flag(key, value)?,

            ["METRICS", "ENABLED"] => metrics.enabled = parse_flag(key, value)?,
            ["METRICS", "ADDR"] => metrics.addr = value.to_string(),

            _ => {}
        }

        Ok(())
    }
}

fn bad_override(var: &str, expected: &'static str) -> ConfigError {
    ConfigError::Override {
        var: var.to_string(),
        expected,
    }
}

fn parse_number(var: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| bad_override(var, "an unsigned integer"))
}

fn parse_flag(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(bad_override(var, "a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_loader_defaults() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config.server.http_addr, "0.0.0.0:8082");
        assert_eq!(config.server.shutdown_timeout_secs, 30);
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"server": {"http_addr": "127.0.0.1:3000", "shutdown_timeout_secs": 5}}"#;

        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.server.http_addr, "127.0.0.1:3000");
        assert_eq!(config.server.shutdown_timeout_secs, 5);
    }

    #[test]
    fn test_loader_with_string_unsupported_format() {
        let result = ConfigLoader::new().with_string("", "yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_loader_with_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [server]
            http_addr = "127.0.0.1:18082"
            shutdown_timeout_secs = 12

            [logging]
            level = "warn"
            format = "pretty"

            [metrics]
            enabled = true
            addr = "127.0.0.1:19090"
            "#
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_file(file.path())
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.server.http_addr, "127.0.0.1:18082");
        assert_eq!(config.server.shutdown_timeout_secs, 12);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_loader_rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let result = ConfigLoader::new().with_file(file.path());
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/wicket.toml");
        assert!(matches!(result, Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/wicket.toml")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.server.http_addr, "0.0.0.0:8082");
    }

    #[test]
    fn test_loader_validates_on_load() {
        let toml = r#"
            [server]
            shutdown_timeout_secs = 0
        "#;

        let result = ConfigLoader::new().with_string(toml, "toml").unwrap().load();
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("V", "TRUE").unwrap());
        assert!(parse_flag("V", "on").unwrap());
        assert!(!parse_flag("V", "0").unwrap());
        assert!(!parse_flag("V", " no ").unwrap());
        assert!(matches!(
            parse_flag("V", "maybe"),
            Err(ConfigError::Override { expected: "a boolean", .. })
        ));
    }

    // Overrides are exercised through apply_env_overrides with an explicit
    // map; mutating the process environment is unsafe under edition 2024.

    #[test]
    fn test_env_overrides() {
        let vars = HashMap::from([
            ("WICKET__SERVER__HTTP_ADDR".to_string(), "127.0.0.1:9000".to_string()),
            ("WICKET__SERVER__SHUTDOWN_TIMEOUT_SECS".to_string(), "7".to_string()),
            ("WICKET__SERVER__KEEP_ALIVE".to_string(), "off".to_string()),
            ("WICKET__LOGGING__FORMAT".to_string(), "pretty".to_string()),
            ("WICKET__METRICS__ENABLED".to_string(), "true".to_string()),
            ("WICKET_CONFIG".to_string(), "/etc/wicket.toml".to_string()),
        ]);

        let mut loader = ConfigLoader::new();
        loader.apply_env_overrides("WICKET", &vars).unwrap();

        assert_eq!(loader.config.server.http_addr, "127.0.0.1:9000");
        assert_eq!(loader.config.server.shutdown_timeout_secs, 7);
        assert!(!loader.config.server.keep_alive);
        assert_eq!(loader.config.logging.format, LogFormat::Pretty);
        assert!(loader.config.metrics.enabled);
    }

    #[test]
    fn test_env_override_invalid_integer() {
        let mut loader = ConfigLoader::new();
        let result = loader.apply_env_var("WICKET__SERVER__SHUTDOWN_TIMEOUT_SECS", "soon", "WICKET");
        assert!(matches!(result, Err(ConfigError::Override { .. })));
    }

    #[test]
    fn test_env_override_invalid_format() {
        let mut loader = ConfigLoader::new();
        let result = loader.apply_env_var("WICKET__LOGGING__FORMAT", "xml", "WICKET");
        assert!(result.is_err());
    }
}
