//! Configuration errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a configuration could not be produced.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("config file {} does not exist", path.display())]
    Missing {
        /// Requested path
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Neither TOML nor JSON.
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// Malformed TOML, or a TOML key the schema does not know.
    #[error("malformed TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed JSON, or a JSON key the schema does not know.
    #[error("malformed JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// An environment override did not parse.
    #[error("environment override {var}: {expected}")]
    Override {
        /// Variable name
        var: String,
        /// What the value should look like
        expected: &'static str,
    },

    /// A loaded value failed validation.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Dotted field path, e.g. `server.http_addr`
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
