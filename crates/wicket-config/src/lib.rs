//! Typed configuration for Wicket.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict parsing (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8082"
//! shutdown_timeout_secs = 30
//! request_timeout_ms = 30000
//! keep_alive = true
//!
//! [logging]
//! enabled = true
//! level = "info"
//! format = "json"
//!
//! [metrics]
//! enabled = false
//! addr = "0.0.0.0:9090"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden with `PREFIX__SECTION__KEY`, e.g.
//! `WICKET__SERVER__SHUTDOWN_TIMEOUT_SECS=10`.

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::WicketConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
