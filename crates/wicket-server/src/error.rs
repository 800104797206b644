//! Error types for the serving shell.
//!
//! Startup failures ([`StartupError`]) are returned before any connection
//! is accepted. Failures after serving starts ([`ShutdownError`]) are
//! terminal for the process. [`ServerError`] carries either kind for
//! callers that run the whole lifecycle.

use std::io;
use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

use http::Method;
use thiserror::Error;

/// Misconfiguration reported by the router walk.
#[derive(Debug, Clone, Error)]
pub enum RouterError {
    /// The same method and path shape was registered twice.
    #[error("duplicate route: {method} {path}")]
    DuplicateRoute {
        /// HTTP method of the second registration
        method: Method,
        /// Path pattern of the second registration
        path: String,
    },

    /// A router-wide middleware was added after routes were registered.
    #[error("middleware '{name}' must be layered before any route is registered")]
    LayerAfterRoutes {
        /// Middleware name
        name: String,
    },

    /// A path pattern could not be parsed.
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// What is wrong with it
        reason: String,
    },
}

/// Failure to produce an HTTP response from a handler result.
///
/// Returned to hyper, which aborts the connection.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// The envelope could not be serialized.
    #[error("failed to serialize response body: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The response head was rejected.
    #[error("failed to build response: {0}")]
    Build(#[from] http::Error),
}

/// Failure before serving starts.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The manager could not assemble its routes, or the route walk failed.
    #[error("router assembly failed: {0}")]
    Router(#[from] RouterError),

    /// The configured listen address is not a socket address.
    #[error("invalid listen address '{addr}': {source}")]
    InvalidAddress {
        /// The configured value
        addr: String,
        /// Parse failure
        #[source]
        source: AddrParseError,
    },

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to bind
        addr: SocketAddr,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The OS interrupt handler could not be registered.
    #[error("failed to register interrupt handler: {0}")]
    Signal(#[source] io::Error),
}

/// Fatal outcome of the graceful drain.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Connections were still open when the deadline elapsed.
    #[error("drain deadline of {deadline:?} exceeded with {remaining} connection(s) still open")]
    DrainTimeout {
        /// Configured deadline
        deadline: Duration,
        /// Connections open when the deadline hit
        remaining: usize,
    },

    /// A second interrupt arrived while draining.
    #[error("interrupted again while draining, abandoning {remaining} connection(s)")]
    Forced {
        /// Connections open when the drain was abandoned
        remaining: usize,
    },
}

/// Failure of a running server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The server never started serving.
    #[error(transparent)]
    Startup(#[from] StartupError),

    /// The drain did not complete cleanly.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),

    /// The coordinator task ended without reporting an outcome.
    #[error("shutdown coordinator exited without reporting an outcome")]
    CoordinatorLost,
}
