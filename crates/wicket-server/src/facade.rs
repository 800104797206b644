//! Process entry point.
//!
//! [`register`] is what a service's `main` calls: it builds the server
//! from a [`Manager`], serves until SIGINT, and returns once the drain
//! completes. Startup problems come back as [`StartupError`]; a failed
//! drain ends the process with exit status 1.

use std::sync::Arc;

use tracing::error;

use crate::config::ServerConfig;
use crate::error::{RouterError, StartupError};
use crate::router::Router;
use crate::server::Server;
use crate::shutdown::{DrainReport, OsInterrupt};

/// The application behind the server.
///
/// The server only asks it for a router, once, at startup. Handlers
/// typically capture the `Arc` to reach application state.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use http::StatusCode;
/// use wicket_server::{envelope, Manager, Router, RouterError};
///
/// struct Greeter {
///     greeting: String,
/// }
///
/// impl Manager for Greeter {
///     fn routes(self: Arc<Self>) -> Result<Router, RouterError> {
///         let mut router = Router::new();
///         router.get(
///             "/hello",
///             envelope(move |_req| {
///                 let greeting = self.greeting.clone();
///                 async move { (Some(greeting), StatusCode::OK, None::<String>) }
///             }),
///         );
///         Ok(router)
///     }
/// }
/// ```
pub trait Manager: Send + Sync + 'static {
    /// Assembles the route table.
    fn routes(self: Arc<Self>) -> Result<Router, RouterError>;
}

/// Builds the server for `manager`, serves until SIGINT, and drains.
///
/// Returns once shutdown completed cleanly. If the drain times out or a
/// second SIGINT forces it, the failure is logged and the process exits
/// with status 1.
///
/// # Errors
///
/// Returns a [`StartupError`] if the interrupt handler cannot be
/// installed, the router cannot be assembled, or the listener cannot be
/// bound.
pub async fn register<M: Manager>(
    manager: Arc<M>,
    config: ServerConfig,
) -> Result<DrainReport, StartupError> {
    let interrupt = OsInterrupt::new().map_err(StartupError::Signal)?;
    let listening = Server::new(manager, config).bind().await?;

    match listening.serve(interrupt).await {
        Ok(report) => Ok(report),
        Err(err) => {
            error!(error = %err, "Server shutdown failed, exiting");
            std::process::exit(1);
        }
    }
}
