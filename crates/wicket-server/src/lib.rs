//! # Wicket Server
//!
//! HTTP serving shell: a listener, a router, a uniform JSON response
//! envelope, and graceful shutdown on SIGINT.
//!
//! - [`Router`] maps methods and `{param}` paths to [`Handler`]s
//! - [`envelope`] adapts `(data, status, error)` handlers to the router
//! - [`Server`] binds, serves, and drains through the
//!   [`ShutdownCoordinator`](shutdown::ShutdownCoordinator)
//! - [`register`] wires it all up for a [`Manager`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use http::StatusCode;
//! use serde_json::json;
//! use wicket_server::{envelope, register, Manager, Router, RouterError, ServerConfig};
//!
//! struct Items;
//!
//! impl Manager for Items {
//!     fn routes(self: Arc<Self>) -> Result<Router, RouterError> {
//!         let mut router = Router::new();
//!         router.get(
//!             "/items/{id}",
//!             envelope(|_req| async { (Some(json!({"id": 1})), StatusCode::OK, None::<String>) }),
//!         );
//!         Ok(router)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     register(Arc::new(Items), ServerConfig::default()).await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/wicket-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod envelope;
mod error;
mod facade;
mod route_log;
mod router;
mod server;
pub mod shutdown;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use envelope::{
    envelope, json_response, respond, response_message, ResponseResource, JSON_CONTENT_TYPE,
};
pub use error::{ResponseError, RouterError, ServerError, ShutdownError, StartupError};
pub use facade::{register, Manager};
pub use route_log::{describe_routes, log_routes, RouteLine};
pub use router::{
    path_param, BoxFuture, BoxedHandler, Handler, HandlerResult, HttpRequest, HttpResponse,
    Middleware, PathParams, ResponseBody, RouteEntry, Router,
};
pub use server::{Listening, ServeExit, Server};
pub use shutdown::{DrainReason, DrainReport, InterruptSource, ManualInterrupt, OsInterrupt};
