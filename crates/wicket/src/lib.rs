//! # Wicket
//!
//! HTTP serving shell: a listener, a router, a uniform JSON response
//! envelope, and graceful shutdown on SIGINT.
//!
//! ```text
//! register(manager) → routes logged → listener bound → coordinator armed
//!                                                          ↓ SIGINT
//!           exit ← completion ← connections drained ← listener closed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wicket::prelude::*;
//!
//! struct Items;
//!
//! impl Manager for Items {
//!     fn routes(self: Arc<Self>) -> Result<Router, RouterError> {
//!         let mut router = Router::new();
//!         router.get(
//!             "/items/{id}",
//!             envelope(|req| async move {
//!                 let id = path_param(&req, "id").map(str::to_owned);
//!                 (id, StatusCode::OK, None::<String>)
//!             }),
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

#![doc(html_root_url = "https://docs.rs/wicket/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export configuration types
pub use wicket_config as config;

// Re-export server types
pub use wicket_server as server;

// Re-export telemetry types
pub use wicket_telemetry as telemetry;

pub mod demo;
pub mod settings;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use http::StatusCode;

    pub use wicket_server::{
        envelope, json_response, path_param, register, respond, response_message, BoxedHandler,
        DrainReport, Handler, HttpRequest, HttpResponse, Manager, Middleware, ResponseResource,
        Router, RouterError, ServerConfig, StartupError,
    };
}
