//! A small service used by the `wicket` binary.
//!
//! Exposes three routes behind a request-log middleware:
//!
//! | Method | Path            | Response                                  |
//! |--------|-----------------|-------------------------------------------|
//! | GET    | `/status`       | version and uptime                        |
//! | GET    | `/greet/{name}` | a greeting for `name`                     |
//! | POST   | `/ack`          | `202` with a `{code, message}` body       |

use std::sync::Arc;
use std::time::Instant;

use http::StatusCode;
use serde_json::json;
use tracing::debug;

use wicket_server::{
    envelope, json_response, path_param, response_message, BoxedHandler, Handler, HttpRequest,
    Manager, Middleware, Router, RouterError,
};

use crate::VERSION;

/// Demo service state.
#[derive(Debug)]
pub struct DemoService {
    started: Instant,
}

impl DemoService {
    /// Creates the service, starting its uptime clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for DemoService {
    fn default() -> Self {
        Self::new()
    }
}

impl Manager for DemoService {
    fn routes(self: Arc<Self>) -> Result<Router, RouterError> {
        let mut router = Router::new();
        router.layer(request_log());

        let service = Arc::clone(&self);
        router.get(
            "/status",
            envelope(move |_req| {
                let uptime = service.started.elapsed();
                async move {
                    let status = json!({
                        "version": VERSION,
                        "uptime_secs": uptime.as_secs(),
                    });
                    (Some(status), StatusCode::OK, None::<String>)
                }
            }),
        );

        router.get(
            "/greet/{name}",
            envelope(|req| async move {
                match path_param(&req, "name").filter(|name| !name.is_empty()) {
                    Some(name) => (
                        Some(json!({ "greeting": format!("hello, {name}") })),
                        StatusCode::OK,
                        None,
                    ),
                    None => (None, StatusCode::BAD_REQUEST, Some("name is required")),
                }
            }),
        );

        router.post("/ack", |req: HttpRequest| async move {
            let message = format!("received {} bytes", req.body().len());
            json_response(
                StatusCode::ACCEPTED,
                &response_message(StatusCode::ACCEPTED, message),
            )
        });

        Ok(router)
    }
}

/// Logs method, path, status, and latency of every request at debug level.
fn request_log() -> Middleware {
    Middleware::new("request-log", |next: BoxedHandler| {
        let wrapped: BoxedHandler = Arc::new(move |req: HttpRequest| {
            let method = req.method().clone();
            let path = req.uri().path().to_owned();
            let started = Instant::now();
            let response = next.call(req);
            async move {
                let result = response.await;
                if let Ok(response) = &result {
                    debug!(
                        method = %method,
                        path = %path,
                        status = response.status().as_u16(),
                        latency_ms = started.elapsed().as_millis(),
                        "Request handled"
                    );
                }
                result
            }
        });
        wrapped
    })
}
