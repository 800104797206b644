//! Startup diagnostics for the route table.

use tracing::info;

use crate::error::RouterError;
use crate::router::Router;

/// A route as it appears in the startup log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteLine {
    /// HTTP method
    pub method: String,
    /// Path pattern
    pub path: String,
    /// Number of middlewares wrapping the handler
    pub middlewares: usize,
}

/// Walks the route table once and describes every route.
///
/// # Errors
///
/// Returns the walk error if the router is misconfigured.
pub fn describe_routes(router: &Router) -> Result<Vec<RouteLine>, RouterError> {
    let mut lines = Vec::with_capacity(router.route_count());
    router.walk(|entry| {
        lines.push(RouteLine {
            method: entry.method().to_string(),
            path: entry.path().to_string(),
            middlewares: entry.middlewares().len(),
        });
        Ok(())
    })?;
    Ok(lines)
}

/// Logs one `info` line per route.
///
/// Returns the number of routes logged.
///
/// # Errors
///
/// Returns the walk error if the router is misconfigured; nothing is
/// logged in that case.
pub fn log_routes(router: &Router) -> Result<usize, RouterError> {
    let lines = describe_routes(router)?;
    for line in &lines {
        info!(
            method = %line.method,
            path = %line.path,
            middlewares = line.middlewares,
            "Route {} {}",
            line.method,
            line.path
        );
    }
    Ok(lines.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{BoxedHandler, HttpRequest, Middleware};
    use crate::{envelope, Handler};
    use http::{Method, StatusCode};
    use std::sync::Arc;

    fn ok() -> impl Handler {
        envelope(|_req| async { (None::<()>, StatusCode::OK, None::<String>) })
    }

    fn passthrough(name: &'static str) -> Middleware {
        Middleware::new(name, |next: BoxedHandler| {
            let wrapped: BoxedHandler = Arc::new(move |req: HttpRequest| next.call(req));
            wrapped
        })
    }

    #[test]
    fn test_describe_routes() {
        let mut router = Router::new();
        router.layer(passthrough("trace"));
        router.get("/status", ok());
        router.route_with(Method::PUT, "/items/{id}", [passthrough("auth")], ok());

        let lines = describe_routes(&router).unwrap();
        assert_eq!(
            lines,
            [
                RouteLine {
                    method: "GET".to_string(),
                    path: "/status".to_string(),
                    middlewares: 1,
                },
                RouteLine {
                    method: "PUT".to_string(),
                    path: "/items/{id}".to_string(),
                    middlewares: 2,
                },
            ]
        );
    }

    #[test]
    fn test_log_routes_counts() {
        let mut router = Router::new();
        router.get("/a", ok());
        router.post("/a", ok());
        assert_eq!(log_routes(&router).unwrap(), 2);
        assert_eq!(log_routes(&Router::new()).unwrap(), 0);
    }

    #[test]
    fn test_log_routes_fails_on_duplicate() {
        let mut router = Router::new();
        router.get("/a", ok());
        router.get("/a", ok());
        assert!(matches!(
            log_routes(&router),
            Err(RouterError::DuplicateRoute { .. })
        ));
    }
}
