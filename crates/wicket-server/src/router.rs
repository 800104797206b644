//! Request routing and path matching.
//!
//! The router maps a method and path to a [`Handler`]. Path templates use
//! `{param}` segments; matched values are stored in the request's
//! extensions as [`PathParams`].
//!
//! Middlewares wrap handlers. Router-wide middlewares are added with
//! [`Router::layer`] and must come before any route; per-route middlewares
//! are passed to [`Router::route_with`]. Misconfigurations are recorded as
//! the router is assembled and reported by [`Router::walk`], which the
//! server runs once at startup.
//!
//! # Example
//!
//! ```rust
//! use http::{Method, StatusCode};
//! use wicket_server::{envelope, path_param, Router};
//!
//! let mut router = Router::new();
//! router.route(
//!     Method::GET,
//!     "/users/{userId}",
//!     envelope(|req| async move {
//!         let id = path_param(&req, "userId").map(str::to_owned);
//!         (id, StatusCode::OK, None::<String>)
//!     }),
//! );
//!
//! let mut seen = Vec::new();
//! router
//!     .walk(|entry| {
//!         seen.push(format!("{} {}", entry.method(), entry.path()));
//!         Ok(())
//!     })
//!     .unwrap();
//! assert_eq!(seen, ["GET /users/{userId}"]);
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderValue, ALLOW};
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;
use serde_json::Value;

use crate::envelope::respond;
use crate::error::{ResponseError, RouterError};

/// A request whose body has already been collected.
pub type HttpRequest = Request<Bytes>;

/// Type alias for the HTTP response body.
pub type ResponseBody = Full<Bytes>;

/// Type alias for the HTTP response.
pub type HttpResponse = Response<ResponseBody>;

/// What a handler produces.
pub type HandlerResult = Result<HttpResponse, ResponseError>;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something that turns a request into a response.
///
/// Implemented for any `Fn(HttpRequest) -> impl Future<Output = HandlerResult>`
/// and for [`Router`] itself.
pub trait Handler: Send + Sync + 'static {
    /// Handles one request.
    fn call(&self, req: HttpRequest) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, req: HttpRequest) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(req))
    }
}

/// A shared, type-erased handler.
pub type BoxedHandler = Arc<dyn Handler>;

/// A named handler wrapper.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use wicket_server::{BoxedHandler, Handler, HttpRequest, Middleware};
///
/// let passthrough = Middleware::new("passthrough", |next: BoxedHandler| {
///     let wrapped: BoxedHandler = Arc::new(move |req: HttpRequest| next.call(req));
///     wrapped
/// });
/// assert_eq!(passthrough.name(), "passthrough");
/// ```
#[derive(Clone)]
pub struct Middleware {
    name: String,
    wrap: Arc<dyn Fn(BoxedHandler) -> BoxedHandler + Send + Sync>,
}

impl Middleware {
    /// Creates a middleware from a function that wraps the next handler.
    pub fn new<F>(name: impl Into<String>, wrap: F) -> Self
    where
        F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            wrap: Arc::new(wrap),
        }
    }

    /// Returns the middleware name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, next: BoxedHandler) -> BoxedHandler {
        (self.wrap)(next)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware").field("name", &self.name).finish()
    }
}

/// Path parameters extracted from a matched route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(HashMap<String, String>);

impl PathParams {
    /// Returns a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the route had no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Returns a path parameter of a routed request.
pub fn path_param<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.extensions()
        .get::<PathParams>()
        .and_then(|params| params.get(name))
}

/// A segment of a path template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PathSegment {
    /// A literal segment (e.g., "users")
    Literal(String),

    /// A parameter segment (e.g., "{userId}")
    Param(String),
}

/// A registered route.
struct Route {
    method: Method,

    /// Path pattern as registered
    pattern: String,

    segments: Vec<PathSegment>,

    /// The endpoint without middlewares
    handler: BoxedHandler,

    /// Outermost first
    middlewares: Vec<Middleware>,

    /// `handler` wrapped by `middlewares`
    chain: BoxedHandler,
}

impl Route {
    fn new(
        method: Method,
        pattern: &str,
        handler: BoxedHandler,
        middlewares: Vec<Middleware>,
    ) -> Result<Self, RouterError> {
        let segments = Self::parse_segments(pattern)?;
        let chain = middlewares
            .iter()
            .rev()
            .fold(Arc::clone(&handler), |next, middleware| middleware.apply(next));

        Ok(Self {
            method,
            pattern: pattern.to_string(),
            segments,
            handler,
            middlewares,
            chain,
        })
    }

    /// Parses a path pattern into segments.
    fn parse_segments(pattern: &str) -> Result<Vec<PathSegment>, RouterError> {
        let invalid = |reason: &str| RouterError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if !pattern.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if let Some(name) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    if name.is_empty() || name.contains(['{', '}']) {
                        return Err(invalid("parameter needs a name"));
                    }
                    Ok(PathSegment::Param(name.to_string()))
                } else if s.contains(['{', '}']) {
                    Err(invalid("unbalanced braces"))
                } else {
                    Ok(PathSegment::Literal(s.to_string()))
                }
            })
            .collect()
    }

    /// Attempts to match this route against a path.
    fn match_path(&self, path: &str) -> Option<PathParams> {
        let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if path_segments.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();

        for (pattern, actual) in self.segments.iter().zip(path_segments) {
            match pattern {
                PathSegment::Literal(expected) => {
                    if expected != actual {
                        return None;
                    }
                }
                PathSegment::Param(name) => {
                    params.insert(name.clone(), actual.to_string());
                }
            }
        }

        Some(PathParams(params))
    }

    /// The pattern with parameter names erased; two routes with the same
    /// method and shape can never both be reached.
    fn shape(&self) -> Vec<Option<&str>> {
        self.segments
            .iter()
            .map(|segment| match segment {
                PathSegment::Literal(s) => Some(s.as_str()),
                PathSegment::Param(_) => None,
            })
            .collect()
    }
}

/// A route as seen by [`Router::walk`].
#[derive(Clone, Copy)]
pub struct RouteEntry<'a> {
    method: &'a Method,
    path: &'a str,
    handler: &'a BoxedHandler,
    middlewares: &'a [Middleware],
}

impl<'a> RouteEntry<'a> {
    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &'a Method {
        self.method
    }

    /// Path pattern as registered.
    #[must_use]
    pub fn path(&self) -> &'a str {
        self.path
    }

    /// The endpoint, without middlewares.
    #[must_use]
    pub fn handler(&self) -> &'a BoxedHandler {
        self.handler
    }

    /// Middlewares wrapping the endpoint, outermost first.
    #[must_use]
    pub fn middlewares(&self) -> &'a [Middleware] {
        self.middlewares
    }
}

impl fmt::Debug for RouteEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", self.method)
            .field("path", &self.path)
            .field("middlewares", &self.middlewares)
            .finish_non_exhaustive()
    }
}

/// HTTP request router.
///
/// Routes are matched in registration order; the first match wins. A path
/// that matches under another method yields `405` with an `Allow` header,
/// anything else `404`. Both fallbacks use the response envelope.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,

    /// Router-wide middlewares, outermost first
    layers: Vec<Middleware>,

    /// Problems found while assembling, reported by `walk`
    errors: Vec<RouterError>,
}

impl Router {
    /// Creates a new empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a middleware that wraps every route registered after it.
    pub fn layer(&mut self, middleware: Middleware) -> &mut Self {
        if !self.routes.is_empty() {
            self.errors.push(RouterError::LayerAfterRoutes {
                name: middleware.name().to_string(),
            });
        }
        self.layers.push(middleware);
        self
    }

    /// Registers a handler for a method and path pattern.
    pub fn route(&mut self, method: Method, pattern: &str, handler: impl Handler) -> &mut Self {
        self.route_with(method, pattern, Vec::new(), handler)
    }

    /// Registers a handler wrapped by route-specific middlewares.
    ///
    /// Router-wide layers run before `middlewares`.
    pub fn route_with(
        &mut self,
        method: Method,
        pattern: &str,
        middlewares: impl IntoIterator<Item = Middleware>,
        handler: impl Handler,
    ) -> &mut Self {
        let chain = self.layers.iter().cloned().chain(middlewares).collect();
        self.insert(method, pattern, Arc::new(handler), chain)
    }

    /// Registers a `GET` route.
    pub fn get(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.route(Method::GET, pattern, handler)
    }

    /// Registers a `POST` route.
    pub fn post(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.route(Method::POST, pattern, handler)
    }

    /// Registers a `PUT` route.
    pub fn put(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.route(Method::PUT, pattern, handler)
    }

    /// Registers a `DELETE` route.
    pub fn delete(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.route(Method::DELETE, pattern, handler)
    }

    /// Mounts every route of `other` under `prefix`.
    ///
    /// The mounted routes keep their own middlewares and are additionally
    /// wrapped by this router's layers.
    pub fn nest(&mut self, prefix: &str, other: Self) -> &mut Self {
        self.errors.extend(other.errors);
        for route in other.routes {
            let pattern = join_paths(prefix, &route.pattern);
            let chain = self
                .layers
                .iter()
                .cloned()
                .chain(route.middlewares)
                .collect();
            self.insert(route.method, &pattern, route.handler, chain);
        }
        self
    }

    fn insert(
        &mut self,
        method: Method,
        pattern: &str,
        handler: BoxedHandler,
        middlewares: Vec<Middleware>,
    ) -> &mut Self {
        match Route::new(method, pattern, handler, middlewares) {
            Ok(route) => self.routes.push(route),
            Err(err) => self.errors.push(err),
        }
        self
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Checks the route table for misconfiguration.
    ///
    /// # Errors
    ///
    /// Returns the first problem recorded during assembly, or
    /// [`RouterError::DuplicateRoute`] when a method and path shape is
    /// registered twice.
    pub fn validate(&self) -> Result<(), RouterError> {
        if let Some(err) = self.errors.first() {
            return Err(err.clone());
        }

        let mut seen = HashSet::new();
        for route in &self.routes {
            if !seen.insert((&route.method, route.shape())) {
                return Err(RouterError::DuplicateRoute {
                    method: route.method.clone(),
                    path: route.pattern.clone(),
                });
            }
        }

        Ok(())
    }

    /// Visits every route in registration order.
    ///
    /// The table is validated first, so `visit` never sees a misconfigured
    /// router.
    ///
    /// # Errors
    ///
    /// Returns the validation error, or the first error `visit` returns.
    pub fn walk<F>(&self, mut visit: F) -> Result<(), RouterError>
    where
        F: FnMut(RouteEntry<'_>) -> Result<(), RouterError>,
    {
        self.validate()?;

        for route in &self.routes {
            visit(RouteEntry {
                method: &route.method,
                path: &route.pattern,
                handler: &route.handler,
                middlewares: &route.middlewares,
            })?;
        }

        Ok(())
    }

    /// Dispatches a request to the first matching route.
    pub fn dispatch(&self, mut req: HttpRequest) -> BoxFuture<'static, HandlerResult> {
        let mut allowed: Vec<&Method> = Vec::new();

        for route in &self.routes {
            let Some(params) = route.match_path(req.uri().path()) else {
                continue;
            };
            if route.method == *req.method() {
                req.extensions_mut().insert(params);
                return route.chain.call(req);
            }
            if !allowed.contains(&&route.method) {
                allowed.push(&route.method);
            }
        }

        let response = if allowed.is_empty() {
            not_found()
        } else {
            method_not_allowed(&allowed)
        };
        Box::pin(std::future::ready(response))
    }
}

impl Handler for Router {
    fn call(&self, req: HttpRequest) -> BoxFuture<'static, HandlerResult> {
        self.dispatch(req)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.len())
            .field("layers", &self.layers)
            .field("errors", &self.errors)
            .finish()
    }
}

fn not_found() -> HandlerResult {
    respond(StatusCode::NOT_FOUND, None::<Value>, Some("not found"))
}

fn method_not_allowed(allowed: &[&Method]) -> HandlerResult {
    let mut response = respond(
        StatusCode::METHOD_NOT_ALLOWED,
        None::<Value>,
        Some("method not allowed"),
    )?;
    let allow = allowed
        .iter()
        .map(|method| method.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    if let Ok(value) = HeaderValue::from_str(&allow) {
        response.headers_mut().insert(ALLOW, value);
    }
    Ok(response)
}

fn join_paths(prefix: &str, pattern: &str) -> String {
    let joined = format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        pattern.trim_start_matches('/')
    );
    if joined.len() > 1 {
        joined.trim_end_matches('/').to_string()
    } else {
        joined
    }
}
