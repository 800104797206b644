//! HTTP server implementation.
//!
//! Built on Hyper and Tokio. The server:
//!
//! - asks the [`Manager`] for its [`Router`] and logs the route table
//! - binds a TCP listener on the configured address
//! - spawns the [`ShutdownCoordinator`] and runs the accept loop on the
//!   calling task, one task per connection
//! - on drain, stops accepting, drops the listener, and waits for the
//!   coordinator to report
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wicket_server::shutdown::ManualInterrupt;
//! use wicket_server::{Manager, Router, RouterError, Server, ServerConfig};
//!
//! struct Empty;
//!
//! impl Manager for Empty {
//!     fn routes(self: Arc<Self>) -> Result<Router, RouterError> {
//!         Ok(Router::new())
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let (interrupt, handle) = ManualInterrupt::new();
//! let server = Server::new(Arc::new(Empty), ServerConfig::default());
//! let listening = server.bind().await?;
//! println!("listening on {}", listening.local_addr());
//!
//! handle.interrupt();
//! listening.serve(interrupt).await?;
//! # Ok(())
//! # }
//! ```

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use wicket_telemetry::metrics::{
    record_connection_accepted, record_request, ActiveConnectionGuard,
};

use crate::config::ServerConfig;
use crate::envelope::respond;
use crate::error::{ServerError, StartupError};
use crate::facade::Manager;
use crate::route_log::log_routes;
use crate::router::{Handler, HandlerResult, Router};
use crate::shutdown::{
    ConnectionToken, ConnectionTracker, DrainReport, DrainSignal, InterruptSource,
    ShutdownCoordinator,
};

/// First retry delay after a transient accept error.
const INITIAL_ACCEPT_BACKOFF: Duration = Duration::from_millis(5);

/// Retry delay ceiling.
const MAX_ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// ENFILE, EMFILE
#[cfg(unix)]
const FD_EXHAUSTED: [i32; 2] = [23, 24];

/// How the accept loop ended.
#[derive(Debug)]
pub enum ServeExit {
    /// The drain signal stopped the loop. Not an error.
    NormalClosure,
    /// The listener failed in a way retrying will not fix.
    TransportFailure(io::Error),
}

/// The HTTP server, before it is bound.
pub struct Server<M> {
    manager: Arc<M>,
    config: ServerConfig,
}

impl<M: Manager> Server<M> {
    /// Creates a server for `manager`.
    pub fn new(manager: Arc<M>, config: ServerConfig) -> Self {
        Self { manager, config }
    }

    /// Assembles and logs the router, then binds the listener.
    ///
    /// # Errors
    ///
    /// Returns a [`StartupError`] if the router cannot be assembled or
    /// walked, the address does not parse, or the bind fails.
    pub async fn bind(self) -> Result<Listening, StartupError> {
        let router = Arc::clone(&self.manager).routes()?;
        let routes = log_routes(&router)?;

        let addr = self
            .config
            .socket_addr()
            .map_err(|source| StartupError::InvalidAddress {
                addr: self.config.http_addr().to_string(),
                source,
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| StartupError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| StartupError::Bind { addr, source })?;

        debug!(routes, "Router assembled");

        Ok(Listening {
            listener,
            local_addr,
            shared: Arc::new(Shared {
                router,
                config: self.config,
            }),
        })
    }

    /// Binds and serves until `interrupt` fires and the drain completes.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Startup`] for startup failures, otherwise the
    /// drain failure.
    pub async fn run_until<S: InterruptSource>(
        self,
        interrupt: S,
    ) -> Result<DrainReport, ServerError> {
        let listening = self.bind().await?;
        listening.serve(interrupt).await
    }
}

/// A bound server, ready to serve.
pub struct Listening {
    listener: TcpListener,
    local_addr: SocketAddr,
    shared: Arc<Shared>,
}

impl Listening {
    /// Returns the address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves connections until the drain completes.
    ///
    /// The coordinator is spawned before the first accept. Once the accept
    /// loop ends the listener is dropped, the coordinator is told so, and
    /// this waits on the completion channel.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Shutdown`] if the drain timed out or was
    /// forced, [`ServerError::CoordinatorLost`] if the coordinator vanished.
    pub async fn serve<S: InterruptSource>(
        self,
        interrupt: S,
    ) -> Result<DrainReport, ServerError> {
        let Self {
            listener,
            local_addr,
            shared,
        } = self;

        info!(addr = %local_addr, "Server listening on {}", local_addr);

        let drain = DrainSignal::new();
        let tracker = ConnectionTracker::new();
        let (closed_tx, closed_rx) = oneshot::channel();
        let done = ShutdownCoordinator::new(
            interrupt,
            drain.clone(),
            tracker.clone(),
            shared.config.shutdown_timeout(),
        )
        .spawn(closed_rx);

        match accept_loop(listener, &shared, &drain, &tracker).await {
            ServeExit::NormalClosure => info!("Listener closed"),
            ServeExit::TransportFailure(err) => {
                error!(error = %err, "Accept loop failed, listener closed");
            }
        }
        // The coordinator may already be gone after a forced shutdown.
        let _ = closed_tx.send(());

        match done.await {
            Ok(outcome) => outcome.map_err(ServerError::from),
            Err(_) => Err(ServerError::CoordinatorLost),
        }
    }
}

/// Accepts until drained or the listener fails. Owns and drops the listener.
async fn accept_loop(
    listener: TcpListener,
    shared: &Arc<Shared>,
    drain: &DrainSignal,
    tracker: &ConnectionTracker,
) -> ServeExit {
    let stopped = drain.recv();
    tokio::pin!(stopped);
    let mut backoff = None;

    loop {
        let accepted = tokio::select! {
            biased;
            () = &mut stopped => return ServeExit::NormalClosure,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, remote_addr)) => {
                backoff = None;
                spawn_connection(
                    Arc::clone(shared),
                    stream,
                    remote_addr,
                    drain.clone(),
                    tracker.acquire(),
                );
            }
            Err(err) if is_transient_accept_error(&err) => {
                let delay = next_backoff(backoff);
                backoff = Some(delay);
                warn!(error = %err, retry_in = ?delay, "Transient accept error");

                tokio::select! {
                    biased;
                    () = &mut stopped => return ServeExit::NormalClosure,
                    () = tokio::time::sleep(delay) => {}
                }
            }
            Err(err) => return ServeExit::TransportFailure(err),
        }
    }
}

fn spawn_connection(
    shared: Arc<Shared>,
    stream: TcpStream,
    remote_addr: SocketAddr,
    drain: DrainSignal,
    token: ConnectionToken,
) {
    record_connection_accepted();

    if let Err(err) = stream.set_nodelay(true) {
        warn!(%remote_addr, error = %err, "Failed to set TCP_NODELAY");
    }

    tokio::spawn(async move {
        let _active = ActiveConnectionGuard::new();
        if let Err(err) = shared.serve_connection(stream, remote_addr, drain).await {
            debug!(%remote_addr, error = %err, "Connection closed with error");
        }
        drop(token);
    });
}

fn is_transient_accept_error(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    ) {
        return true;
    }

    #[cfg(unix)]
    if let Some(code) = err.raw_os_error() {
        return FD_EXHAUSTED.contains(&code);
    }

    false
}

fn next_backoff(previous: Option<Duration>) -> Duration {
    previous.map_or(INITIAL_ACCEPT_BACKOFF, |delay| {
        (delay * 2).min(MAX_ACCEPT_BACKOFF)
    })
}

/// State shared by every connection task.
struct Shared {
    router: Router,
    config: ServerConfig,
}

impl Shared {
    /// Serves one connection until it closes.
    ///
    /// On drain the in-flight request is allowed to finish, then the
    /// connection closes.
    async fn serve_connection(
        self: Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        drain: DrainSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let shared = Arc::clone(&self);

        let service = service_fn(move |req: Request<Incoming>| {
            let shared = Arc::clone(&shared);
            async move { shared.handle_request(req).await }
        });

        let conn = http1::Builder::new()
            .keep_alive(self.config.keep_alive())
            .serve_connection(io, service);
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => result,
            () = drain.recv() => {
                debug!(%remote_addr, "Draining connection");
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        }
    }

    /// Collects the body and dispatches through the router.
    async fn handle_request(&self, req: Request<Incoming>) -> HandlerResult {
        let (parts, body) = req.into_parts();
        let method = parts.method.clone();
        debug!(method = %parts.method, path = parts.uri.path(), "Request");

        let collected =
            tokio::time::timeout(self.config.request_timeout(), body.collect()).await;

        let body = match collected {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(err)) => {
                warn!(error = %err, "Failed to read request body");
                return finish(
                    &method,
                    respond(
                        StatusCode::BAD_REQUEST,
                        None::<Value>,
                        Some(format!("failed to read request body: {err}")),
                    ),
                );
            }
            Err(_) => {
                warn!("Request body collection timed out");
                return finish(
                    &method,
                    respond(
                        StatusCode::REQUEST_TIMEOUT,
                        None::<Value>,
                        Some("request body timed out"),
                    ),
                );
            }
        };

        let response = self.router.call(Request::from_parts(parts, body)).await;
        finish(&method, response)
    }
}

fn finish(method: &Method, response: HandlerResult) -> HandlerResult {
    match &response {
        Ok(response) => record_request(method.as_str(), response.status().as_u16()),
        Err(err) => error!(%method, error = %err, "Failed to write response"),
    }
    response
}
