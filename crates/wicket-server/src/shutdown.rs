//! Graceful shutdown coordination.
//!
//! The [`ShutdownCoordinator`] runs as its own task next to the accept
//! loop and moves through three states:
//!
//! - **Armed**: waits for the [`InterruptSource`] (SIGINT by default), or
//!   for the accept loop to stop on its own after a transport failure.
//! - **Draining**: triggers the [`DrainSignal`], waits for the accept loop
//!   to confirm the listener is closed, then waits for open connections
//!   until the deadline.
//! - **Closed**: sends the outcome on the completion channel.
//!
//! The completion channel is a `oneshot`; sending consumes it, so it is
//! closed exactly once.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use tokio::sync::oneshot;
//! use wicket_server::shutdown::{
//!     ConnectionTracker, DrainReason, DrainSignal, ManualInterrupt, ShutdownCoordinator,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (interrupt, handle) = ManualInterrupt::new();
//! let drain = DrainSignal::new();
//! let (closed_tx, closed_rx) = oneshot::channel();
//!
//! let done = ShutdownCoordinator::new(
//!     interrupt,
//!     drain.clone(),
//!     ConnectionTracker::new(),
//!     Duration::from_secs(5),
//! )
//! .spawn(closed_rx);
//!
//! handle.interrupt();
//! drain.recv().await;
//! closed_tx.send(()).unwrap();
//!
//! let report = done.await.unwrap().unwrap();
//! assert_eq!(report.reason, DrainReason::Interrupt);
//! # }
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, oneshot, Notify};
use tracing::{error, info};
use wicket_telemetry::metrics::record_drain;

use crate::error::ShutdownError;
use crate::router::BoxFuture;

/// Source of process interrupts.
///
/// The coordinator awaits it once to start draining, and again while
/// draining to detect a forced shutdown.
pub trait InterruptSource: Send + 'static {
    /// Completes when the next interrupt arrives.
    fn recv(&mut self) -> BoxFuture<'_, ()>;
}

/// SIGINT (Ctrl+C on non-Unix targets).
#[derive(Debug)]
pub struct OsInterrupt {
    #[cfg(unix)]
    signal: tokio::signal::unix::Signal,
}

impl OsInterrupt {
    /// Registers interest in SIGINT.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal handler cannot be installed.
    pub fn new() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let signal = signal(SignalKind::interrupt())?;
            Ok(Self { signal })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }
}

impl InterruptSource for OsInterrupt {
    fn recv(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            #[cfg(unix)]
            {
                // `None` means the signal driver is gone; no interrupt can arrive.
                if self.signal.recv().await.is_none() {
                    std::future::pending::<()>().await;
                }
            }

            #[cfg(not(unix))]
            {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    error!(error = %err, "Failed to listen for Ctrl+C");
                    std::future::pending::<()>().await;
                }
            }

            info!("Received SIGINT");
        })
    }
}

/// An interrupt source driven by an [`InterruptHandle`].
///
/// Once every handle is dropped, `recv` never completes.
#[derive(Debug)]
pub struct ManualInterrupt {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Sends interrupts to a [`ManualInterrupt`].
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualInterrupt {
    /// Creates a source and the handle that drives it.
    #[must_use]
    pub fn new() -> (Self, InterruptHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, InterruptHandle { tx })
    }
}

impl InterruptHandle {
    /// Delivers one interrupt.
    ///
    /// Returns `false` once the source has been dropped.
    pub fn interrupt(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

impl InterruptSource for ManualInterrupt {
    fn recv(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.rx.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
        })
    }
}

/// Tells the accept loop and every connection to wind down.
///
/// Cloned freely; all clones observe the same trigger. Triggering is
/// idempotent.
#[derive(Debug, Clone)]
pub struct DrainSignal {
    triggered: Arc<AtomicBool>,
    sender: broadcast::Sender<()>,
}

impl DrainSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    /// Triggers the drain.
    pub fn trigger(&self) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // No receivers is fine
            let _ = self.sender.send(());
        }
    }

    /// Returns `true` once the drain has been triggered.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Returns a future that completes when the drain is triggered.
    ///
    /// Completes immediately if it already was. The subscription is taken
    /// when this is called, not when the future is first polled.
    pub fn recv(&self) -> impl Future<Output = ()> + Send + 'static {
        let triggered = Arc::clone(&self.triggered);
        let mut receiver = self.sender.subscribe();

        async move {
            if triggered.load(Ordering::SeqCst) {
                return;
            }
            match receiver.recv().await {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                // Every signal was dropped untriggered
                Err(broadcast::error::RecvError::Closed) => std::future::pending().await,
            }
        }
    }
}

impl Default for DrainSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts live connections.
///
/// # Example
///
/// ```rust
/// use wicket_server::shutdown::ConnectionTracker;
///
/// let tracker = ConnectionTracker::new();
/// let token = tracker.acquire();
/// assert_eq!(tracker.active_connections(), 1);
///
/// drop(token);
/// assert_eq!(tracker.active_connections(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl ConnectionTracker {
    /// Creates a tracker with no connections.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Registers a connection; it counts until the token is dropped.
    #[must_use]
    pub fn acquire(&self) -> ConnectionToken {
        self.active.fetch_add(1, Ordering::SeqCst);
        ConnectionToken {
            active: Arc::clone(&self.active),
            notify: Arc::clone(&self.notify),
        }
    }

    /// Returns the number of live connections.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Waits until no connection is live.
    pub async fn wait_for_shutdown(&self) {
        loop {
            // Register before checking so a release in between is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// A live connection. Dropping it releases the slot.
#[derive(Debug)]
pub struct ConnectionToken {
    active: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl Drop for ConnectionToken {
    fn drop(&mut self) {
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }
}

/// Why the server started draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainReason {
    /// An interrupt arrived.
    Interrupt,
    /// The accept loop failed before any interrupt.
    TransportFailure,
}

/// Summary of a completed drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainReport {
    /// What started the drain.
    pub reason: DrainReason,
    /// Connections open when the drain was triggered.
    pub open_connections: usize,
    /// Time from the drain trigger until the last connection closed.
    pub elapsed: Duration,
}

/// What the coordinator sends on the completion channel.
pub type DrainOutcome = Result<DrainReport, ShutdownError>;

/// Watches for an interrupt and drives the graceful drain.
#[derive(Debug)]
pub struct ShutdownCoordinator<S> {
    interrupt: S,
    drain: DrainSignal,
    tracker: ConnectionTracker,
    deadline: Duration,
}

impl<S: InterruptSource> ShutdownCoordinator<S> {
    /// Creates an armed coordinator.
    pub fn new(
        interrupt: S,
        drain: DrainSignal,
        tracker: ConnectionTracker,
        deadline: Duration,
    ) -> Self {
        Self {
            interrupt,
            drain,
            tracker,
            deadline,
        }
    }

    /// Runs the coordinator on its own task.
    ///
    /// `listener_closed` must be completed (or dropped) by the accept loop
    /// once the listener is gone. Returns the receiving end of the
    /// completion channel.
    pub fn spawn(
        self,
        listener_closed: oneshot::Receiver<()>,
    ) -> oneshot::Receiver<DrainOutcome> {
        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(self.run(listener_closed, done_tx));
        done_rx
    }

    /// Runs the coordinator to completion and reports on `done`.
    pub async fn run(
        self,
        listener_closed: oneshot::Receiver<()>,
        done: oneshot::Sender<DrainOutcome>,
    ) {
        let outcome = self.coordinate(listener_closed).await;

        match &outcome {
            Ok(report) => info!(
                reason = ?report.reason,
                open_connections = report.open_connections,
                elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
                "Graceful shutdown complete"
            ),
            Err(err) => error!(error = %err, "Graceful shutdown failed"),
        }

        // The receiver only goes away if the serving task itself died.
        let _ = done.send(outcome);
    }

    async fn coordinate(self, mut listener_closed: oneshot::Receiver<()>) -> DrainOutcome {
        let Self {
            mut interrupt,
            drain,
            tracker,
            deadline,
        } = self;

        let reason = tokio::select! {
            () = interrupt.recv() => DrainReason::Interrupt,
            _ = &mut listener_closed => DrainReason::TransportFailure,
        };

        // Idle connections start closing as soon as the drain is triggered.
        let open = tracker.active_connections();
        info!(
            reason = ?reason,
            deadline = ?deadline,
            open_connections = open,
            "Draining connections"
        );
        drain.trigger();
        let started = Instant::now();

        let drained = async {
            if reason == DrainReason::Interrupt {
                // A dropped sender means the accept loop is gone too.
                let _ = listener_closed.await;
            }
            info!(
                remaining = tracker.active_connections(),
                "Listener closed, waiting for connections"
            );
            tracker.wait_for_shutdown().await;
        };

        tokio::select! {
            () = drained => {
                let elapsed = started.elapsed();
                record_drain("drained", elapsed);
                Ok(DrainReport {
                    reason,
                    open_connections: open,
                    elapsed,
                })
            }
            () = tokio::time::sleep(deadline) => {
                record_drain("timeout", started.elapsed());
                Err(ShutdownError::DrainTimeout {
                    deadline,
                    remaining: tracker.active_connections(),
                })
            }
            () = interrupt.recv() => {
                record_drain("forced", started.elapsed());
                Err(ShutdownError::Forced {
                    remaining: tracker.active_connections(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot::error::TryRecvError;

    fn coordinator(
        deadline: Duration,
    ) -> (
        ShutdownCoordinator<ManualInterrupt>,
        InterruptHandle,
        DrainSignal,
        ConnectionTracker,
    ) {
        let (interrupt, handle) = ManualInterrupt::new();
        let drain = DrainSignal::new();
        let tracker = ConnectionTracker::new();
        let coordinator =
            ShutdownCoordinator::new(interrupt, drain.clone(), tracker.clone(), deadline);
        (coordinator, handle, drain, tracker)
    }

    #[test]
    fn test_drain_signal_trigger_idempotent() {
        let signal = DrainSignal::new();
        assert!(!signal.is_triggered());

        let clone = signal.clone();
        signal.trigger();
        signal.trigger();
        assert!(clone.is_triggered());
    }

    #[tokio::test]
    async fn test_drain_recv_completes_when_triggered() {
        let signal = DrainSignal::new();
        let trigger = signal.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trigger();
        });

        tokio::time::timeout(Duration::from_secs(1), signal.recv())
            .await
            .expect("recv should complete");
    }

    #[tokio::test]
    async fn test_drain_recv_completes_immediately_if_triggered() {
        let signal = DrainSignal::new();
        signal.trigger();

        tokio::time::timeout(Duration::from_millis(10), signal.recv())
            .await
            .expect("recv should complete immediately");
    }

    #[test]
    fn test_connection_tracker_counts() {
        let tracker = ConnectionTracker::new();
        let first = tracker.acquire();
        let second = tracker.acquire();
        assert_eq!(tracker.active_connections(), 2);

        drop(first);
        assert_eq!(tracker.active_connections(), 1);
        drop(second);
        assert_eq!(tracker.active_connections(), 0);
    }

    #[tokio::test]
    async fn test_connection_tracker_wait_immediate() {
        let tracker = ConnectionTracker::new();
        tokio::time::timeout(Duration::from_millis(10), tracker.wait_for_shutdown())
            .await
            .expect("no connections, nothing to wait for");
    }

    #[tokio::test]
    async fn test_connection_tracker_wait_delayed() {
        let tracker = ConnectionTracker::new();
        let token = tracker.acquire();

        let waiter = tracker.clone();
        let handle = tokio::spawn(async move { waiter.wait_for_shutdown().await });

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            drop(token);
        });

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("wait should complete")
            .expect("task should not panic");
    }

    #[tokio::test]
    async fn test_manual_interrupt() {
        let (mut interrupt, handle) = ManualInterrupt::new();
        assert!(handle.interrupt());

        tokio::time::timeout(Duration::from_millis(50), interrupt.recv())
            .await
            .expect("interrupt should be delivered");

        drop(interrupt);
        assert!(!handle.interrupt());
    }

    #[tokio::test]
    async fn test_manual_interrupt_pending_without_handle() {
        let (mut interrupt, handle) = ManualInterrupt::new();
        drop(handle);

        let result = tokio::time::timeout(Duration::from_millis(20), interrupt.recv()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_interrupt_drains_after_listener_closed() {
        let (coordinator, handle, drain, _tracker) = coordinator(Duration::from_secs(5));
        let (closed_tx, closed_rx) = oneshot::channel();
        let mut done = coordinator.spawn(closed_rx);

        handle.interrupt();
        tokio::time::timeout(Duration::from_secs(1), drain.recv())
            .await
            .expect("drain should be triggered");

        // Still waiting for the accept loop
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(matches!(done.try_recv(), Err(TryRecvError::Empty)));

        closed_tx.send(()).unwrap();
        let report = done.await.unwrap().unwrap();
        assert_eq!(report.reason, DrainReason::Interrupt);
        assert_eq!(report.open_connections, 0);
    }

    #[tokio::test]
    async fn test_waits_for_open_connections() {
        let (coordinator, handle, drain, tracker) = coordinator(Duration::from_secs(5));
        let (closed_tx, closed_rx) = oneshot::channel();
        let token = tracker.acquire();
        let done = coordinator.spawn(closed_rx);

        handle.interrupt();
        drain.recv().await;
        closed_tx.send(()).unwrap();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(token);
        });

        let report = done.await.unwrap().unwrap();
        assert_eq!(report.open_connections, 1);
        assert!(report.elapsed >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_report_counts_connections_open_at_trigger() {
        let (coordinator, handle, drain, tracker) = coordinator(Duration::from_secs(5));
        let (closed_tx, closed_rx) = oneshot::channel();
        let token = tracker.acquire();
        let done = coordinator.spawn(closed_rx);

        // Behaves like an idle keep-alive connection: gone as soon as the drain starts.
        let idle_drain = drain.clone();
        tokio::spawn(async move {
            idle_drain.recv().await;
            drop(token);
        });

        handle.interrupt();
        drain.recv().await;
        while tracker.active_connections() > 0 {
            tokio::task::yield_now().await;
        }
        closed_tx.send(()).unwrap();

        let report = done.await.unwrap().unwrap();
        assert_eq!(report.open_connections, 1);
    }

    #[tokio::test]
    async fn test_transport_failure_drains_without_interrupt() {
        let (coordinator, _handle, drain, _tracker) = coordinator(Duration::from_secs(5));
        let (closed_tx, closed_rx) = oneshot::channel();
        let done = coordinator.spawn(closed_rx);

        closed_tx.send(()).unwrap();

        let report = done.await.unwrap().unwrap();
        assert_eq!(report.reason, DrainReason::TransportFailure);
        assert!(drain.is_triggered());
    }

    #[tokio::test]
    async fn test_deadline_exceeded_is_an_error() {
        let (coordinator, handle, _drain, tracker) = coordinator(Duration::from_millis(50));
        let (closed_tx, closed_rx) = oneshot::channel();
        let _token = tracker.acquire();
        let done = coordinator.spawn(closed_rx);

        handle.interrupt();
        closed_tx.send(()).unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(2), done)
            .await
            .expect("coordinator should give up at the deadline")
            .unwrap();
        assert!(matches!(
            outcome,
            Err(ShutdownError::DrainTimeout { remaining: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_second_interrupt_forces_shutdown() {
        let (coordinator, handle, _drain, tracker) = coordinator(Duration::from_secs(30));
        let (_closed_tx, closed_rx) = oneshot::channel();
        let _token = tracker.acquire();
        let done = coordinator.spawn(closed_rx);

        handle.interrupt();
        handle.interrupt();

        let outcome = tokio::time::timeout(Duration::from_secs(2), done)
            .await
            .expect("second interrupt should end the drain")
            .unwrap();
        assert!(matches!(outcome, Err(ShutdownError::Forced { remaining: 1 })));
    }
}
