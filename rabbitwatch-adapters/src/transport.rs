//! The push-transport seam and the connection supervisor shared by the
//! SSE and WebSocket adapters.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use rabbitwatch_types::{MessageFlow, Metric, TransportKind};

use crate::frame::Frame;
use crate::subscribers::{Subscribers, Subscription};
use crate::AdapterError;

/// Everything a transport reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The underlying connection is open.
    Connected,
    /// An open connection was lost. The adapter retries on its own.
    Disconnected { reason: String },
    Metrics(Vec<Metric>),
    MessageFlow(Vec<MessageFlow>),
    /// A failed connection attempt or an in-band application error.
    Error(String),
    /// The adapter gave up retrying after this many attempts.
    Exhausted { attempts: u32 },
}

/// A push transport owning exactly one underlying connection.
///
/// `connect` is idempotent: while a connection is open, being opened, or
/// waiting to retry, further calls do nothing. `disconnect` is safe to call
/// at any time and does not emit [`TransportEvent::Disconnected`].
pub trait Transport: Send + Sync + fmt::Debug {
    fn kind(&self) -> TransportKind;

    fn connect(&self);

    fn disconnect(&self);

    fn is_connected(&self) -> bool;

    /// Register for this transport's events. Drop the subscription to
    /// unsubscribe.
    fn subscribe(&self) -> Subscription<TransportEvent>;
}

/// Adapter-local retry policy: fixed interval, bounded attempts.
///
/// This only reacts to socket-level failures. Broker-level health is the
/// coordinator's concern and has its own policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketRetryPolicy {
    /// Wait between attempts.
    pub interval: Duration,
    /// Attempts after the first failure before giving up.
    pub max_attempts: u32,
}

impl Default for SocketRetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 5,
        }
    }
}

/// Handed to a session so it can report progress.
#[derive(Clone)]
pub(crate) struct SessionContext {
    kind: TransportKind,
    events: Subscribers<TransportEvent>,
    open: Arc<AtomicBool>,
    opened: Arc<AtomicBool>,
}

impl SessionContext {
    /// Mark the connection as open.
    pub(crate) fn opened(&self) {
        self.opened.store(true, Ordering::SeqCst);
        self.open.store(true, Ordering::SeqCst);
        info!(transport = %self.kind, "connection established");
        self.events.emit(TransportEvent::Connected);
    }

    fn was_opened(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }

    /// Decode a text frame and forward what it carries.
    ///
    /// Bad frames are logged and dropped; they never end the session.
    pub(crate) fn dispatch(&self, text: &str) {
        match Frame::decode(text) {
            Ok(Frame::Metrics(metrics)) => {
                self.events.emit(TransportEvent::Metrics(metrics));
            }
            Ok(Frame::MessageFlow(flows)) => {
                self.events.emit(TransportEvent::MessageFlow(flows));
            }
            Ok(Frame::Connected(message)) => {
                debug!(transport = %self.kind, ?message, "server greeting");
            }
            Ok(Frame::Error(message)) => {
                warn!(transport = %self.kind, %message, "server reported an error");
                self.events.emit(TransportEvent::Error(message));
            }
            Ok(Frame::Unknown(kind)) => {
                debug!(transport = %self.kind, %kind, "dropping frame of unknown type");
            }
            Err(e) => {
                warn!(transport = %self.kind, error = %e, "dropping malformed frame");
            }
        }
    }
}

struct Running {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Runs a session in a background task and retries it per policy.
pub(crate) struct Supervisor {
    kind: TransportKind,
    policy: SocketRetryPolicy,
    events: Subscribers<TransportEvent>,
    open: Arc<AtomicBool>,
    running: Mutex<Option<Running>>,
}

impl Supervisor {
    pub(crate) fn new(kind: TransportKind, policy: SocketRetryPolicy) -> Self {
        Self {
            kind,
            policy,
            events: Subscribers::new(),
            open: Arc::new(AtomicBool::new(false)),
            running: Mutex::new(None),
        }
    }

    pub(crate) fn subscribe(&self) -> Subscription<TransportEvent> {
        self.events.subscribe()
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Start the retry loop unless one is already alive.
    pub(crate) fn start<F, Fut>(&self, session: F)
    where
        F: Fn(SessionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), AdapterError>> + Send + 'static,
    {
        let mut running = self.lock();
        if let Some(current) = running.as_ref() {
            if !current.handle.is_finished() {
                debug!(transport = %self.kind, "connect ignored: connection already active");
                return;
            }
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(supervise(
            self.kind,
            self.policy,
            self.events.clone(),
            self.open.clone(),
            stop_rx,
            session,
        ));

        *running = Some(Running {
            stop: stop_tx,
            handle,
        });
    }

    /// Stop the retry loop and close the connection.
    pub(crate) fn stop(&self) {
        if let Some(running) = self.lock().take() {
            let _ = running.stop.send(true);
            debug!(transport = %self.kind, "connection stopped");
        }
        self.open.store(false, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn supervise<F, Fut>(
    kind: TransportKind,
    policy: SocketRetryPolicy,
    events: Subscribers<TransportEvent>,
    open: Arc<AtomicBool>,
    mut stop_rx: watch::Receiver<bool>,
    session: F,
) where
    F: Fn(SessionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AdapterError>> + Send + 'static,
{
    let mut attempts: u32 = 0;

    loop {
        let ctx = SessionContext {
            kind,
            events: events.clone(),
            open: open.clone(),
            opened: Arc::new(AtomicBool::new(false)),
        };

        let outcome = tokio::select! {
            outcome = session(ctx.clone()) => outcome,
            _ = stop_rx.changed() => return,
        };
        open.store(false, Ordering::SeqCst);

        let reason = match outcome {
            Ok(()) => "closed by server".to_string(),
            Err(e) => e.to_string(),
        };

        if ctx.was_opened() {
            attempts = 0;
            warn!(transport = %kind, %reason, "connection lost");
            events.emit(TransportEvent::Disconnected { reason });
        } else {
            warn!(transport = %kind, %reason, attempt = attempts, "connection attempt failed");
            events.emit(TransportEvent::Error(reason));
        }

        if attempts >= policy.max_attempts {
            warn!(transport = %kind, attempts, "giving up after maximum retry attempts");
            events.emit(TransportEvent::Exhausted { attempts });
            return;
        }
        attempts += 1;

        debug!(transport = %kind, attempt = attempts, delay = ?policy.interval, "retrying");
        tokio::select! {
            _ = tokio::time::sleep(policy.interval) => {}
            _ = stop_rx.changed() => return,
        }
    }
}

/// Events up to and including `Exhausted`, or panics after a minute.
#[cfg(test)]
pub(crate) async fn until_exhausted(
    events: &mut Subscription<TransportEvent>,
) -> Vec<TransportEvent> {
    let collect = async {
        let mut seen = Vec::new();
        while let Some(event) = events.recv().await {
            let done = matches!(event, TransportEvent::Exhausted { .. });
            seen.push(event);
            if done {
                break;
            }
        }
        seen
    };
    tokio::time::timeout(Duration::from_secs(60), collect)
        .await
        .expect("transport did not exhaust in time")
}
