//! The task that owns all coordinator state.
//!
//! Everything here runs on one tokio task. Network calls are spawned and
//! report back through `internal`. Connect checks carry the generation they
//! were started under and heartbeat checks carry the heartbeat epoch, so
//! answers arriving after a teardown or a stopped heartbeat are dropped.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use rabbitwatch_adapters::{
    AdapterError, ManagementApi, Subscribers, Subscription, Transport, TransportEvent,
};
use rabbitwatch_types::{
    ConnectionEvent, ConnectionEventKind, ConnectionStatus, HealthReport, MessageFlow, Metric,
    TopologySnapshot, TopologyUpdate, TransportKind, TransportPreference,
};

use super::{CoordinatorConfig, CoordinatorSnapshot};

pub(super) enum Command {
    Connect,
    Disconnect,
    SetPreference(TransportPreference),
    RefreshTopology,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HealthCheck {
    Connect,
    Heartbeat,
}

enum Internal {
    Health {
        epoch: u64,
        check: HealthCheck,
        result: Result<HealthReport, AdapterError>,
    },
    Topology(Result<TopologySnapshot, AdapterError>),
}

/// Fan-out registries shared with the handle.
#[derive(Clone, Default)]
pub(super) struct Outputs {
    pub metrics: Subscribers<Metric>,
    pub flows: Subscribers<MessageFlow>,
    pub topology: Subscribers<TopologyUpdate>,
    pub connection: Subscribers<ConnectionEvent>,
}

/// One transport and what the coordinator knows about it.
struct Link {
    transport: Arc<dyn Transport>,
    events: Subscription<TransportEvent>,
    /// The coordinator asked this transport to connect and has not torn it down.
    engaged: bool,
    open: bool,
}

impl Link {
    fn new(transport: Arc<dyn Transport>) -> Self {
        let events = transport.subscribe();
        Self {
            transport,
            events,
            engaged: false,
            open: false,
        }
    }

    fn engage(&mut self) {
        self.engaged = true;
        self.transport.connect();
    }

    fn release(&mut self) {
        if self.engaged {
            self.transport.disconnect();
        }
        self.engaged = false;
        self.open = false;
    }
}

struct Heartbeat {
    ticker: Interval,
    last_ok: Instant,
    in_flight: bool,
}

pub(super) struct Actor {
    api: Arc<dyn ManagementApi>,
    config: CoordinatorConfig,
    preference: TransportPreference,

    commands: mpsc::UnboundedReceiver<Command>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    outputs: Outputs,
    state: watch::Sender<CoordinatorSnapshot>,

    sse: Link,
    ws: Link,

    generation: u64,
    heartbeat_epoch: u64,
    checking: bool,
    reconnect_attempts: u32,
    reconnect_at: Option<Instant>,
    switch_at: Option<Instant>,
    gave_up: bool,
    heartbeat: Option<Heartbeat>,
    last_event: Option<ConnectionEvent>,
}

impl Actor {
    pub(super) fn new(
        api: Arc<dyn ManagementApi>,
        sse: Arc<dyn Transport>,
        ws: Arc<dyn Transport>,
        config: CoordinatorConfig,
        commands: mpsc::UnboundedReceiver<Command>,
        outputs: Outputs,
        state: watch::Sender<CoordinatorSnapshot>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        Self {
            api,
            preference: config.preference,
            config,
            commands,
            internal_tx,
            internal_rx,
            outputs,
            state,
            sse: Link::new(sse),
            ws: Link::new(ws),
            generation: 0,
            heartbeat_epoch: 0,
            checking: false,
            reconnect_attempts: 0,
            reconnect_at: None,
            switch_at: None,
            gave_up: false,
            heartbeat: None,
            last_event: None,
        }
    }

    pub(super) async fn run(mut self) {
        debug!("coordinator started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(message) = self.internal_rx.recv() => self.handle_internal(message),
                Some(event) = self.sse.events.recv() => {
                    self.handle_transport(TransportKind::Sse, event)
                }
                Some(event) = self.ws.events.recv() => {
                    self.handle_transport(TransportKind::WebSocket, event)
                }
                _ = sleep_until(self.reconnect_at) => {
                    self.reconnect_at = None;
                    debug!(attempt = self.reconnect_attempts, "reconnection due");
                    self.begin_connect();
                }
                _ = sleep_until(self.switch_at) => {
                    self.switch_at = None;
                    info!(preference = %self.preference, "reconnecting with new transport preference");
                    self.begin_connect();
                }
                _ = tick(&mut self.heartbeat) => self.heartbeat_tick(),
            }

            self.publish();
        }

        self.teardown();
        self.publish();
        debug!("coordinator stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => {
                if self.gave_up || self.reconnect_at.is_some() {
                    info!("manual connect");
                }
                self.gave_up = false;
                self.reconnect_at = None;
                self.switch_at = None;
                self.begin_connect();
            }
            Command::Disconnect => {
                let was_connected = self.is_connected();
                self.teardown();
                self.reconnect_at = None;
                self.switch_at = None;
                self.reconnect_attempts = 0;
                self.gave_up = false;
                info!("disconnected by client");
                if was_connected {
                    self.notify(ConnectionEvent::new(
                        ConnectionEventKind::Disconnected,
                        "Disconnected by client",
                    ));
                }
            }
            Command::SetPreference(preference) => self.set_preference(preference),
            Command::RefreshTopology => self.refresh_topology(),
            Command::Shutdown => {}
        }
    }

    fn set_preference(&mut self, preference: TransportPreference) {
        let previous = std::mem::replace(&mut self.preference, preference);
        info!(%previous, %preference, "transport preference changed");

        if self.is_connected() {
            self.teardown();
            self.notify(ConnectionEvent::new(
                ConnectionEventKind::Disconnected,
                format!("Switching transport to {}", preference),
            ));
            self.switch_at = Some(Instant::now() + self.config.switch_delay);
        }
    }

    /// Health check first; a transport is engaged only if the broker is reachable.
    fn begin_connect(&mut self) {
        if self.checking {
            debug!("connect ignored: health check in progress");
            return;
        }

        let kind = self.preference.resolve(self.config.websocket_available);
        if self.link(kind).open {
            debug!(transport = %kind, "connect ignored: already connected");
            return;
        }

        self.generation += 1;
        self.checking = true;
        self.spawn_health(HealthCheck::Connect);
    }

    fn spawn_health(&self, check: HealthCheck) {
        let api = self.api.clone();
        let tx = self.internal_tx.clone();
        let epoch = self.epoch(check);
        tokio::spawn(async move {
            let result = api.health().await;
            let _ = tx.send(Internal::Health {
                epoch,
                check,
                result,
            });
        });
    }

    fn refresh_topology(&self) {
        let api = self.api.clone();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = api.topology().await;
            let _ = tx.send(Internal::Topology(result));
        });
    }

    fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::Health {
                epoch,
                check,
                result,
            } => {
                if epoch != self.epoch(check) {
                    debug!(?check, "ignoring stale health result");
                    return;
                }
                match check {
                    HealthCheck::Connect => self.on_connect_health(result),
                    HealthCheck::Heartbeat => self.on_heartbeat_health(result),
                }
            }
            Internal::Topology(Ok(snapshot)) => {
                debug!(
                    nodes = snapshot.nodes.len(),
                    edges = snapshot.edges.len(),
                    "topology refreshed"
                );
                self.outputs
                    .topology
                    .emit(TopologyUpdate::full_refresh(&snapshot));
            }
            Internal::Topology(Err(e)) => {
                warn!(error = %e, "topology refresh failed");
            }
        }
    }

    fn on_connect_health(&mut self, result: Result<HealthReport, AdapterError>) {
        self.checking = false;

        match result {
            Ok(report) if report.is_healthy() => {
                let kind = self.preference.resolve(self.config.websocket_available);
                info!(transport = %kind, status = %report.status, "backend healthy, connecting");
                self.link_mut(kind).engage();
            }
            Ok(report) => {
                warn!(status = %report.status, "broker disconnected, not connecting");
                self.schedule_reconnect();
            }
            Err(e) => {
                warn!(error = %e, "health check failed");
                self.schedule_reconnect();
            }
        }
    }

    fn on_heartbeat_health(&mut self, result: Result<HealthReport, AdapterError>) {
        let Some(heartbeat) = self.heartbeat.as_mut() else {
            return;
        };
        heartbeat.in_flight = false;

        match result {
            Ok(report) if report.is_healthy() => {
                heartbeat.last_ok = Instant::now();
                debug!("heartbeat ok");
            }
            Ok(report) => {
                warn!(status = %report.status, "heartbeat: broker disconnected");
                self.check_heartbeat_silence();
            }
            Err(e) => {
                warn!(error = %e, "heartbeat failed");
                self.check_heartbeat_silence();
            }
        }
    }

    fn heartbeat_tick(&mut self) {
        if self.check_heartbeat_silence() {
            return;
        }
        if let Some(heartbeat) = self.heartbeat.as_mut() {
            if heartbeat.in_flight {
                debug!("heartbeat skipped: previous check still running");
                return;
            }
            heartbeat.in_flight = true;
            self.spawn_health(HealthCheck::Heartbeat);
        }
    }

    /// Force reconnection if the heartbeat has been silent too long.
    fn check_heartbeat_silence(&mut self) -> bool {
        let stale = self
            .heartbeat
            .as_ref()
            .is_some_and(|hb| self.config.heartbeat.is_stale(hb.last_ok, Instant::now()));

        if stale {
            error!(timeout = ?self.config.heartbeat.timeout, "heartbeat timeout, forcing reconnection");
            self.teardown();
            self.notify(ConnectionEvent::new(
                ConnectionEventKind::Disconnected,
                "heartbeat timeout",
            ));
            self.schedule_reconnect();
        }
        stale
    }

    fn handle_transport(&mut self, kind: TransportKind, event: TransportEvent) {
        if !self.link(kind).engaged {
            debug!(transport = %kind, ?event, "ignoring event from idle transport");
            return;
        }

        match event {
            TransportEvent::Connected => self.on_transport_connected(kind),
            TransportEvent::Disconnected { reason } => self.on_transport_disconnected(kind, reason),
            TransportEvent::Metrics(metrics) => {
                for metric in metrics {
                    self.outputs.metrics.emit(metric);
                }
            }
            TransportEvent::MessageFlow(flows) => {
                for flow in flows {
                    self.outputs.flows.emit(flow);
                }
            }
            TransportEvent::Error(message) => {
                warn!(transport = %kind, %message, "transport error");
            }
            TransportEvent::Exhausted { attempts } => {
                warn!(transport = %kind, attempts, "transport gave up");
                let link = self.link_mut(kind);
                link.engaged = false;
                link.open = false;
                if !self.is_connected() {
                    self.stop_heartbeat();
                    self.schedule_reconnect();
                }
            }
        }
    }

    fn on_transport_connected(&mut self, kind: TransportKind) {
        self.link_mut(kind).open = true;
        self.reconnect_attempts = 0;
        self.reconnect_at = None;
        self.gave_up = false;

        if self.heartbeat.is_none() {
            let now = Instant::now();
            let mut ticker =
                tokio::time::interval_at(now + self.config.heartbeat.interval, self.config.heartbeat.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.heartbeat = Some(Heartbeat {
                ticker,
                last_ok: now,
                in_flight: false,
            });
        }

        info!(transport = %kind, "connected");
        self.notify(ConnectionEvent::new(
            ConnectionEventKind::Connected,
            format!("Connected via {}", kind.label()),
        ));
    }

    fn on_transport_disconnected(&mut self, kind: TransportKind, reason: String) {
        if !self.link(kind).open {
            return;
        }
        self.link_mut(kind).open = false;

        warn!(transport = %kind, %reason, "transport disconnected");
        self.notify(ConnectionEvent::new(ConnectionEventKind::Disconnected, reason));

        if !self.is_connected() {
            self.stop_heartbeat();
            self.schedule_reconnect();
        }
    }

    /// Arm the next outer reconnection, or give up once the budget is spent.
    fn schedule_reconnect(&mut self) {
        if self.reconnect_at.is_some() {
            debug!("reconnection already scheduled");
            return;
        }
        if self.gave_up {
            return;
        }

        let policy = self.config.reconnect;
        if policy.is_exhausted(self.reconnect_attempts) {
            error!(attempts = policy.max_attempts, "maximum reconnection attempts reached");
            self.reconnect_attempts = 0;
            self.gave_up = true;
            self.notify(ConnectionEvent::new(
                ConnectionEventKind::Error,
                format!(
                    "Maximum reconnection attempts ({}) reached",
                    policy.max_attempts
                ),
            ));
            return;
        }

        self.reconnect_attempts += 1;
        let delay = policy.delay(self.reconnect_attempts);
        self.reconnect_at = Some(Instant::now() + delay);
        info!(attempt = self.reconnect_attempts, ?delay, "scheduling reconnection");
        self.notify(ConnectionEvent::reconnecting(
            self.reconnect_attempts,
            policy.max_attempts,
        ));
    }

    /// Drop both transports and every in-flight health check.
    fn teardown(&mut self) {
        self.sse.release();
        self.ws.release();
        self.stop_heartbeat();
        self.checking = false;
        self.generation += 1;
    }

    fn stop_heartbeat(&mut self) {
        if self.heartbeat.take().is_some() {
            self.heartbeat_epoch += 1;
            debug!("heartbeat stopped");
        }
    }

    /// Connect checks are versioned by connection attempt, heartbeat checks
    /// by heartbeat lifetime. A new connect attempt leaves a running
    /// heartbeat check valid.
    fn epoch(&self, check: HealthCheck) -> u64 {
        match check {
            HealthCheck::Connect => self.generation,
            HealthCheck::Heartbeat => self.heartbeat_epoch,
        }
    }

    fn notify(&mut self, event: ConnectionEvent) {
        self.last_event = Some(event.clone());
        self.outputs.connection.emit(event);
    }

    fn is_connected(&self) -> bool {
        self.sse.open || self.ws.open
    }

    fn link(&self, kind: TransportKind) -> &Link {
        match kind {
            TransportKind::Sse => &self.sse,
            TransportKind::WebSocket => &self.ws,
        }
    }

    fn link_mut(&mut self, kind: TransportKind) -> &mut Link {
        match kind {
            TransportKind::Sse => &mut self.sse,
            TransportKind::WebSocket => &mut self.ws,
        }
    }

    fn publish(&self) {
        let next = CoordinatorSnapshot {
            status: ConnectionStatus::derive(self.sse.open, self.ws.open, self.reconnect_attempts),
            sse_connected: self.sse.open,
            ws_connected: self.ws.open,
            reconnect_attempts: self.reconnect_attempts,
            max_reconnect_attempts: self.config.reconnect.max_attempts,
            preference: self.preference,
            heartbeat_active: self.heartbeat.is_some(),
            gave_up: self.gave_up,
            last_event: self.last_event.clone(),
        };
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn tick(heartbeat: &mut Option<Heartbeat>) {
    match heartbeat {
        Some(heartbeat) => {
            heartbeat.ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
