//! Background task turning coordinator streams into a renderable snapshot.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use rabbitwatch_types::{
    now_ms, ConnectionEvent, ConnectionStatus, MessageFlow, Metric, TopologySnapshot,
    TopologyUpdate, TopologyUpdateKind, TransportPreference,
};

use super::{FlowLog, MetricsCache};
use crate::config::Settings;
use crate::coordinator::Coordinator;

/// Retention windows and sweep cadence for [`LiveView`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveViewConfig {
    pub metrics_ttl: Duration,
    pub metrics_sweep: Duration,
    pub flows_ttl: Duration,
    pub flows_sweep: Duration,
    pub max_flows: usize,
}

impl Default for LiveViewConfig {
    fn default() -> Self {
        Self {
            metrics_ttl: Duration::from_secs(30),
            metrics_sweep: Duration::from_secs(10),
            flows_ttl: Duration::from_secs(5),
            flows_sweep: Duration::from_secs(2),
            max_flows: 50,
        }
    }
}

impl From<&Settings> for LiveViewConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            metrics_ttl: settings.retention.metrics_ttl,
            metrics_sweep: settings.retention.metrics_sweep,
            flows_ttl: settings.retention.flows_ttl,
            flows_sweep: settings.retention.flows_sweep,
            max_flows: settings.retention.max_flows,
        }
    }
}

/// What a UI draws.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSnapshot {
    /// Latest metric per node, sorted by node id.
    pub metrics: Vec<Metric>,
    /// Recent flows, oldest first.
    pub flows: Vec<MessageFlow>,
    pub status: ConnectionStatus,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    /// Transport preference the coordinator currently applies.
    pub preference: TransportPreference,
    pub last_event: Option<ConnectionEvent>,
    /// Most recent full topology.
    pub topology: Option<TopologySnapshot>,
    /// Topology updates received so far.
    pub topology_updates: u64,
}

impl Default for LiveSnapshot {
    fn default() -> Self {
        Self {
            metrics: Vec::new(),
            flows: Vec::new(),
            status: ConnectionStatus::Disconnected,
            reconnect_attempts: 0,
            max_reconnect_attempts: 0,
            preference: TransportPreference::Auto,
            last_event: None,
            topology: None,
            topology_updates: 0,
        }
    }
}

/// Owns a [`MetricsCache`] and a [`FlowLog`] fed from a coordinator.
///
/// The caches are only touched by the view's task; readers get copies via
/// [`snapshot`](Self::snapshot) or [`watch`](Self::watch). Dropping the view
/// stops the task.
pub struct LiveView {
    state: watch::Receiver<LiveSnapshot>,
    task: JoinHandle<()>,
}

impl LiveView {
    /// Subscribe to `coordinator` and start sweeping. Requests an initial
    /// topology refresh.
    pub fn spawn(coordinator: &Coordinator, config: LiveViewConfig) -> Self {
        let (tx, rx) = watch::channel(LiveSnapshot::default());

        let mut metrics_in = coordinator.on_metrics();
        let mut flows_in = coordinator.on_message_flow();
        let mut topology_in = coordinator.on_topology_update();
        let mut events_in = coordinator.on_connection();
        let mut status_in = coordinator.watch();

        coordinator.request_topology_refresh();

        let task = tokio::spawn(async move {
            let mut state = State {
                metrics: MetricsCache::new(config.metrics_ttl),
                flows: FlowLog::new(config.max_flows, config.flows_ttl),
                snapshot: LiveSnapshot::default(),
            };
            state.sync_status(&status_in.borrow_and_update());

            let mut metrics_sweep =
                tokio::time::interval_at(Instant::now() + config.metrics_sweep, config.metrics_sweep);
            metrics_sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut flows_sweep =
                tokio::time::interval_at(Instant::now() + config.flows_sweep, config.flows_sweep);
            flows_sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    Some(metric) = metrics_in.recv() => state.metrics.apply(metric),
                    Some(flow) = flows_in.recv() => state.flows.push(flow),
                    Some(update) = topology_in.recv() => state.apply_topology(update),
                    Some(event) = events_in.recv() => state.snapshot.last_event = Some(event),
                    changed = status_in.changed() => {
                        if changed.is_err() {
                            debug!("coordinator stopped; live view exiting");
                            break;
                        }
                        state.sync_status(&status_in.borrow_and_update());
                    }
                    _ = metrics_sweep.tick() => {
                        let removed = state.metrics.prune(now_ms());
                        if removed > 0 {
                            debug!(removed, "expired metrics");
                        }
                    }
                    _ = flows_sweep.tick() => {
                        state.flows.prune(now_ms());
                    }
                }

                state.publish(&tx);
            }
        });

        Self { state: rx, task }
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<LiveSnapshot> {
        self.state.clone()
    }
}

impl Drop for LiveView {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct State {
    metrics: MetricsCache,
    flows: FlowLog,
    snapshot: LiveSnapshot,
}

impl State {
    fn sync_status(&mut self, coordinator: &crate::coordinator::CoordinatorSnapshot) {
        self.snapshot.status = coordinator.status;
        self.snapshot.reconnect_attempts = coordinator.reconnect_attempts;
        self.snapshot.max_reconnect_attempts = coordinator.max_reconnect_attempts;
        self.snapshot.preference = coordinator.preference;
    }

    fn apply_topology(&mut self, update: TopologyUpdate) {
        self.snapshot.topology_updates += 1;
        if update.kind != TopologyUpdateKind::FullRefresh {
            return;
        }
        match update.data.map(serde_json::from_value::<TopologySnapshot>) {
            Some(Ok(topology)) => self.snapshot.topology = Some(topology),
            Some(Err(e)) => warn!(error = %e, "unreadable topology in full refresh"),
            None => {}
        }
    }

    fn publish(&mut self, tx: &watch::Sender<LiveSnapshot>) {
        self.snapshot.metrics = self.metrics.snapshot();
        self.snapshot.flows = self.flows.snapshot();
        let next = self.snapshot.clone();
        tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use rabbitwatch_adapters::{
        AdapterError, ManagementApi, Subscribers, Subscription, Transport, TransportEvent,
    };
    use rabbitwatch_types::{BrokerLink, HealthReport, NodeStatus, TransportKind};

    use crate::coordinator::CoordinatorConfig;

    #[derive(Debug)]
    struct StaticApi;

    #[async_trait]
    impl ManagementApi for StaticApi {
        async fn health(&self) -> Result<HealthReport, AdapterError> {
            Ok(HealthReport {
                status: "ok".to_string(),
                rabbit_mq_connection: BrokerLink::Connected,
            })
        }

        async fn topology(&self) -> Result<TopologySnapshot, AdapterError> {
            Ok(TopologySnapshot {
                nodes: vec![serde_json::json!({"id": "orders"}), serde_json::json!({"id": "billing"})],
                ..Default::default()
            })
        }
    }

    #[derive(Debug)]
    struct PushTransport {
        kind: TransportKind,
        events: Subscribers<TransportEvent>,
    }

    impl Transport for PushTransport {
        fn kind(&self) -> TransportKind {
            self.kind
        }
        fn connect(&self) {
            self.events.emit(TransportEvent::Connected);
        }
        fn disconnect(&self) {}
        fn is_connected(&self) -> bool {
            false
        }
        fn subscribe(&self) -> Subscription<TransportEvent> {
            self.events.subscribe()
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    async fn live() -> (Coordinator, Arc<PushTransport>, LiveView) {
        let ws = Arc::new(PushTransport {
            kind: TransportKind::WebSocket,
            events: Subscribers::new(),
        });
        let sse = Arc::new(PushTransport {
            kind: TransportKind::Sse,
            events: Subscribers::new(),
        });
        let coordinator = Coordinator::spawn(
            Arc::new(StaticApi),
            sse,
            ws.clone(),
            CoordinatorConfig::default(),
        );
        let view = LiveView::spawn(&coordinator, LiveViewConfig::default());
        coordinator.connect();
        settle().await;
        (coordinator, ws, view)
    }

    #[tokio::test(start_paused = true)]
    async fn mirrors_status_and_initial_topology() {
        let (_coordinator, _ws, view) = live().await;

        let snapshot = view.snapshot();
        assert_eq!(snapshot.status, ConnectionStatus::WsConnected);
        assert_eq!(snapshot.topology_updates, 1);
        assert_eq!(snapshot.topology.map(|t| t.nodes.len()), Some(2));
        assert!(snapshot.last_event.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn mirrors_preference_changes() {
        let (coordinator, _ws, view) = live().await;
        assert_eq!(view.snapshot().preference, TransportPreference::Auto);

        coordinator.set_transport_preference(TransportPreference::Sse);
        settle().await;
        assert_eq!(view.snapshot().preference, TransportPreference::Sse);
    }

    #[tokio::test(start_paused = true)]
    async fn collects_metrics_and_flows() {
        let (_coordinator, ws, view) = live().await;
        let now = now_ms();

        ws.events.emit(TransportEvent::Metrics(vec![
            Metric::new("orders", 1.0, NodeStatus::Active, now),
            Metric::new("orders", 3.0, NodeStatus::Warning, now),
        ]));
        ws.events.emit(TransportEvent::MessageFlow(vec![
            MessageFlow::new("f1", "orders", "billing", now),
            MessageFlow::new("f1", "orders", "billing", now),
        ]));
        settle().await;

        let snapshot = view.snapshot();
        assert_eq!(snapshot.metrics.len(), 1);
        assert_eq!(snapshot.metrics[0].message_rate, 3.0);
        assert_eq!(snapshot.flows.len(), 2);
        assert_ne!(snapshot.flows[0].id, snapshot.flows[1].id);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_expire_old_entries() {
        let (_coordinator, ws, view) = live().await;
        let long_ago = now_ms().saturating_sub(60_000);

        ws.events.emit(TransportEvent::Metrics(vec![Metric::new(
            "stale",
            1.0,
            NodeStatus::Idle,
            long_ago,
        )]));
        ws.events.emit(TransportEvent::MessageFlow(vec![MessageFlow::new(
            "old", "a", "b", long_ago,
        )]));
        settle().await;
        assert_eq!(view.snapshot().metrics.len(), 1);
        assert_eq!(view.snapshot().flows.len(), 1);

        // Flows are swept every 2s, metrics every 10s.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(view.snapshot().flows.is_empty());
        assert_eq!(view.snapshot().metrics.len(), 1);

        tokio::time::sleep(Duration::from_secs(8)).await;
        assert!(view.snapshot().metrics.is_empty());
    }
}
