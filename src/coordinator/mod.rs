//! Real-time coordinator.
//!
//! Decides whether the client is live, which transport carries the data and
//! how to recover when connectivity is lost. Consumers see one
//! transport-agnostic stream of metrics, flows, topology updates and
//! connection events regardless of whether SSE or WebSocket delivers them.
//!
//! Two retry layers exist on purpose. Each transport retries its own socket
//! on a fixed interval. The coordinator additionally watches the broker
//! through the health endpoint and runs an exponential backoff
//! ([`ReconnectPolicy`]) when the broker link is lost or the heartbeat
//! ([`HeartbeatPolicy`]) goes silent.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rabbitwatch::{Coordinator, Settings};
//!
//! # tokio_test::block_on(async {
//! let settings = Settings::default();
//! let coordinator = Coordinator::from_settings(&settings).unwrap();
//!
//! let mut connection = coordinator.on_connection();
//! let mut metrics = coordinator.on_metrics();
//! coordinator.connect();
//!
//! while let Some(event) = connection.recv().await {
//!     println!("{:?}: {:?}", event.kind, event.message);
//!     while let Some(metric) = metrics.try_recv() {
//!         println!("{} {:.1} msg/s", metric.node_id, metric.message_rate);
//!     }
//! }
//! # });
//! ```

mod actor;
pub mod policy;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::debug;

use rabbitwatch_adapters::management::join_url;
use rabbitwatch_adapters::{
    websocket_url, AdapterError, ManagementApi, ManagementClient, SocketRetryPolicy, SseTransport,
    Subscription, Transport, WebSocketTransport,
};
use rabbitwatch_types::{
    ConnectionEvent, ConnectionStatus, MessageFlow, Metric, TopologyUpdate, TransportPreference,
};

use crate::config::Settings;
use actor::{Actor, Command, Outputs};

pub use policy::{HeartbeatPolicy, ReconnectPolicy};

/// Coordinator tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    /// Initial transport preference.
    pub preference: TransportPreference,
    /// Whether `auto` may pick WebSocket.
    pub websocket_available: bool,
    pub reconnect: ReconnectPolicy,
    pub heartbeat: HeartbeatPolicy,
    /// Pause between teardown and reconnect when the preference changes.
    pub switch_delay: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            preference: TransportPreference::Auto,
            websocket_available: true,
            reconnect: ReconnectPolicy::default(),
            heartbeat: HeartbeatPolicy::default(),
            switch_delay: Duration::from_secs(1),
        }
    }
}

impl From<&Settings> for CoordinatorConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            preference: settings.transport.preference,
            websocket_available: settings.transport.websocket_available,
            reconnect: ReconnectPolicy::from(settings),
            heartbeat: HeartbeatPolicy::from(settings),
            switch_delay: settings.transport.switch_delay,
        }
    }
}

/// Point-in-time view of the coordinator, updated after every transition.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSnapshot {
    pub status: ConnectionStatus,
    pub sse_connected: bool,
    pub ws_connected: bool,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    pub preference: TransportPreference,
    pub heartbeat_active: bool,
    /// Automatic reconnection is exhausted; only `connect()` resumes it.
    pub gave_up: bool,
    pub last_event: Option<ConnectionEvent>,
}

impl CoordinatorSnapshot {
    fn initial(config: &CoordinatorConfig) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            sse_connected: false,
            ws_connected: false,
            reconnect_attempts: 0,
            max_reconnect_attempts: config.reconnect.max_attempts,
            preference: config.preference,
            heartbeat_active: false,
            gave_up: false,
            last_event: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.sse_connected || self.ws_connected
    }
}

/// Handle to a running coordinator task.
///
/// Cheap to clone. Every method returns immediately; effects happen on the
/// coordinator task and become visible through subscriptions and
/// [`snapshot`](Self::snapshot). The task stops on [`shutdown`](Self::shutdown)
/// or when the last handle is dropped.
#[derive(Clone)]
pub struct Coordinator {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<CoordinatorSnapshot>,
    outputs: Outputs,
}

impl Coordinator {
    /// Spawn the coordinator task with the given collaborators.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        api: Arc<dyn ManagementApi>,
        sse: Arc<dyn Transport>,
        ws: Arc<dyn Transport>,
        config: CoordinatorConfig,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(CoordinatorSnapshot::initial(&config));
        let outputs = Outputs::default();

        let actor = Actor::new(api, sse, ws, config, commands_rx, outputs.clone(), state_tx);
        tokio::spawn(actor.run());

        Self {
            commands: commands_tx,
            state: state_rx,
            outputs,
        }
    }

    /// Build the HTTP client and both transports from settings and spawn.
    pub fn from_settings(settings: &Settings) -> Result<Self, AdapterError> {
        let api = ManagementClient::builder()
            .endpoint(settings.api.base_url.clone())
            .health_path(settings.api.health_path.clone())
            .topology_path(settings.api.topology_path.clone())
            .timeout(settings.api.request_timeout)
            .build();

        let retry = SocketRetryPolicy {
            interval: settings.transport.retry_interval,
            max_attempts: settings.transport.retry_attempts,
        };
        let sse = SseTransport::with_policy(
            join_url(&settings.api.base_url, &settings.api.sse_path),
            retry,
        );
        let ws = WebSocketTransport::with_policy(
            websocket_url(&settings.api.base_url, &settings.api.ws_path)?,
            retry,
        );

        Ok(Self::spawn(
            Arc::new(api),
            Arc::new(sse),
            Arc::new(ws),
            CoordinatorConfig::from(settings),
        ))
    }

    /// Health-check the backend, then connect the preferred transport.
    ///
    /// A no-op while a check is running or the preferred transport is
    /// already open. Also resumes after automatic reconnection gave up.
    pub fn connect(&self) {
        self.send(Command::Connect);
    }

    /// Tear down both transports and cancel any pending reconnection.
    pub fn disconnect(&self) {
        self.send(Command::Disconnect);
    }

    /// Change the transport preference. If connected, the current
    /// connection is torn down and re-established after the switch delay.
    pub fn set_transport_preference(&self, preference: TransportPreference) {
        self.send(Command::SetPreference(preference));
    }

    /// Fetch a fresh topology and publish it as a `full_refresh` update.
    /// Failures are logged only.
    pub fn request_topology_refresh(&self) {
        self.send(Command::RefreshTopology);
    }

    /// Stop the coordinator task and both transports.
    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    pub fn on_metrics(&self) -> Subscription<Metric> {
        self.outputs.metrics.subscribe()
    }

    pub fn on_message_flow(&self) -> Subscription<MessageFlow> {
        self.outputs.flows.subscribe()
    }

    pub fn on_topology_update(&self) -> Subscription<TopologyUpdate> {
        self.outputs.topology.subscribe()
    }

    pub fn on_connection(&self) -> Subscription<ConnectionEvent> {
        self.outputs.connection.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.state.borrow().status
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver that changes whenever the snapshot does.
    pub fn watch(&self) -> watch::Receiver<CoordinatorSnapshot> {
        self.state.clone()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("coordinator task has stopped; command dropped");
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("state", &*self.state.borrow())
            .finish()
    }
}
