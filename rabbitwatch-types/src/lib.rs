//! # rabbitwatch-types
//!
//! Core types exchanged between a RabbitMQ monitoring backend and the
//! real-time clients that render it. The backend pushes these over
//! Server-Sent Events or a WebSocket and serves health and topology over
//! plain REST; this crate defines the JSON shape of all of it.
//!
//! ## Overview
//!
//! - [`Metric`]: point-in-time measurement for one topology node
//! - [`MessageFlow`]: an observed hop (or multi-hop path) of a message
//! - [`ConnectionEvent`]: a transition in a client's connectivity
//! - [`TopologyUpdate`]: a signal that the topology should be refetched
//! - [`HealthReport`] and [`TopologySnapshot`]: REST payloads
//! - [`TransportKind`], [`TransportPreference`], [`ConnectionStatus`]:
//!   transport selection and derived link status
//!
//! ## Example
//!
//! ```rust
//! use rabbitwatch_types::{Metric, NodeStatus};
//!
//! let json = r#"{"nodeId":"queue-orders","messageRate":12.5,"status":"active","timestamp":1703160000000}"#;
//! let metric: Metric = serde_json::from_str(json).unwrap();
//!
//! assert_eq!(metric.node_id, "queue-orders");
//! assert_eq!(metric.status, NodeStatus::Active);
//! assert!(metric.message_count.is_none());
//! ```

mod event;
mod flow;
mod health;
mod metric;
mod status;
mod topology;

pub use event::*;
pub use flow::*;
pub use health::*;
pub use metric::*;
pub use status::*;
pub use topology::*;

/// Current Unix time in milliseconds.
///
/// All timestamps in this crate use this unit.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
