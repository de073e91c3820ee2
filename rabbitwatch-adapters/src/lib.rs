//! # rabbitwatch-adapters
//!
//! Leaf collaborators for a real-time RabbitMQ monitoring client.
//!
//! - **Transports**: [`SseTransport`] and [`WebSocketTransport`] each own one
//!   push connection, decode frames into typed events and retry socket-level
//!   failures on a fixed interval ([`SocketRetryPolicy`]).
//! - **Management API**: [`ManagementClient`] reads the backend's health and
//!   topology endpoints; [`ManagementApi`] is the seam coordinators depend on.
//! - **Fan-out**: [`Subscribers`] delivers every event to every live
//!   [`Subscription`]; dropping a subscription unsubscribes it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rabbitwatch_adapters::{Transport, TransportEvent, WebSocketTransport};
//!
//! #[tokio::main]
//! async fn main() {
//!     let ws = WebSocketTransport::new("ws://localhost:3001/ws");
//!     let mut events = ws.subscribe();
//!     ws.connect();
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             TransportEvent::Metrics(metrics) => println!("{} metrics", metrics.len()),
//!             TransportEvent::Exhausted { .. } => break,
//!             _ => {}
//!         }
//!     }
//! }
//! ```

pub mod error;
pub mod frame;
pub mod management;
pub mod sse;
pub mod subscribers;
pub mod transport;
pub mod websocket;

pub use error::AdapterError;
pub use frame::Frame;
pub use management::{ManagementApi, ManagementClient, ManagementClientBuilder};
pub use sse::SseTransport;
pub use subscribers::{Subscribers, Subscription};
pub use transport::{SocketRetryPolicy, Transport, TransportEvent};
pub use websocket::{websocket_url, WebSocketTransport};

// Re-export types for convenience
pub use rabbitwatch_types::{MessageFlow, Metric, TransportKind};
