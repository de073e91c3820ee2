//! # rabbitwatch
//!
//! A real-time client and terminal dashboard for a RabbitMQ monitoring
//! backend.
//!
//! The backend pushes per-node metrics, message flows and topology change
//! signals over Server-Sent Events or a WebSocket, and serves broker health
//! and the topology graph over REST. This crate keeps a live link to it:
//! it checks broker health before going live, picks a transport (WebSocket
//! when available, SSE otherwise), watches the link with a heartbeat and
//! reconnects with exponential backoff when it is lost.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Application                         │
//! │  ┌─────────┐    ┌────────────┐    ┌──────────┐    ┌────────┐ │
//! │  │ adapters│───▶│ coordinator│───▶│   live   │───▶│   ui   │ │
//! │  │ SSE / WS│    │ (actor)    │    │ (caches) │    │        │ │
//! │  └─────────┘    └─────┬──────┘    └──────────┘    └────────┘ │
//! │                       │                                      │
//! │                       ▼                                      │
//! │                 ┌───────────┐                                │
//! │                 │ management│◀── /api/health, topology       │
//! │                 └───────────┘                                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`coordinator`]**: the [`Coordinator`] handle and its actor. Health
//!   check, transport selection, heartbeat and backoff live here.
//! - **[`live`]**: presentation caches ([`MetricsCache`], [`FlowLog`]) and
//!   the [`LiveView`] task that keeps them fresh.
//! - **[`config`]**: layered [`Settings`] (defaults, TOML file, environment,
//!   command line).
//! - **[`app`]**, **[`events`]**, **[`ui`]**: the terminal dashboard.
//!
//! Transports and the REST client come from `rabbitwatch-adapters`; wire
//! types from `rabbitwatch-types`. Both are re-exported here.
//!
//! ## Usage
//!
//! ```bash
//! # Dashboard against a local backend
//! rabbitwatch --api-url http://localhost:3001
//!
//! # Force SSE and log to stderr instead of drawing
//! rabbitwatch --transport sse --headless
//! ```
//!
//! ```no_run
//! use rabbitwatch::{Coordinator, LiveView, LiveViewConfig, Settings};
//!
//! # tokio_test::block_on(async {
//! let settings = Settings::default();
//! let coordinator = Coordinator::from_settings(&settings).unwrap();
//! let live = LiveView::spawn(&coordinator, LiveViewConfig::from(&settings));
//! coordinator.connect();
//!
//! let snapshot = live.snapshot();
//! println!("{} with {} nodes", snapshot.status, snapshot.metrics.len());
//! # });
//! ```

pub mod app;
pub mod config;
pub mod coordinator;
pub mod events;
pub mod live;
pub mod ui;

pub use crate::config::{parse_duration, ConfigError, Overrides, Settings};
pub use coordinator::{
    Coordinator, CoordinatorConfig, CoordinatorSnapshot, HeartbeatPolicy, ReconnectPolicy,
};
pub use live::{FlowLog, LiveSnapshot, LiveView, LiveViewConfig, MetricsCache};

pub use rabbitwatch_adapters as adapters;
pub use rabbitwatch_types as types;
