//! Topology refresh signals and snapshots.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What changed in the broker topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyUpdateKind {
    QueueAdded,
    QueueRemoved,
    ExchangeAdded,
    ExchangeRemoved,
    BindingAdded,
    BindingRemoved,
    FullRefresh,
}

/// A signal that the topology should be refetched.
///
/// Clients do not diff topology; `data` is whatever the sender attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyUpdate {
    #[serde(rename = "type")]
    pub kind: TopologyUpdateKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
}

impl TopologyUpdate {
    /// A `full_refresh` update carrying a freshly fetched snapshot.
    pub fn full_refresh(snapshot: &TopologySnapshot) -> Self {
        Self {
            kind: TopologyUpdateKind::FullRefresh,
            data: serde_json::to_value(snapshot).ok(),
            timestamp: crate::now_ms(),
        }
    }
}

/// Topology as served by the backend's topology endpoint.
///
/// Nodes and edges are layout-oriented records the client does not
/// interpret, so they stay as raw JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    #[serde(default)]
    pub nodes: Vec<Value>,
    #[serde(default)]
    pub edges: Vec<Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Envelope returned by the topology endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<TopologySnapshot>,
    #[serde(default)]
    pub error: Option<String>,
}
