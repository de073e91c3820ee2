//! Message flow events.

use serde::{Deserialize, Serialize};

/// Classification of a flowing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    Normal,
    Priority,
    DeadLetter,
}

/// An observed hop, or synthesized multi-hop path, of a message through
/// the topology.
///
/// Flows are append-only events. Two flows are never merged, even when a
/// producer reuses an `id`; receivers are expected to re-key collisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFlow {
    /// Event identity. Not guaranteed unique by producers.
    pub id: String,

    /// Node the message left.
    pub from_node_id: String,

    /// Node the message arrived at.
    pub to_node_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_key: Option<String>,

    /// Payload size in bytes.
    #[serde(default)]
    pub message_size: u64,

    /// Unix timestamp in milliseconds.
    pub timestamp: u64,

    /// Full path, producer -> exchange -> queue -> consumer, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_path: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<MessageType>,
}

impl MessageFlow {
    /// Create a single-hop flow.
    pub fn new(
        id: impl Into<String>,
        from_node_id: impl Into<String>,
        to_node_id: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            id: id.into(),
            from_node_id: from_node_id.into(),
            to_node_id: to_node_id.into(),
            routing_key: None,
            message_size: 0,
            timestamp,
            flow_path: None,
            message_type: None,
        }
    }

    /// Nodes visited by this flow, in order.
    ///
    /// Falls back to `[from, to]` when no explicit path was reported.
    pub fn hops(&self) -> Vec<&str> {
        match &self.flow_path {
            Some(path) if !path.is_empty() => path.iter().map(String::as_str).collect(),
            _ => vec![self.from_node_id.as_str(), self.to_node_id.as_str()],
        }
    }
}
