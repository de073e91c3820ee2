//! Per-node metrics.

use serde::{Deserialize, Serialize};

/// Activity state of a topology node as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Messages are flowing through the node.
    Active,
    /// The node exists but nothing is moving.
    Idle,
    /// The backend flagged the node (e.g. growing backlog).
    Warning,
    /// The backend flagged the node as failing.
    Error,
}

impl NodeStatus {
    /// Short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            NodeStatus::Active => "active",
            NodeStatus::Idle => "idle",
            NodeStatus::Warning => "warning",
            NodeStatus::Error => "error",
        }
    }
}

/// A point-in-time measurement for one topology node.
///
/// `node_id` is stable across updates, so consumers keep at most one
/// `Metric` per node and replace it when a newer one arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    /// Identity of the node (exchange, queue, producer or consumer).
    pub node_id: String,

    /// Messages per second.
    pub message_rate: f64,

    /// Messages currently held by the node, if the backend knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_count: Option<u64>,

    /// Consumers attached to the node, if the backend knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_count: Option<u32>,

    /// Reported activity state.
    pub status: NodeStatus,

    /// Unix timestamp in milliseconds, assigned by the producer.
    pub timestamp: u64,
}

impl Metric {
    /// Create a metric with the required fields.
    pub fn new(node_id: impl Into<String>, message_rate: f64, status: NodeStatus, timestamp: u64) -> Self {
        Self {
            node_id: node_id.into(),
            message_rate,
            message_count: None,
            consumer_count: None,
            status,
            timestamp,
        }
    }

    /// Set the message count.
    pub fn with_message_count(mut self, count: u64) -> Self {
        self.message_count = Some(count);
        self
    }

    /// Set the consumer count.
    pub fn with_consumer_count(mut self, count: u32) -> Self {
        self.consumer_count = Some(count);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_uses_camel_case_fields() {
        let metric = Metric::new("q1", 3.5, NodeStatus::Idle, 1000)
            .with_message_count(7)
            .with_consumer_count(2);

        let value = serde_json::to_value(&metric).unwrap();
        assert_eq!(value["nodeId"], "q1");
        assert_eq!(value["messageRate"], 3.5);
        assert_eq!(value["messageCount"], 7);
        assert_eq!(value["consumerCount"], 2);
        assert_eq!(value["status"], "idle");
    }

    #[test]
    fn optional_counts_are_omitted() {
        let metric = Metric::new("q1", 0.0, NodeStatus::Active, 1);
        let json = serde_json::to_string(&metric).unwrap();
        assert!(!json.contains("messageCount"));
        assert!(!json.contains("consumerCount"));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let json = r#"{"nodeId":"x","messageRate":1,"status":"sleeping","timestamp":1}"#;
        assert!(serde_json::from_str::<Metric>(json).is_err());
    }
}
