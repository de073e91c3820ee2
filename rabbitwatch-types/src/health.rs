//! Health endpoint payload.

use serde::{Deserialize, Serialize};

/// Whether the backend currently holds a connection to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerLink {
    Connected,
    Disconnected,
}

/// Response of the backend's health endpoint.
///
/// The backend may add more fields; only these are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,

    #[serde(rename = "rabbitMQConnection")]
    pub rabbit_mq_connection: BrokerLink,
}

impl HealthReport {
    /// A reachable backend is only healthy if it can reach the broker.
    pub fn is_healthy(&self) -> bool {
        self.rabbit_mq_connection == BrokerLink::Connected
    }
}
