//! Connection lifecycle notifications.

use serde::{Deserialize, Serialize};

/// What happened to the client's connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionEventKind {
    Connected,
    Disconnected,
    Reconnecting,
    /// Terminal: automatic reconnection gave up.
    Error,
}

/// A transition in a real-time client's connectivity state.
///
/// These are notifications only; nothing persists them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    #[serde(rename = "type")]
    pub kind: ConnectionEventKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Reconnection attempt number, set on `reconnecting` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,

    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
}

impl ConnectionEvent {
    /// Create an event stamped with the current time.
    pub fn new(kind: ConnectionEventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
            attempt: None,
            timestamp: crate::now_ms(),
        }
    }

    /// A `reconnecting` event for the given attempt.
    pub fn reconnecting(attempt: u32, max_attempts: u32) -> Self {
        Self {
            kind: ConnectionEventKind::Reconnecting,
            message: Some(format!("Reconnecting (attempt {}/{})", attempt, max_attempts)),
            attempt: Some(attempt),
            timestamp: crate::now_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_as_type() {
        let event = ConnectionEvent::reconnecting(3, 5);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "reconnecting");
        assert_eq!(value["attempt"], 3);
        assert_eq!(value["message"], "Reconnecting (attempt 3/5)");
    }
}
