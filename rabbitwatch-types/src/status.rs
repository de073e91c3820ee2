//! Transport selection and derived connection status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the two push transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Sse,
    #[serde(rename = "websocket")]
    WebSocket,
}

impl TransportKind {
    pub fn label(&self) -> &'static str {
        match self {
            TransportKind::Sse => "SSE",
            TransportKind::WebSocket => "WebSocket",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which transport a client should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportPreference {
    /// WebSocket when the deployment supports it, SSE otherwise.
    #[default]
    Auto,
    Sse,
    #[serde(rename = "websocket")]
    WebSocket,
}

impl TransportPreference {
    /// Resolve the preference to a concrete transport.
    pub fn resolve(self, websocket_available: bool) -> TransportKind {
        match self {
            TransportPreference::Sse => TransportKind::Sse,
            TransportPreference::WebSocket => TransportKind::WebSocket,
            TransportPreference::Auto if websocket_available => TransportKind::WebSocket,
            TransportPreference::Auto => TransportKind::Sse,
        }
    }

    /// Cycle auto -> sse -> websocket -> auto.
    pub fn next(self) -> Self {
        match self {
            TransportPreference::Auto => TransportPreference::Sse,
            TransportPreference::Sse => TransportPreference::WebSocket,
            TransportPreference::WebSocket => TransportPreference::Auto,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportPreference::Auto => "auto",
            TransportPreference::Sse => "sse",
            TransportPreference::WebSocket => "websocket",
        }
    }
}

impl fmt::Display for TransportPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown transport preference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPreference(pub String);

impl fmt::Display for UnknownPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown transport '{}' (expected auto, sse or websocket)", self.0)
    }
}

impl std::error::Error for UnknownPreference {}

impl FromStr for TransportPreference {
    type Err = UnknownPreference;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(TransportPreference::Auto),
            "sse" => Ok(TransportPreference::Sse),
            "websocket" | "ws" => Ok(TransportPreference::WebSocket),
            other => Err(UnknownPreference(other.to_string())),
        }
    }
}

/// Overall link status derived from which transports are open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionStatus {
    DualConnected,
    SseConnected,
    WsConnected,
    Reconnecting,
    Disconnected,
}

impl ConnectionStatus {
    /// Derive the status, in precedence order
    /// dual > sse > ws > reconnecting > disconnected.
    pub fn derive(sse_open: bool, ws_open: bool, reconnect_attempts: u32) -> Self {
        match (sse_open, ws_open) {
            (true, true) => ConnectionStatus::DualConnected,
            (true, false) => ConnectionStatus::SseConnected,
            (false, true) => ConnectionStatus::WsConnected,
            (false, false) if reconnect_attempts > 0 => ConnectionStatus::Reconnecting,
            (false, false) => ConnectionStatus::Disconnected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::DualConnected => "dual-connected",
            ConnectionStatus::SseConnected => "sse-connected",
            ConnectionStatus::WsConnected => "ws-connected",
            ConnectionStatus::Reconnecting => "reconnecting",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }

    /// True for any of the connected variants.
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            ConnectionStatus::DualConnected
                | ConnectionStatus::SseConnected
                | ConnectionStatus::WsConnected
        )
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
