//! Error types for adapters.

use thiserror::Error;

/// Errors raised while talking to the monitoring backend.
///
/// None of these are fatal to the process: transports convert them into
/// events and retry, the management client hands them to its caller.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// HTTP request failed or returned a non-success status.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Failed to parse a response body or a pushed frame.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Connection could not be established.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// The backend answered but reported failure in its envelope.
    #[error("API reported failure: {0}")]
    Api(String),

    /// WebSocket protocol error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The remote end closed the stream.
    #[error("Stream closed: {0}")]
    Closed(String),

    /// The configured endpoint is not a usable URL.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout
        } else if err.is_connect() {
            AdapterError::Connection(err.to_string())
        } else if err.is_decode() {
            AdapterError::Parse(err.to_string())
        } else {
            AdapterError::Http(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AdapterError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                AdapterError::Closed("connection closed".to_string())
            }
            WsError::Io(e) => AdapterError::Connection(e.to_string()),
            WsError::Url(e) => AdapterError::InvalidEndpoint(e.to_string()),
            other => AdapterError::WebSocket(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Parse(err.to_string())
    }
}
