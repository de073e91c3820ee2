//! WebSocket transport.
//!
//! Unlike SSE there are no in-band `connected`/`error` frames here; the
//! socket's own open and close stand in for them.

use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use rabbitwatch_types::TransportKind;

use crate::subscribers::Subscription;
use crate::transport::{SessionContext, SocketRetryPolicy, Supervisor, Transport, TransportEvent};
use crate::AdapterError;

/// WebSocket adapter.
pub struct WebSocketTransport {
    url: String,
    supervisor: Supervisor,
}

impl WebSocketTransport {
    /// Create an adapter for a `ws://` or `wss://` URL with the default
    /// retry policy.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_policy(url, SocketRetryPolicy::default())
    }

    pub fn with_policy(url: impl Into<String>, policy: SocketRetryPolicy) -> Self {
        Self {
            url: url.into(),
            supervisor: Supervisor::new(TransportKind::WebSocket, policy),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for WebSocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    fn connect(&self) {
        let url = self.url.clone();
        self.supervisor
            .start(move |ctx| run_session(url.clone(), ctx));
    }

    fn disconnect(&self) {
        self.supervisor.stop();
    }

    fn is_connected(&self) -> bool {
        self.supervisor.is_connected()
    }

    fn subscribe(&self) -> Subscription<TransportEvent> {
        self.supervisor.subscribe()
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("url", &self.url)
            .field("connected", &self.is_connected())
            .finish()
    }
}

async fn run_session(url: String, ctx: SessionContext) -> Result<(), AdapterError> {
    let (mut socket, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;

    ctx.opened();

    // Pings are answered by tungstenite while we keep reading.
    while let Some(message) = socket.next().await {
        match message? {
            Message::Text(text) => ctx.dispatch(&text),
            Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                Ok(text) => ctx.dispatch(text),
                Err(_) => warn!("dropping non UTF-8 binary frame"),
            },
            Message::Close(frame) => {
                let reason = frame
                    .map(|f| format!("closed by server ({}): {}", f.code, f.reason))
                    .unwrap_or_else(|| "closed by server".to_string());
                debug!(%reason, "websocket close frame");
                return Err(AdapterError::Closed(reason));
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }

    Err(AdapterError::Closed("socket ended".to_string()))
}

/// Derive the WebSocket URL from the backend's HTTP base URL.
///
/// `http` becomes `ws` and `https` becomes `wss`; a URL that already uses a
/// WebSocket scheme is kept.
pub fn websocket_url(base: &str, path: &str) -> Result<String, AdapterError> {
    let base = base.trim_end_matches('/');
    let rest = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        return Err(AdapterError::InvalidEndpoint(base.to_string()));
    };
    Ok(format!("{}/{}", rest, path.trim_start_matches('/')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::until_exhausted;

    #[test]
    fn http_base_maps_to_ws() {
        assert_eq!(
            websocket_url("http://localhost:3001", "/ws").unwrap(),
            "ws://localhost:3001/ws"
        );
        assert_eq!(
            websocket_url("https://monitor.example.com/", "ws").unwrap(),
            "wss://monitor.example.com/ws"
        );
        assert_eq!(
            websocket_url("ws://h:1", "/live").unwrap(),
            "ws://h:1/live"
        );
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert!(matches!(
            websocket_url("amqp://localhost:5672", "/ws"),
            Err(AdapterError::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn live_session_forwards_frames_until_closed() {
        use futures_util::SinkExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Serve one connection, then stop listening so the retry is refused.
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(listener);
            let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();
            socket.send(Message::text("{not json")).await.unwrap();
            socket
                .send(Message::binary(vec![0xff, 0xfe]))
                .await
                .unwrap();
            socket
                .send(Message::text(
                    r#"{"type":"metrics","payload":[{"nodeId":"orders","messageRate":4.5,"status":"active","timestamp":1}]}"#,
                ))
                .await
                .unwrap();
            socket.close(None).await.unwrap();
        });

        let ws = WebSocketTransport::with_policy(
            format!("ws://{}/ws", addr),
            SocketRetryPolicy {
                interval: std::time::Duration::from_millis(10),
                max_attempts: 1,
            },
        );
        let mut events = ws.subscribe();
        ws.connect();

        let seen = until_exhausted(&mut events).await;
        server.await.unwrap();

        assert_eq!(seen.len(), 5, "unexpected events {:?}", seen);
        assert_eq!(seen[0], TransportEvent::Connected);
        match &seen[1] {
            TransportEvent::Metrics(metrics) => {
                assert_eq!(metrics.len(), 1);
                assert_eq!(metrics[0].node_id, "orders");
            }
            other => panic!("expected metrics, got {:?}", other),
        }
        assert!(matches!(seen[2], TransportEvent::Disconnected { .. }));
        assert!(matches!(seen[3], TransportEvent::Error(_)));
        assert_eq!(seen[4], TransportEvent::Exhausted { attempts: 1 });
        assert!(!ws.is_connected());
    }

    #[tokio::test]
    async fn refused_connection_exhausts() {
        let ws = WebSocketTransport::with_policy(
            "ws://127.0.0.1:1/ws",
            SocketRetryPolicy {
                interval: std::time::Duration::from_millis(10),
                max_attempts: 1,
            },
        );
        let mut events = ws.subscribe();
        ws.connect();

        assert!(matches!(events.recv().await, Some(TransportEvent::Error(_))));
        assert!(matches!(events.recv().await, Some(TransportEvent::Error(_))));
        assert_eq!(
            events.recv().await,
            Some(TransportEvent::Exhausted { attempts: 1 })
        );
    }
}
