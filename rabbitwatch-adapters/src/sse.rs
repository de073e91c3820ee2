//! Server-Sent Events transport.
//!
//! Holds one long-lived `text/event-stream` GET open against the backend and
//! decodes each event's `data` as a [`Frame`](crate::frame::Frame).

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;

use rabbitwatch_types::TransportKind;

use crate::subscribers::Subscription;
use crate::transport::{SessionContext, SocketRetryPolicy, Supervisor, Transport, TransportEvent};
use crate::AdapterError;

/// SSE adapter.
///
/// # Example
///
/// ```rust,no_run
/// use rabbitwatch_adapters::{SseTransport, Transport, TransportEvent};
///
/// #[tokio::main]
/// async fn main() {
///     let sse = SseTransport::new("http://localhost:3001/api/events");
///     let mut events = sse.subscribe();
///     sse.connect();
///
///     while let Some(event) = events.recv().await {
///         if let TransportEvent::Metrics(metrics) = event {
///             println!("{} metrics", metrics.len());
///         }
///     }
/// }
/// ```
pub struct SseTransport {
    url: String,
    client: Client,
    supervisor: Supervisor,
}

impl SseTransport {
    /// Create an adapter for the given event-stream URL with the default
    /// retry policy.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_policy(url, SocketRetryPolicy::default())
    }

    pub fn with_policy(url: impl Into<String>, policy: SocketRetryPolicy) -> Self {
        // No overall timeout: the response body never ends on purpose.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            url: url.into(),
            client,
            supervisor: Supervisor::new(TransportKind::Sse, policy),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for SseTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Sse
    }

    fn connect(&self) {
        let client = self.client.clone();
        let url = self.url.clone();
        self.supervisor
            .start(move |ctx| run_session(client.clone(), url.clone(), ctx));
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

impl std::fmt::Debug for SseTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseTransport")
            .field("url", &self.url)
            .field("connected", &self.is_connected())
            .finish()
    }
}

async fn run_session(client: Client, url: String, ctx: SessionContext) -> Result<(), AdapterError> {
    let response = client
        .get(&url)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(AdapterError::Http(format!(
            "event stream returned status {}",
            response.status()
        )));
    }

    ctx.opened();

    let mut decoder = EventStreamDecoder::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        for event in decoder.feed(&chunk?) {
            ctx.dispatch(&event.data);
        }
    }

    Err(AdapterError::Closed("event stream ended".to_string()))
}

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

/// Incremental `text/event-stream` parser.
///
/// Bytes may arrive split anywhere, including inside a UTF-8 sequence;
/// only complete lines are interpreted.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
    id: Option<String>,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let decoded = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let line = decoded.strip_suffix('\r').unwrap_or(&*decoded);

            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event,
            id: self.id.clone(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::until_exhausted;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer exactly one HTTP request with `response`, then stop listening.
    async fn respond_once(response: &'static str) -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/api/events", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            drop(listener);

            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                assert!(n > 0, "client hung up before finishing its request");
                request.extend_from_slice(&buf[..n]);
            }
            let request = String::from_utf8_lossy(&request).to_ascii_lowercase();
            assert!(request.contains("accept: text/event-stream"));

            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        });

        (url, server)
    }

    fn quick_policy(max_attempts: u32) -> SocketRetryPolicy {
        SocketRetryPolicy {
            interval: Duration::from_millis(10),
            max_attempts,
        }
    }

    #[test]
    fn decodes_simple_event() {
        let mut decoder = EventStreamDecoder::new();
        let events = decoder.feed(b"data: {\"type\":\"connected\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"type\":\"connected\"}");
    }

    #[test]
    fn handles_split_chunks_and_crlf() {
        let mut decoder = EventStreamDecoder::new();
        assert!(decoder.feed(b"event: metrics\r\nda").is_empty());
        assert!(decoder.feed(b"ta: first\r\ndata: second\r\n").is_empty());
        let events = decoder.feed(b"\r\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("metrics"));
        assert_eq!(events[0].data, "first\nsecond");
    }

    #[test]
    fn utf8_split_across_chunks() {
        let mut decoder = EventStreamDecoder::new();
        let bytes = "data: µs\n\n".as_bytes();
        // Split inside the two-byte 'µ'.
        assert!(decoder.feed(&bytes[..7]).is_empty());
        let events = decoder.feed(&bytes[7..]);
        assert_eq!(events[0].data, "µs");
    }

    #[test]
    fn comments_and_empty_events_are_skipped() {
        let mut decoder = EventStreamDecoder::new();
        let events = decoder.feed(b": keep-alive\n\nid: 7\n\ndata:x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
        assert_eq!(events[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn multiple_events_in_one_chunk() {
        let mut decoder = EventStreamDecoder::new();
        let events = decoder.feed(b"data: a\n\ndata: b\n\n");
        let data: Vec<_> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn unreachable_endpoint_reports_errors() {
        let sse = SseTransport::with_policy(
            "http://127.0.0.1:1/api/events",
            SocketRetryPolicy {
                interval: Duration::from_secs(5),
                max_attempts: 0,
            },
        );
        let mut events = sse.subscribe();
        sse.connect();

        assert!(matches!(events.recv().await, Some(TransportEvent::Error(_))));
        assert_eq!(
            events.recv().await,
            Some(TransportEvent::Exhausted { attempts: 0 })
        );
        assert!(!sse.is_connected());
    }

    #[tokio::test]
    async fn live_stream_forwards_events_until_closed() {
        let (url, server) = respond_once(concat!(
            "HTTP/1.1 200 OK\r\n",
            "Content-Type: text/event-stream\r\n",
            "Cache-Control: no-cache\r\n",
            "Connection: close\r\n",
            "\r\n",
            ": keep-alive\n\n",
            "data: {\"type\":\"connected\",\"message\":\"hello\"}\n\n",
            "data: {not json}\n\n",
            "event: update\n",
            "data: {\"type\":\"metrics\",\"payload\":{\"nodeId\":\"orders\",\"messageRate\":4.5,\"status\":\"active\",\"timestamp\":1}}\n\n",
        ))
        .await;

        let sse = SseTransport::with_policy(url, quick_policy(1));
        let mut events = sse.subscribe();
        sse.connect();

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
        assert!(!sse.is_connected());
    }

    #[tokio::test]
    async fn error_status_never_opens() {
        let (url, server) = respond_once(concat!(
            "HTTP/1.1 503 Service Unavailable\r\n",
            "Content-Length: 0\r\n",
            "Connection: close\r\n",
            "\r\n",
        ))
        .await;

        let sse = SseTransport::with_policy(url, quick_policy(0));
        let mut events = sse.subscribe();
        sse.connect();

        let seen = until_exhausted(&mut events).await;
        server.await.unwrap();

        assert_eq!(seen.len(), 2, "unexpected events {:?}", seen);
        match &seen[0] {
            TransportEvent::Error(message) => assert!(message.contains("503"), "{}", message),
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(seen[1], TransportEvent::Exhausted { attempts: 0 });
        assert!(!sse.is_connected());
    }
}
