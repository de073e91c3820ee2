//! Client for the monitoring backend's REST surface.
//!
//! The backend is a thin proxy over the RabbitMQ Management API. Two of its
//! endpoints matter to a real-time client:
//!
//! - **health**: `{"status": "...", "rabbitMQConnection": "connected" | "disconnected"}`
//! - **topology**: `{"success": true, "data": {"nodes": [...], "edges": [...], "metadata": {...}}}`
//!
//! ## Example
//!
//! ```rust,no_run
//! use rabbitwatch_adapters::management::{ManagementApi, ManagementClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ManagementClient::builder()
//!         .endpoint("http://localhost:3001")
//!         .build();
//!
//!     let health = client.health().await?;
//!     println!("broker reachable: {}", health.is_healthy());
//!
//!     let topology = client.topology().await?;
//!     println!("{} nodes, {} edges", topology.nodes.len(), topology.edges.len());
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use rabbitwatch_types::{HealthReport, TopologyResponse, TopologySnapshot};

use crate::AdapterError;

/// The REST calls a real-time coordinator depends on.
#[async_trait]
pub trait ManagementApi: Send + Sync + fmt::Debug {
    /// Query backend and broker liveness.
    async fn health(&self) -> Result<HealthReport, AdapterError>;

    /// Fetch a full topology snapshot.
    async fn topology(&self) -> Result<TopologySnapshot, AdapterError>;
}

/// HTTP implementation of [`ManagementApi`].
#[derive(Debug, Clone)]
pub struct ManagementClient {
    client: Client,
    endpoint: String,
    health_path: String,
    topology_path: String,
}

impl ManagementClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> ManagementClientBuilder {
        ManagementClientBuilder::default()
    }

    /// Base URL of the backend.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, AdapterError> {
        let url = join_url(&self.endpoint, path);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(AdapterError::Http(format!(
                "{} returned status {}",
                path,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ManagementApi for ManagementClient {
    async fn health(&self) -> Result<HealthReport, AdapterError> {
        self.get_json(&self.health_path).await
    }

    async fn topology(&self) -> Result<TopologySnapshot, AdapterError> {
        let response: TopologyResponse = self.get_json(&self.topology_path).await?;
        unwrap_topology(response)
    }
}

fn unwrap_topology(response: TopologyResponse) -> Result<TopologySnapshot, AdapterError> {
    match response {
        TopologyResponse {
            success: true,
            data: Some(snapshot),
            ..
        } => Ok(snapshot),
        TopologyResponse { success: true, .. } => {
            Err(AdapterError::Parse("topology response has no data".to_string()))
        }
        TopologyResponse { error, .. } => Err(AdapterError::Api(
            error.unwrap_or_else(|| "topology request failed".to_string()),
        )),
    }
}

/// Builder for ManagementClient.
#[derive(Debug, Default)]
pub struct ManagementClientBuilder {
    endpoint: Option<String>,
    health_path: Option<String>,
    topology_path: Option<String>,
    timeout: Option<Duration>,
}

impl ManagementClientBuilder {
    /// Set the backend base URL (e.g., "http://localhost:3001").
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the health endpoint path (default: "/api/health").
    pub fn health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = Some(path.into());
        self
    }

    /// Set the topology endpoint path (default: "/api/rabbitmq/topology").
    pub fn topology_path(mut self, path: impl Into<String>) -> Self {
        self.topology_path = Some(path.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> ManagementClient {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        ManagementClient {
            client,
            endpoint: self
                .endpoint
                .unwrap_or_else(|| "http://localhost:3001".to_string()),
            health_path: self.health_path.unwrap_or_else(|| "/api/health".to_string()),
            topology_path: self
                .topology_path
                .unwrap_or_else(|| "/api/rabbitmq/topology".to_string()),
        }
    }
}

/// Join a base URL and a path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = ManagementClient::builder().build();
        assert_eq!(client.endpoint, "http://localhost:3001");
        assert_eq!(client.health_path, "/api/health");
        assert_eq!(client.topology_path, "/api/rabbitmq/topology");
    }

    #[test]
    fn test_builder_custom() {
        let client = ManagementClient::builder()
            .endpoint("http://monitor.local:8080")
            .health_path("/healthz")
            .topology_path("/topology")
            .timeout(Duration::from_secs(2))
            .build();

        assert_eq!(client.endpoint(), "http://monitor.local:8080");
        assert_eq!(client.health_path, "/healthz");
        assert_eq!(client.topology_path, "/topology");
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://h:1", "/api/health"), "http://h:1/api/health");
        assert_eq!(join_url("http://h:1/", "/api/health"), "http://h:1/api/health");
        assert_eq!(join_url("http://h:1", "ws"), "http://h:1/ws");
    }

    #[test]
    fn test_unwrap_topology() {
        let ok: TopologyResponse =
            serde_json::from_str(r#"{"success":true,"data":{"nodes":[],"edges":[]}}"#).unwrap();
        assert!(unwrap_topology(ok).is_ok());

        let failed: TopologyResponse =
            serde_json::from_str(r#"{"success":false,"error":"management API unreachable"}"#)
                .unwrap();
        match unwrap_topology(failed) {
            Err(AdapterError::Api(msg)) => assert_eq!(msg, "management API unreachable"),
            other => panic!("unexpected {:?}", other),
        }

        let empty: TopologyResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(matches!(unwrap_topology(empty), Err(AdapterError::Parse(_))));
    }

    #[tokio::test]
    async fn unreachable_backend_is_an_error() {
        let client = ManagementClient::builder()
            .endpoint("http://127.0.0.1:1")
            .timeout(Duration::from_millis(500))
            .build();

        assert!(client.health().await.is_err());
    }
}
