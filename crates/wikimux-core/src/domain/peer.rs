//! Peer adapter entities and transport ports.
//!
//! The peer adapter is the separate process serving the second integrated
//! service (the issue tracker). Its responses are modeled as a tagged
//! union of known shapes with an opaque fallback, so parsing failures are
//! typed errors instead of untyped blobs leaking into routing decisions.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of one discovered peer candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerStatus {
    Discovered,
    Connecting,
    Connected,
    Failed,
}

/// Application-level health reply from a peer adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerHealth {
    #[serde(alias = "serverType")]
    pub server_type: String,
    pub version: String,
    pub status: String,
}

/// Known peer response shapes, with an opaque fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerPayload {
    /// Health/diagnostic document
    Health(PeerHealth),
    /// Tool invocation result
    ToolResult { content: Value, is_error: bool },
    /// Well-formed JSON that matches no known shape
    Opaque(Value),
}

impl PeerPayload {
    /// Interpret a raw JSON reply, picking the most specific known shape.
    pub fn parse(value: Value) -> Self {
        if let Ok(health) = serde_json::from_value::<PeerHealth>(value.clone()) {
            return Self::Health(health);
        }
        if let Some(obj) = value.as_object() {
            if obj.contains_key("content") {
                let is_error = obj
                    .get("isError")
                    .or_else(|| obj.get("is_error"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let content = obj.get("content").cloned().unwrap_or(Value::Null);
                return Self::ToolResult { content, is_error };
            }
        }
        Self::Opaque(value)
    }
}

/// One peer adapter candidate tracked by the connection manager.
///
/// Status transitions are owned solely by the manager; candidates are
/// removed only on shutdown. A `Failed` candidate stays in the set and is
/// revived by the discovery probe, never deleted.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredServer {
    pub endpoint: String,
    pub health_endpoint: String,
    pub server_type: String,
    pub version: String,
    pub status: PeerStatus,
    pub last_attempt: Option<DateTime<Utc>>,
    pub retry_count: u32,
}

impl DiscoveredServer {
    pub fn new(
        endpoint: impl Into<String>,
        health_endpoint: impl Into<String>,
        health: &PeerHealth,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            health_endpoint: health_endpoint.into(),
            server_type: health.server_type.clone(),
            version: health.version.clone(),
            status: PeerStatus::Discovered,
            last_attempt: None,
            retry_count: 0,
        }
    }
}

/// An established connection to the peer adapter.
#[async_trait]
pub trait PeerHandle: Send + Sync {
    /// Invoke one tool on the peer and return its typed payload.
    async fn call_tool(&self, name: &str, args: Option<Value>) -> Result<PeerPayload>;

    /// Release the connection.
    async fn disconnect(&self) -> Result<()>;
}

/// Transport port for reaching the peer adapter.
///
/// The production implementation lives in `wikimux-mcp`; tests script a
/// fake. Implementations must treat `timeout` expiry as a failure, not a
/// silent drop.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Issue the lightweight application-level health probe.
    async fn probe(&self, health_url: &str, timeout: Duration) -> Result<PeerHealth>;

    /// Establish a connection to the peer RPC endpoint.
    async fn connect(&self, endpoint: &str, timeout: Duration) -> Result<Arc<dyn PeerHandle>>;
}
