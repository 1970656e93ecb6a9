//! Peer adapter session over Streamable HTTP.
//!
//! One session per established peer connection. The session is handed to
//! the gateway's connection manager as an opaque `PeerHandle`; the manager
//! owns its lifecycle.

use std::time::Duration;

use anyhow::{Context, Result};
use rmcp::{
    model::{CallToolRequestParams, ClientCapabilities, ClientInfo, Implementation},
    service::RunningService,
    transport::StreamableHttpClientTransport,
    ClientHandler, RoleClient, ServiceExt,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use wikimux_core::PeerPayload;

/// Type alias for the connected peer MCP client
pub type PeerClient = RunningService<RoleClient, PeerClientHandler>;

/// Client handler identifying the bridge to the peer adapter
#[derive(Clone)]
pub struct PeerClientHandler {
    info: ClientInfo,
}

impl PeerClientHandler {
    pub fn new() -> Self {
        Self {
            info: ClientInfo {
                protocol_version: Default::default(),
                capabilities: ClientCapabilities::default(),
                client_info: Implementation {
                    name: "wikimux-bridge".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    title: Some("Wikimux Bridge".to_string()),
                    icons: None,
                    website_url: None,
                    ..Default::default()
                },
                meta: None,
            },
        }
    }
}

impl Default for PeerClientHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientHandler for PeerClientHandler {
    fn get_info(&self) -> ClientInfo {
        self.info.clone()
    }
}

/// A connected session with the peer adapter.
pub struct PeerSession {
    endpoint: String,
    client: Mutex<Option<PeerClient>>,
}

impl PeerSession {
    /// Connect to the peer adapter's streamable-HTTP endpoint.
    pub async fn connect(endpoint: &str, timeout: Duration) -> Result<Self> {
        info!(endpoint = %endpoint, "[PeerSession] Connecting to peer adapter");

        let transport = StreamableHttpClientTransport::from_uri(endpoint.to_string());
        let handler = PeerClientHandler::new();

        let client = tokio::time::timeout(timeout, handler.serve(transport))
            .await
            .context("Peer connection timed out")?
            .context("Failed to initialize peer MCP client")?;

        debug!(
            endpoint = %endpoint,
            peer_info = ?client.peer_info(),
            "[PeerSession] Peer connected"
        );

        Ok(Self {
            endpoint: endpoint.to_string(),
            client: Mutex::new(Some(client)),
        })
    }

    /// Call a tool on the peer adapter.
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<PeerPayload> {
        debug!(endpoint = %self.endpoint, tool = %name, "[PeerSession] Calling peer tool");

        let guard = self.client.lock().await;
        let client = guard
            .as_ref()
            .context("Peer session already disconnected")?;

        let args = arguments.and_then(|v| v.as_object().cloned());

        let result = client
            .peer()
            .call_tool(CallToolRequestParams {
                name: name.to_string().into(),
                arguments: args,
                task: None,
                meta: None,
            })
            .await
            .context("Peer tool call failed")?;

        let content = serde_json::to_value(&result.content).unwrap_or(Value::Null);
        Ok(PeerPayload::ToolResult {
            content,
            is_error: result.is_error.unwrap_or(false),
        })
    }

    /// Release the connection. Idempotent.
    pub async fn disconnect(&self) -> Result<()> {
        let client = self.client.lock().await.take();
        if let Some(client) = client {
            info!(endpoint = %self.endpoint, "[PeerSession] Disconnecting from peer adapter");
            client
                .cancel()
                .await
                .context("Failed to cancel peer service")?;
        }
        Ok(())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
