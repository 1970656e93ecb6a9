//! Production implementation of the peer transport port.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use wikimux_core::{PeerHandle, PeerHealth, PeerPayload, PeerTransport};

use crate::probe::probe_health;
use crate::session::PeerSession;

/// Streamable-HTTP + reqwest implementation of the peer transport.
pub struct McpPeerTransport {
    http: reqwest::Client,
}

impl McpPeerTransport {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for McpPeerTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerTransport for McpPeerTransport {
    async fn probe(&self, health_url: &str, timeout: Duration) -> Result<PeerHealth> {
        probe_health(&self.http, health_url, timeout).await
    }

    async fn connect(&self, endpoint: &str, timeout: Duration) -> Result<Arc<dyn PeerHandle>> {
        let session = PeerSession::connect(endpoint, timeout).await?;
        Ok(Arc::new(session))
    }
}

#[async_trait]
impl PeerHandle for PeerSession {
    async fn call_tool(&self, name: &str, args: Option<Value>) -> Result<PeerPayload> {
        PeerSession::call_tool(self, name, args).await
    }

    async fn disconnect(&self) -> Result<()> {
        PeerSession::disconnect(self).await
    }
}
