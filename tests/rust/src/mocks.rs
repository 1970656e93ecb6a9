//! Mock implementations shared across integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use wikimux_core::{
    AdapterConfig, ConfigError, InstanceConfig, InstanceCredential, PeerHandle, PeerHealth,
    PeerPayload, PeerTransport, SpaceRoute,
};
use wikimux_gateway::ConfigSource;

/// Config source backed by a mutable in-memory document, so tests can
/// simulate reconfiguration between registry reloads.
pub struct StaticConfigSource {
    config: Mutex<AdapterConfig>,
}

impl StaticConfigSource {
    pub fn new(config: AdapterConfig) -> Self {
        Self {
            config: Mutex::new(config),
        }
    }

    /// Replace the document; visible after the next registry reload.
    pub fn set(&self, config: AdapterConfig) {
        *self.config.lock() = config;
    }
}

impl ConfigSource for StaticConfigSource {
    fn load(&self) -> Result<AdapterConfig, ConfigError> {
        Ok(self.config.lock().clone())
    }
}

/// Scripted peer connection for manager tests.
pub struct FakePeerHandle {
    pub fail_calls: AtomicBool,
    pub calls: AtomicUsize,
    pub disconnects: AtomicUsize,
}

impl FakePeerHandle {
    pub fn new() -> Self {
        Self {
            fail_calls: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        }
    }

    pub fn set_fail_calls(&self, fail: bool) {
        self.fail_calls.store(fail, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for FakePeerHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerHandle for FakePeerHandle {
    async fn call_tool(&self, name: &str, _args: Option<serde_json::Value>) -> Result<PeerPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_calls.load(Ordering::SeqCst) {
            return Err(anyhow!("peer call refused"));
        }
        Ok(PeerPayload::ToolResult {
            content: json!([{"type": "text", "text": format!("ok:{name}")}]),
            is_error: false,
        })
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Scripted peer transport: health and connectability toggles plus
/// attempt counters, standing in for the real streamable-HTTP transport.
pub struct FakePeerTransport {
    healthy: AtomicBool,
    connectable: AtomicBool,
    pub probes: AtomicUsize,
    pub connect_attempts: AtomicUsize,
    pub handle: Arc<FakePeerHandle>,
}

impl FakePeerTransport {
    pub fn new() -> Self {
        Self {
            healthy: AtomicBool::new(true),
            connectable: AtomicBool::new(true),
            probes: AtomicUsize::new(0),
            connect_attempts: AtomicUsize::new(0),
            handle: Arc::new(FakePeerHandle::new()),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_connectable(&self, connectable: bool) {
        self.connectable.store(connectable, Ordering::SeqCst);
    }

    pub fn connect_attempt_count(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }
}

impl Default for FakePeerTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerTransport for FakePeerTransport {
    async fn probe(&self, _health_url: &str, _timeout: Duration) -> Result<PeerHealth> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.healthy.load(Ordering::SeqCst) {
            Ok(PeerHealth {
                server_type: "jira-adapter".to_string(),
                version: "1.4.2".to_string(),
                status: "ok".to_string(),
            })
        } else {
            Err(anyhow!("probe refused"))
        }
    }

    async fn connect(&self, _endpoint: &str, _timeout: Duration) -> Result<Arc<dyn PeerHandle>> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if self.connectable.load(Ordering::SeqCst) {
            Ok(Arc::clone(&self.handle) as Arc<dyn PeerHandle>)
        } else {
            Err(anyhow!("connection refused"))
        }
    }
}

/// Instance fixture with a basic credential.
pub fn instance(domain: &str) -> InstanceConfig {
    InstanceConfig::new(
        domain,
        InstanceCredential::Basic {
            email: "bot@example.com".to_string(),
            api_token: "test-token".to_string(),
        },
    )
}

/// Two instances, no default: prod serves ENG/DOCS, staging serves SAND.
pub fn two_instance_config() -> AdapterConfig {
    AdapterConfig {
        instances: vec![
            (
                "prod".to_string(),
                instance("acme.atlassian.net")
                    .with_known_spaces(vec!["ENG".to_string(), "DOCS".to_string()]),
            ),
            (
                "staging".to_string(),
                instance("acme-staging.atlassian.net")
                    .with_known_spaces(vec!["SAND".to_string()]),
            ),
        ],
        space_routes: HashMap::new(),
        default_instance: None,
        bridge: None,
    }
}

/// Single-instance config with no routing hints at all.
pub fn single_instance_config() -> AdapterConfig {
    AdapterConfig {
        instances: vec![("solo".to_string(), instance("solo.atlassian.net"))],
        space_routes: HashMap::new(),
        default_instance: None,
        bridge: None,
    }
}

/// Add a space route to a config.
pub fn with_route(mut config: AdapterConfig, space_key: &str, instance_name: &str) -> AdapterConfig {
    config
        .space_routes
        .insert(space_key.to_string(), SpaceRoute::new(instance_name));
    config
}
