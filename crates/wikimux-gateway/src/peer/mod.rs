//! Peer Connection Manager - discovery, connection lifecycle, and
//! breaker-guarded dispatch for the peer adapter bridge.
//!
//! Failure detection is two-tier and deliberately separate: the polling
//! health probe watches transport-level reachability, while each peer's
//! circuit breaker watches application-level call outcomes. Either alone
//! marks a peer unusable.
//!
//! Candidate state machine: discovered -> connecting -> connected, or
//! connecting -> failed; failed candidates reconnect under exponential
//! backoff until `max_retries`, after which they stay failed until a
//! successful probe revives them. Candidates are removed only on shutdown.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use wikimux_core::{
    BridgeConfig, Clock, DiscoveredServer, PeerHandle, PeerHealth, PeerPayload, PeerStatus,
    PeerTransport, RoutingError,
};

use crate::breaker::{BreakerError, BreakerState, CircuitBreaker};

/// Reconnect backoff base delay.
pub const BACKOFF_BASE: Duration = Duration::from_secs(5);

/// Reconnect backoff cap.
pub const BACKOFF_CAP: Duration = Duration::from_secs(60);

/// Delay before the next reconnect attempt, keyed by how many consecutive
/// attempts have failed: 5s, 10s, 20s, 40s, then capped at 60s.
pub fn backoff_delay(retry_count: u32) -> Duration {
    let exponent = retry_count.saturating_sub(1).min(16);
    let secs = BACKOFF_BASE.as_secs().saturating_mul(1u64 << exponent);
    Duration::from_secs(secs.min(BACKOFF_CAP.as_secs()))
}

/// Diagnostic view of one candidate.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PeerReport {
    pub server: DiscoveredServer,
    pub breaker: BreakerState,
}

struct PeerEntry {
    info: DiscoveredServer,
    handle: Option<Arc<dyn PeerHandle>>,
    breaker: Arc<CircuitBreaker>,
}

impl PeerEntry {
    fn new(
        endpoint: &str,
        health_endpoint: &str,
        health: &PeerHealth,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            info: DiscoveredServer::new(endpoint, health_endpoint, health),
            handle: None,
            breaker: Arc::new(CircuitBreaker::new(clock)),
        }
    }
}

/// Maintains the best-effort, self-healing connection to the peer adapter.
pub struct PeerConnectionManager {
    config: BridgeConfig,
    transport: Arc<dyn PeerTransport>,
    clock: Arc<dyn Clock>,
    peers: DashMap<String, PeerEntry>,
}

impl PeerConnectionManager {
    pub fn new(
        config: BridgeConfig,
        transport: Arc<dyn PeerTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            transport,
            clock,
            peers: DashMap::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// One discovery pass: probe the configured health endpoint and update
    /// the candidate set. A probe failure on a connected peer demotes it.
    pub async fn probe_once(&self) {
        if !self.config.enabled {
            return;
        }

        let endpoint = self.config.endpoint.clone();
        let health_endpoint = self.config.health_endpoint.clone();

        match self
            .transport
            .probe(&health_endpoint, self.config.connect_timeout())
            .await
        {
            Ok(health) => self.on_probe_success(&endpoint, &health_endpoint, health),
            Err(error) => self.on_probe_failure(&endpoint, error).await,
        }
    }

    fn on_probe_success(&self, endpoint: &str, health_endpoint: &str, health: PeerHealth) {
        let newly_discovered = !self.peers.contains_key(endpoint);

        let mut entry = self.peers.entry(endpoint.to_string()).or_insert_with(|| {
            PeerEntry::new(endpoint, health_endpoint, &health, Arc::clone(&self.clock))
        });

        entry.info.server_type = health.server_type.clone();
        entry.info.version = health.version.clone();

        if newly_discovered {
            info!(
                endpoint = %endpoint,
                server_type = %health.server_type,
                version = %health.version,
                "[PeerManager] Discovered peer adapter"
            );
        } else if entry.info.status == PeerStatus::Failed
            && entry.info.retry_count >= self.config.max_retries
        {
            // Rediscovery revives a candidate that exhausted its retries.
            info!(
                endpoint = %endpoint,
                "[PeerManager] Probe succeeded on exhausted peer, scheduling reconnect"
            );
            entry.info.status = PeerStatus::Discovered;
            entry.info.retry_count = 0;
        }
    }

    async fn on_probe_failure(&self, endpoint: &str, error: anyhow::Error) {
        let demoted_handle = {
            let Some(mut entry) = self.peers.get_mut(endpoint) else {
                debug!(
                    endpoint = %endpoint,
                    error = %error,
                    "[PeerManager] Health probe failed, no candidate yet"
                );
                return;
            };

            if entry.info.status != PeerStatus::Connected {
                debug!(
                    endpoint = %endpoint,
                    status = ?entry.info.status,
                    error = %error,
                    "[PeerManager] Health probe failed"
                );
                return;
            }

            warn!(
                endpoint = %endpoint,
                error = %error,
                "[PeerManager] Health probe failed on connected peer, demoting"
            );
            entry.info.status = PeerStatus::Failed;
            entry.info.retry_count = 1;
            entry.info.last_attempt = Some(self.clock.now());
            entry.handle.take()
        };

        if let Some(handle) = demoted_handle {
            let _ = handle.disconnect().await;
        }
    }

    /// One reconnection pass: attempt every candidate whose backoff delay
    /// has elapsed and whose retries are not exhausted.
    pub async fn reconnect_pass(&self) {
        if !self.config.enabled {
            return;
        }

        let now = self.clock.now();
        let due: Vec<String> = self
            .peers
            .iter()
            .filter_map(|entry| {
                let info = &entry.info;
                match info.status {
                    PeerStatus::Discovered => Some(entry.key().clone()),
                    PeerStatus::Failed => {
                        if info.retry_count >= self.config.max_retries {
                            return None;
                        }
                        let delay = backoff_delay(info.retry_count);
                        let due_at = info.last_attempt.map(|t| {
                            t + chrono::Duration::from_std(delay)
                                .unwrap_or(chrono::Duration::MAX)
                        });
                        match due_at {
                            Some(due_at) if now < due_at => None,
                            _ => Some(entry.key().clone()),
                        }
                    }
                    _ => None,
                }
            })
            .collect();

        for endpoint in due {
            self.connect_candidate(&endpoint).await;
        }
    }

    async fn connect_candidate(&self, endpoint: &str) {
        {
            let Some(mut entry) = self.peers.get_mut(endpoint) else {
                return;
            };
            if matches!(
                entry.info.status,
                PeerStatus::Connecting | PeerStatus::Connected
            ) {
                return;
            }
            entry.info.status = PeerStatus::Connecting;
            entry.info.last_attempt = Some(self.clock.now());
        }

        info!(endpoint = %endpoint, "[PeerManager] Connecting to peer");
        let result = self
            .transport
            .connect(endpoint, self.config.connect_timeout())
            .await;

        let Some(mut entry) = self.peers.get_mut(endpoint) else {
            return;
        };
        match result {
            Ok(handle) => {
                entry.info.status = PeerStatus::Connected;
                entry.info.retry_count = 0;
                entry.handle = Some(handle);
                info!(
                    endpoint = %endpoint,
                    server_type = %entry.info.server_type,
                    "[PeerManager] Peer connected"
                );
            }
            Err(error) => {
                entry.info.status = PeerStatus::Failed;
                entry.info.retry_count += 1;
                entry.info.last_attempt = Some(self.clock.now());
                warn!(
                    endpoint = %endpoint,
                    retry_count = entry.info.retry_count,
                    max_retries = self.config.max_retries,
                    error = %error,
                    "[PeerManager] Peer connection failed"
                );
            }
        }
    }

    /// Invoke one tool on a connected peer, routed through that peer's
    /// circuit breaker. An open breaker short-circuits without touching
    /// the network; a timed-out call counts as a failure.
    pub async fn call_tool(
        &self,
        name: &str,
        args: Option<Value>,
    ) -> Result<PeerPayload, RoutingError> {
        let (endpoint, handle, breaker) = self
            .peers
            .iter()
            .find_map(|entry| match (&entry.handle, entry.info.status) {
                (Some(handle), PeerStatus::Connected) => Some((
                    entry.key().clone(),
                    Arc::clone(handle),
                    Arc::clone(&entry.breaker),
                )),
                _ => None,
            })
            .ok_or(RoutingError::PeerUnavailable)?;

        let call_timeout = self.config.connect_timeout();
        let result = breaker
            .execute(|| async move {
                match tokio::time::timeout(call_timeout, handle.call_tool(name, args)).await {
                    Ok(result) => result,
                    Err(_) => Err(anyhow::anyhow!(
                        "peer call timed out after {}s",
                        call_timeout.as_secs()
                    )),
                }
            })
            .await;

        match result {
            Ok(payload) => Ok(payload),
            Err(BreakerError::Open { retry_after }) => Err(RoutingError::CircuitOpen {
                endpoint,
                retry_after,
            }),
            Err(BreakerError::Inner(error)) => Err(RoutingError::PeerCallFailed {
                message: format!("{error:#}"),
            }),
        }
    }

    /// Fetch fresh health info from the peer for user-facing diagnostics.
    pub async fn health_check(&self) -> Result<PeerHealth, RoutingError> {
        if !self.config.enabled {
            return Err(RoutingError::PeerUnavailable);
        }
        self.transport
            .probe(&self.config.health_endpoint, self.config.connect_timeout())
            .await
            .map_err(|e| RoutingError::PeerCallFailed {
                message: format!("{e:#}"),
            })
    }

    pub fn connected_count(&self) -> usize {
        self.peers
            .iter()
            .filter(|e| e.info.status == PeerStatus::Connected)
            .count()
    }

    /// Snapshot of every candidate and its breaker state.
    pub fn snapshot(&self) -> Vec<PeerReport> {
        self.peers
            .iter()
            .map(|entry| PeerReport {
                server: entry.info.clone(),
                breaker: entry.breaker.state(),
            })
            .collect()
    }

    /// Spawn the discovery loop: probe, then reconnect, every poll interval.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if !self.config.enabled {
                debug!("[PeerManager] Bridge disabled, discovery loop not started");
                return;
            }
            let mut ticker = tokio::time::interval(self.config.poll_interval());
            loop {
                ticker.tick().await;
                self.probe_once().await;
                self.reconnect_pass().await;
            }
        })
    }

    /// Disconnect everything and clear the candidate set.
    pub async fn shutdown(&self) {
        let endpoints: Vec<String> = self.peers.iter().map(|e| e.key().clone()).collect();

        let mut handles = Vec::new();
        for endpoint in endpoints {
            if let Some((_, entry)) = self.peers.remove(&endpoint) {
                if let Some(handle) = entry.handle {
                    handles.push(async move {
                        let _ = handle.disconnect().await;
                    });
                }
            }
        }
        futures::future::join_all(handles).await;

        info!("[PeerManager] Shut down, candidate set cleared");
    }
}
