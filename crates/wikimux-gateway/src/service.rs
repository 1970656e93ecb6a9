//! AdapterServices - the facade handed to tool handlers.
//!
//! One long-lived owner of all routing state: registry, resolver, page
//! cache, safety boundary, and the peer connection manager. Handlers
//! receive an `Arc<AdapterServices>` instead of touching module globals;
//! tests inject a manual clock and a fake peer transport through the same
//! constructor.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::info;

use wikimux_core::{
    Clock, Direction, InstanceConfig, OperationContext, PeerHealth, PeerPayload, PeerTransport,
    RoutingError,
};

use crate::boundary::{BoundaryVerdict, SafetyBoundary};
use crate::client::ConfluenceClient;
use crate::peer::{PeerConnectionManager, PeerReport};
use crate::registry::page_cache::PageInstanceCache;
use crate::registry::resolver::{InstanceResolver, ResolvedInstance};
use crate::registry::{ConfigSource, InstanceRegistry};

/// Interval for the periodic boundary/cache sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Arguments tool handlers pass for routing.
#[derive(Debug, Clone, Default)]
pub struct ResolveArgs {
    pub instance: Option<String>,
    pub space_key: Option<String>,
    pub page_id: Option<String>,
}

impl ResolveArgs {
    pub fn with_instance(name: impl Into<String>) -> Self {
        Self {
            instance: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_space(space_key: impl Into<String>) -> Self {
        Self {
            space_key: Some(space_key.into()),
            ..Self::default()
        }
    }

    pub fn with_page(page_id: impl Into<String>) -> Self {
        Self {
            page_id: Some(page_id.into()),
            ..Self::default()
        }
    }
}

/// A routed operation: tenant name plus a ready client handle.
#[derive(Clone, Debug)]
pub struct RoutedInstance {
    pub instance_name: String,
    pub client: Arc<ConfluenceClient>,
}

/// User-facing status for diagnostics tooling.
#[derive(Debug, Clone, Serialize)]
pub struct AdapterDiagnostics {
    pub instances: Vec<String>,
    pub default_instance: Option<String>,
    pub page_cache_entries: usize,
    pub recorded_operations: usize,
    pub blocked_operations: Vec<String>,
    pub peers: Vec<PeerReport>,
}

struct CachedClient {
    client: Arc<ConfluenceClient>,
    /// Config the client was built from; a reload with different
    /// credentials invalidates the handle.
    config: InstanceConfig,
}

/// The service graph injected into CRUD handlers.
pub struct AdapterServices {
    registry: Arc<InstanceRegistry>,
    resolver: InstanceResolver,
    page_cache: Arc<PageInstanceCache>,
    boundary: Arc<SafetyBoundary>,
    peer_manager: Arc<PeerConnectionManager>,
    clients: DashMap<String, CachedClient>,
}

impl AdapterServices {
    /// Build the full service graph from a configuration source.
    ///
    /// Fails fast: the initial registry load happens here, so a broken or
    /// absent configuration aborts startup instead of the first operation.
    pub fn new(
        source: Arc<dyn ConfigSource>,
        transport: Arc<dyn PeerTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RoutingError> {
        let initial = source.load()?;
        let bridge = initial.bridge.clone().unwrap_or_default();

        let registry = Arc::new(InstanceRegistry::new(source, Arc::clone(&clock)));
        registry.reload()?;

        let page_cache = Arc::new(PageInstanceCache::new(Arc::clone(&clock)));
        let resolver = InstanceResolver::new(Arc::clone(&registry), Arc::clone(&page_cache));
        let boundary = Arc::new(SafetyBoundary::new(bridge.clone(), Arc::clone(&clock)));
        let peer_manager = Arc::new(PeerConnectionManager::new(bridge, transport, clock));

        info!("[AdapterServices] Service graph initialized");

        Ok(Self {
            registry,
            resolver,
            page_cache,
            boundary,
            peer_manager,
            clients: DashMap::new(),
        })
    }

    /// Resolve the tenant and client handle for an operation.
    pub fn resolve_instance(&self, args: &ResolveArgs) -> Result<RoutedInstance, RoutingError> {
        let resolved = self.resolver.resolve(
            args.instance.as_deref(),
            args.space_key.as_deref(),
            args.page_id.as_deref(),
        )?;
        let client = self.client_for(&resolved)?;
        Ok(RoutedInstance {
            instance_name: resolved.instance_name,
            client,
        })
    }

    fn client_for(&self, resolved: &ResolvedInstance) -> Result<Arc<ConfluenceClient>, RoutingError> {
        if let Some(cached) = self.clients.get(&resolved.instance_name) {
            if cached.config == resolved.config {
                return Ok(Arc::clone(&cached.client));
            }
        }

        let client = Arc::new(ConfluenceClient::new(
            &resolved.instance_name,
            &resolved.config,
        )?);
        self.clients.insert(
            resolved.instance_name.clone(),
            CachedClient {
                client: Arc::clone(&client),
                config: resolved.config.clone(),
            },
        );
        Ok(client)
    }

    /// Opportunistically remember which tenant served a page. Called after
    /// successful reads/searches that return a page with a known space.
    pub fn note_page_instance(&self, page_id: &str, space_key: &str, instance_name: &str) {
        self.page_cache.put(page_id, space_key, instance_name);
    }

    /// Policy-check one cross-server operation. Handlers must call this
    /// before anything that reaches the peer.
    pub fn validate_cross_server_op(
        &self,
        direction: Direction,
        operation: &str,
        ctx: &OperationContext,
    ) -> BoundaryVerdict {
        self.boundary.validate(direction, operation, ctx)
    }

    /// Record a dispatched cross-server operation for rate accounting.
    pub fn record_cross_server_op(&self, operation: &str, ctx: &OperationContext) {
        self.boundary.record_operation(operation, ctx);
    }

    /// Penalize an operation type after repeated downstream failures.
    pub fn block_cross_server_op(&self, operation: &str, duration: Duration) {
        self.boundary.block_operation(operation, duration);
    }

    /// Dispatch one boundary-validated operation to the peer adapter.
    pub async fn peer_call(
        &self,
        operation: &str,
        args: Option<Value>,
    ) -> Result<PeerPayload, RoutingError> {
        self.peer_manager.call_tool(operation, args).await
    }

    /// Fresh peer health info for user-facing diagnostics.
    pub async fn peer_health(&self) -> Result<PeerHealth, RoutingError> {
        self.peer_manager.health_check().await
    }

    pub fn peer_manager(&self) -> Arc<PeerConnectionManager> {
        Arc::clone(&self.peer_manager)
    }

    /// Explicit registry cache-clear; the next resolution reloads.
    pub fn invalidate_registry(&self) {
        self.registry.invalidate();
    }

    /// Current adapter status for diagnostics tooling.
    pub fn diagnostics(&self) -> Result<AdapterDiagnostics, RoutingError> {
        let state = self.registry.snapshot()?;
        Ok(AdapterDiagnostics {
            instances: state.instance_names(),
            default_instance: state.default_instance().map(String::from),
            page_cache_entries: self.page_cache.len(),
            recorded_operations: self.boundary.history_len(),
            blocked_operations: self.boundary.blocked_operations(),
            peers: self.peer_manager.snapshot(),
        })
    }

    /// Spawn the peer discovery loop and the periodic sweep task.
    pub fn start_background_tasks(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let discovery = Arc::clone(&self.peer_manager).start();

        let services = Arc::clone(self);
        let sweeper = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                services.boundary.sweep();
                services.page_cache.sweep();
            }
        });

        vec![discovery, sweeper]
    }

    /// Release peer connections; background task handles should be aborted
    /// by the embedder.
    pub async fn shutdown(&self) {
        self.peer_manager.shutdown().await;
    }
}
