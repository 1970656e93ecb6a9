//! Instance Registry - loads and caches tenant routing data.
//!
//! `RegistryState` is rebuilt from the configuration source after a fixed
//! TTL or an explicit invalidation; every other component only reads
//! snapshots. Loading failures surface immediately - there is no silent
//! fallback to a default tenant.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use wikimux_core::{AdapterConfig, Clock, ConfigError, RegistryState, RoutingError};

pub mod page_cache;
pub mod resolver;

/// How long a loaded registry snapshot stays valid.
pub const REGISTRY_TTL: Duration = Duration::from_secs(5 * 60);

/// Source of the adapter configuration document.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<AdapterConfig, ConfigError>;
}

/// File-backed configuration source with environment fallback.
pub struct FileConfigSource {
    path: Option<PathBuf>,
}

impl FileConfigSource {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> Result<AdapterConfig, ConfigError> {
        AdapterConfig::load(self.path.as_deref())
    }
}

/// TTL-cached owner of the registry state.
pub struct InstanceRegistry {
    source: Arc<dyn ConfigSource>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    state: RwLock<Option<Arc<RegistryState>>>,
}

impl InstanceRegistry {
    pub fn new(source: Arc<dyn ConfigSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            ttl: chrono::Duration::from_std(REGISTRY_TTL).unwrap_or(chrono::Duration::MAX),
            state: RwLock::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        self
    }

    /// Current snapshot, rebuilding if the TTL expired or nothing is loaded.
    pub fn snapshot(&self) -> Result<Arc<RegistryState>, RoutingError> {
        if let Some(state) = self.state.read().as_ref() {
            if self.clock.now().signed_duration_since(state.loaded_at) < self.ttl {
                return Ok(Arc::clone(state));
            }
            debug!("[InstanceRegistry] Snapshot expired, reloading");
        }
        self.reload()
    }

    /// Force a rebuild from the configuration source.
    pub fn reload(&self) -> Result<Arc<RegistryState>, RoutingError> {
        let config = self.source.load()?;

        let state = Arc::new(RegistryState::new(
            config.instances,
            config.space_routes,
            config.default_instance,
            self.clock.now(),
        ));

        if state.is_empty() {
            return Err(RoutingError::NoConfiguration);
        }

        // Dangling routes are a configuration error; they fail at resolve
        // time, not here, so a reload never takes working tenants down.
        for (space_key, route) in state.space_routes() {
            if state.instance(&route.instance_name).is_none() {
                warn!(
                    space_key = %space_key,
                    instance = %route.instance_name,
                    "[InstanceRegistry] Space route references an unknown instance"
                );
            }
        }

        info!(
            instances = state.len(),
            default = state.default_instance().unwrap_or("-"),
            "[InstanceRegistry] Registry loaded"
        );

        *self.state.write() = Some(Arc::clone(&state));
        Ok(state)
    }

    /// Drop the cached snapshot; the next access reloads.
    pub fn invalidate(&self) {
        debug!("[InstanceRegistry] Snapshot invalidated");
        *self.state.write() = None;
    }
}
