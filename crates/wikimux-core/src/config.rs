//! Adapter configuration loading.
//!
//! Sources, in priority order:
//! 1. An explicit config file path (must exist if given)
//! 2. The default config path under the user config directory
//! 3. Environment scalars forming a single synthetic instance
//!
//! A missing file with no environment credentials is fatal at startup.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::{Direction, InstanceConfig, InstanceCredential, OperationMode, SpaceRoute};
use crate::error::ConfigError;

/// Name given to the instance synthesized from environment scalars.
pub const ENV_INSTANCE_NAME: &str = "default";

/// Multi-instance adapter configuration document.
#[derive(Debug, Clone, Default)]
pub struct AdapterConfig {
    /// name -> instance, in document order
    pub instances: Vec<(String, InstanceConfig)>,
    pub space_routes: HashMap<String, SpaceRoute>,
    pub default_instance: Option<String>,
    pub bridge: Option<BridgeConfig>,
}

/// Raw document shape. `instances` stays a `serde_json::Map` so the
/// document's key order survives (serde_json's preserve_order feature).
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    instances: serde_json::Map<String, Value>,
    #[serde(default, alias = "spaceRoutes")]
    space_routes: HashMap<String, SpaceRoute>,
    #[serde(default, alias = "defaultInstance")]
    default_instance: Option<String>,
    #[serde(default)]
    bridge: Option<BridgeConfig>,
}

impl AdapterConfig {
    /// Load from the given path, the default location, or environment scalars.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = if let Some(path) = explicit_path {
            Self::from_file(path)?
        } else if let Some(path) = default_config_path().filter(|p| p.exists()) {
            Self::from_file(&path)?
        } else {
            debug!("[AdapterConfig] No config file found, trying environment scalars");
            Self::from_env()?.ok_or(ConfigError::Missing)?
        };

        config.apply_env_bridge();
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration document from disk.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut instances = Vec::with_capacity(raw.instances.len());
        for (name, value) in raw.instances {
            let instance: InstanceConfig =
                serde_json::from_value(value).map_err(|e| ConfigError::InvalidInstance {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            instances.push((name, instance));
        }

        info!(
            path = %path.display(),
            instances = instances.len(),
            "[AdapterConfig] Loaded configuration file"
        );

        Ok(Self {
            instances,
            space_routes: raw.space_routes,
            default_instance: raw.default_instance,
            bridge: raw.bridge,
        })
    }

    /// Build a single-instance configuration from environment scalars.
    ///
    /// Returns `Ok(None)` when no environment configuration is present at
    /// all; an incomplete set (domain without credentials) is an error.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(domain) = non_empty_env("WIKIMUX_DOMAIN") else {
            return Ok(None);
        };

        let credential = match (
            non_empty_env("WIKIMUX_EMAIL"),
            non_empty_env("WIKIMUX_API_TOKEN"),
            non_empty_env("WIKIMUX_OAUTH_ACCESS_TOKEN"),
        ) {
            (Some(email), Some(api_token), _) => InstanceCredential::Basic { email, api_token },
            (_, _, Some(access_token)) => InstanceCredential::Oauth2 {
                access_token,
                refresh_token: non_empty_env("WIKIMUX_OAUTH_REFRESH_TOKEN"),
                client_id: non_empty_env("WIKIMUX_OAUTH_CLIENT_ID"),
                client_secret: non_empty_env("WIKIMUX_OAUTH_CLIENT_SECRET"),
            },
            _ => {
                return Err(ConfigError::Env(
                    "WIKIMUX_DOMAIN is set but neither WIKIMUX_EMAIL/WIKIMUX_API_TOKEN \
                     nor WIKIMUX_OAUTH_ACCESS_TOKEN are"
                        .to_string(),
                ))
            }
        };

        let known_spaces = non_empty_env("WIKIMUX_KNOWN_SPACES")
            .map(|s| {
                s.split(',')
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let instance = InstanceConfig::new(domain, credential).with_known_spaces(known_spaces);

        info!("[AdapterConfig] Using environment-scalar configuration");

        Ok(Some(Self {
            instances: vec![(ENV_INSTANCE_NAME.to_string(), instance)],
            space_routes: HashMap::new(),
            default_instance: Some(ENV_INSTANCE_NAME.to_string()),
            bridge: None,
        }))
    }

    /// Synthesize a bridge section from the environment when the document
    /// has none but a peer endpoint is configured.
    fn apply_env_bridge(&mut self) {
        if self.bridge.is_some() {
            return;
        }
        if let Some(endpoint) = non_empty_env("WIKIMUX_BRIDGE_ENDPOINT") {
            let health_endpoint = non_empty_env("WIKIMUX_BRIDGE_HEALTH_ENDPOINT")
                .unwrap_or_else(|| format!("{}/health", endpoint.trim_end_matches('/')));
            self.bridge = Some(BridgeConfig {
                enabled: true,
                endpoint,
                health_endpoint,
                ..BridgeConfig::default()
            });
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, instance) in &self.instances {
            instance.validate(name)?;
        }
        Ok(())
    }
}

/// Peer bridge (cross-server) configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub enabled: bool,

    /// Peer adapter MCP endpoint (streamable HTTP)
    pub endpoint: String,

    /// Peer health-check URL polled by the discovery loop
    pub health_endpoint: String,

    pub poll_interval_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_retries: u32,

    pub allowed_incoming_modes: Vec<OperationMode>,
    pub allowed_outgoing_modes: Vec<OperationMode>,
    pub excluded_incoming_operations: Vec<String>,
    pub excluded_outgoing_operations: Vec<String>,

    pub operations_per_minute: u32,
    pub operations_per_hour: u32,
    pub max_batch_size: u32,

    /// Operations the caller must confirm with its human user first
    pub confirm_operations: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            health_endpoint: String::new(),
            poll_interval_secs: 30,
            connect_timeout_secs: 10,
            max_retries: 5,
            allowed_incoming_modes: vec![OperationMode::Read],
            allowed_outgoing_modes: vec![
                OperationMode::Read,
                OperationMode::Create,
                OperationMode::Update,
            ],
            excluded_incoming_operations: Vec::new(),
            excluded_outgoing_operations: Vec::new(),
            operations_per_minute: 30,
            operations_per_hour: 500,
            max_batch_size: 10,
            confirm_operations: Vec::new(),
        }
    }
}

impl BridgeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn allows(&self, direction: Direction, mode: OperationMode) -> bool {
        match direction {
            Direction::Incoming => self.allowed_incoming_modes.contains(&mode),
            Direction::Outgoing => self.allowed_outgoing_modes.contains(&mode),
        }
    }

    pub fn excluded(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::Incoming => &self.excluded_incoming_operations,
            Direction::Outgoing => &self.excluded_outgoing_operations,
        }
    }
}

/// Default config document location under the user config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("wikimux").join("config.json"))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
