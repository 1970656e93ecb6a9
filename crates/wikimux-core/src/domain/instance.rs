//! Tenant ("instance") entities.
//!
//! One `InstanceConfig` per configured Confluence account. Routing never
//! mutates these; the registry rebuilds the whole `RegistryState` snapshot
//! on reload and hands out read-only references.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Credential for one instance - exactly one variant is populated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstanceCredential {
    /// Basic auth with an Atlassian API token
    Basic { email: String, api_token: String },

    /// OAuth 2.0 tokens provisioned externally (no interactive flow here)
    Oauth2 {
        access_token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        refresh_token: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_secret: Option<String>,
    },
}

impl InstanceCredential {
    /// Check if this is an OAuth credential
    pub fn is_oauth(&self) -> bool {
        matches!(self, Self::Oauth2 { .. })
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            Self::Basic { email, api_token } => {
                if email.is_empty() {
                    return Err("basic credential has an empty email".to_string());
                }
                if api_token.is_empty() {
                    return Err("basic credential has an empty api_token".to_string());
                }
                Ok(())
            }
            Self::Oauth2 { access_token, .. } => {
                if access_token.is_empty() {
                    return Err("oauth2 credential has an empty access_token".to_string());
                }
                Ok(())
            }
        }
    }
}

/// One configured Confluence tenant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceConfig {
    /// Site domain, e.g. "acme.atlassian.net" (scheme optional)
    pub domain: String,

    /// The credential used for every call routed to this instance
    pub credential: InstanceCredential,

    /// Space keys this instance is known to serve, used for auto-routing
    /// when no explicit instance or space route applies
    #[serde(default)]
    pub known_spaces: Vec<String>,
}

impl InstanceConfig {
    pub fn new(domain: impl Into<String>, credential: InstanceCredential) -> Self {
        Self {
            domain: domain.into(),
            credential,
            known_spaces: Vec::new(),
        }
    }

    pub fn with_known_spaces(mut self, spaces: Vec<String>) -> Self {
        self.known_spaces = spaces;
        self
    }

    /// Enforce the instance invariants: non-empty domain, usable credential.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.domain.trim().is_empty() {
            return Err(ConfigError::InvalidInstance {
                name: name.to_string(),
                reason: "domain is empty".to_string(),
            });
        }
        self.credential
            .validate()
            .map_err(|reason| ConfigError::InvalidInstance {
                name: name.to_string(),
                reason,
            })
    }

    pub fn serves_space(&self, space_key: &str) -> bool {
        self.known_spaces.iter().any(|s| s == space_key)
    }

    /// Normalized https base URL for the tenant.
    pub fn base_url(&self) -> String {
        let domain = self.domain.trim().trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{}", domain)
        }
    }
}

/// Per-space routing override with optional write defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpaceRoute {
    #[serde(alias = "instanceName")]
    pub instance_name: String,

    #[serde(default, alias = "defaultParentPageId")]
    pub default_parent_page_id: Option<String>,

    #[serde(default, alias = "defaultLabels")]
    pub default_labels: Option<Vec<String>>,
}

impl SpaceRoute {
    pub fn new(instance_name: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            default_parent_page_id: None,
            default_labels: None,
        }
    }
}

/// Snapshot of all routing data, rebuilt as a whole on reload.
#[derive(Debug, Clone)]
pub struct RegistryState {
    /// Instances in configuration document order. Order matters for
    /// known-space ties and is not stable across reconfiguration.
    instances: Vec<(String, InstanceConfig)>,
    space_routes: HashMap<String, SpaceRoute>,
    default_instance: Option<String>,
    pub loaded_at: DateTime<Utc>,
}

impl RegistryState {
    pub fn new(
        instances: Vec<(String, InstanceConfig)>,
        space_routes: HashMap<String, SpaceRoute>,
        default_instance: Option<String>,
        loaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            instances,
            space_routes,
            default_instance,
            loaded_at,
        }
    }

    pub fn instance(&self, name: &str) -> Option<&InstanceConfig> {
        self.instances
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    pub fn instances(&self) -> impl Iterator<Item = (&str, &InstanceConfig)> {
        self.instances.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn instance_names(&self) -> Vec<String> {
        self.instances.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn space_route(&self, space_key: &str) -> Option<&SpaceRoute> {
        self.space_routes.get(space_key)
    }

    pub fn space_routes(&self) -> impl Iterator<Item = (&str, &SpaceRoute)> {
        self.space_routes.iter().map(|(k, r)| (k.as_str(), r))
    }

    pub fn default_instance(&self) -> Option<&str> {
        self.default_instance.as_deref()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
