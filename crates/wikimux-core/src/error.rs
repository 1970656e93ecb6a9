//! Error taxonomy for routing and cross-server policy decisions.
//!
//! Configuration and registry errors are fatal at the point of first use;
//! policy and circuit rejections are returned to the immediate caller with
//! enough structured detail to retry, disambiguate, or give up.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by the routing and resilience core.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// No tenant data available at all. Aborts startup.
    #[error("no Confluence instance configured: provide a config file or set WIKIMUX_DOMAIN credentials")]
    NoConfiguration,

    /// A named instance does not exist. Lists valid names so the caller can retry.
    #[error("instance '{name}' not found (configured instances: {})", .available.join(", "))]
    InstanceNotFound { name: String, available: Vec<String> },

    /// The resolution cascade ran out of rules with more than one candidate.
    #[error("cannot determine target instance; pass `instance` with one of: {}", .available.join(", "))]
    AmbiguousInstance { available: Vec<String> },

    /// The peer exists but its circuit breaker is open.
    #[error("circuit open for peer {endpoint}; retry in {}s", .retry_after.as_secs())]
    CircuitOpen {
        endpoint: String,
        retry_after: Duration,
    },

    /// Sliding-window rate limit hit. Includes the limiting window and threshold.
    #[error("rate limit exceeded: {count} operations in the last {window}, limit is {limit}")]
    RateLimited {
        window: &'static str,
        limit: u32,
        count: u32,
    },

    /// Policy rejection from the safety boundary.
    #[error("operation not allowed: {reason}")]
    OperationNotAllowed { reason: String },

    /// No connected peer candidate exists. Distinct from `CircuitOpen`,
    /// which implies a peer exists but is unhealthy.
    #[error("no connected peer adapter available")]
    PeerUnavailable,

    /// A dispatched peer call failed downstream.
    #[error("peer call failed: {message}")]
    PeerCallFailed { message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failures while loading the adapter configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid instance '{name}': {reason}")]
    InvalidInstance { name: String, reason: String },

    #[error("environment credentials incomplete: {0}")]
    Env(String),

    /// Neither a config file nor environment scalars are present.
    #[error("no configuration source: no config file found and no environment credentials set")]
    Missing,
}
