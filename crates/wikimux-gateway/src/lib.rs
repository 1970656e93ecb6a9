//! # Wikimux Gateway
//!
//! The routing and resilience core of the wikimux adapter.
//!
//! ## Modules
//!
//! - `registry` - tenant registry, resolver cascade, page-instance cache
//! - `boundary` - the cross-server safety boundary engine
//! - `breaker` - circuit breaker guarding peer calls
//! - `peer` - peer adapter discovery and connection management
//! - `client` - per-tenant Confluence client handles
//! - `service` - the `AdapterServices` facade handed to tool handlers
//! - `logging` - tracing initialization for adapter processes
//!
//! A tool invocation asks `AdapterServices::resolve_instance` for a
//! tenant/client pair, performs its CRUD call, and opportunistically
//! updates the page-instance cache. Cross-server operations additionally
//! pass `validate_cross_server_op` before being dispatched through the
//! peer connection manager.

pub mod boundary;
pub mod breaker;
pub mod client;
pub mod logging;
pub mod peer;
pub mod registry;
pub mod service;

// Re-export commonly used types
pub use boundary::{BoundaryVerdict, SafetyBoundary, HISTORY_RETENTION};
pub use breaker::{BreakerError, BreakerState, CircuitBreaker};
pub use client::ConfluenceClient;
pub use peer::{backoff_delay, PeerConnectionManager, PeerReport};
pub use registry::page_cache::{PageCacheEntry, PageInstanceCache, PAGE_CACHE_TTL};
pub use registry::resolver::{InstanceResolver, ResolvedInstance};
pub use registry::{ConfigSource, FileConfigSource, InstanceRegistry, REGISTRY_TTL};
pub use service::{AdapterDiagnostics, AdapterServices, ResolveArgs, RoutedInstance};
