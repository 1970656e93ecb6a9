//! # Wikimux Core
//!
//! Domain entities, operation classification, error taxonomy, and
//! configuration loading for the wikimux adapter.
//!
//! ## Modules
//!
//! - `clock` - time source port shared by every timing-driven component
//! - `config` - configuration document parsing with environment fallback
//! - `domain` - core entities (instances, operations, peer candidates)
//! - `error` - routing and configuration error taxonomy

pub mod clock;
pub mod config;
pub mod domain;
pub mod error;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{default_config_path, AdapterConfig, BridgeConfig, ENV_INSTANCE_NAME};
pub use domain::*;
pub use error::{ConfigError, RoutingError};
