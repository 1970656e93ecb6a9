//! Core domain entities.

mod instance;
mod operation;
mod peer;

pub use instance::{InstanceConfig, InstanceCredential, RegistryState, SpaceRoute};
pub use operation::{
    Direction, OperationContext, OperationMode, OperationRecord, MODE_PATTERNS,
};
pub use peer::{
    DiscoveredServer, PeerHandle, PeerHealth, PeerPayload, PeerStatus, PeerTransport,
};
