//! # Wikimux MCP
//!
//! MCP client plumbing for the peer bridge: the streamable-HTTP session
//! against the peer adapter, the application-level health probe, and the
//! production implementation of the gateway's peer transport port.

mod probe;
mod session;
mod transport;

pub use probe::probe_health;
pub use session::{PeerClient, PeerClientHandler, PeerSession};
pub use transport::McpPeerTransport;
