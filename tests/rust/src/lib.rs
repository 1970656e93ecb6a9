//! Shared test harness for wikimux integration tests.

pub mod mocks;

use std::sync::Arc;

use wikimux_core::{AdapterConfig, BridgeConfig, ManualClock};
use wikimux_gateway::AdapterServices;

use mocks::{FakePeerTransport, StaticConfigSource};

/// Full service graph wired with a manual clock and scripted peer
/// transport. The clock and transport stay accessible so tests drive time
/// and peer behavior deterministically.
pub struct AdapterHarness {
    pub services: Arc<AdapterServices>,
    pub clock: Arc<ManualClock>,
    pub transport: Arc<FakePeerTransport>,
    pub source: Arc<StaticConfigSource>,
}

impl AdapterHarness {
    pub fn new(config: AdapterConfig) -> Self {
        let clock = Arc::new(ManualClock::default_start());
        let transport = Arc::new(FakePeerTransport::new());
        let source = Arc::new(StaticConfigSource::new(config));

        let services = Arc::new(
            AdapterServices::new(
                Arc::clone(&source) as _,
                Arc::clone(&transport) as _,
                Arc::clone(&clock) as _,
            )
            .expect("harness config must load"),
        );

        Self {
            services,
            clock,
            transport,
            source,
        }
    }

    /// Harness with the bridge enabled on top of the given instances.
    pub fn with_bridge(mut config: AdapterConfig, bridge: BridgeConfig) -> Self {
        config.bridge = Some(bridge);
        Self::new(config)
    }
}

/// Bridge config pointed at a fictional peer, enabled.
pub fn test_bridge_config() -> BridgeConfig {
    BridgeConfig {
        enabled: true,
        endpoint: "http://localhost:9200/mcp".to_string(),
        health_endpoint: "http://localhost:9200/health".to_string(),
        ..BridgeConfig::default()
    }
}

/// Initialize tracing for a test binary. Safe to call repeatedly.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
