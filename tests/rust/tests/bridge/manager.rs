//! Peer connection manager lifecycle: discovery, demotion, backoff,
//! retry exhaustion, and breaker-guarded dispatch.

use std::sync::Arc;

use tests::mocks::FakePeerTransport;
use tests::test_bridge_config;
use wikimux_core::{BridgeConfig, ManualClock, PeerStatus, RoutingError};
use wikimux_gateway::PeerConnectionManager;

struct ManagerHarness {
    manager: PeerConnectionManager,
    transport: Arc<FakePeerTransport>,
    clock: Arc<ManualClock>,
}

fn harness(config: BridgeConfig) -> ManagerHarness {
    let clock = Arc::new(ManualClock::default_start());
    let transport = Arc::new(FakePeerTransport::new());
    let manager = PeerConnectionManager::new(
        config,
        Arc::clone(&transport) as _,
        Arc::clone(&clock) as _,
    );
    ManagerHarness {
        manager,
        transport,
        clock,
    }
}

fn status_of(harness: &ManagerHarness) -> PeerStatus {
    harness.manager.snapshot()[0].server.status
}

#[tokio::test]
async fn test_probe_discovers_and_connects() {
    tests::init_test_tracing();
    let h = harness(test_bridge_config());

    h.manager.probe_once().await;
    h.manager.reconnect_pass().await;

    assert_eq!(h.manager.connected_count(), 1);
    let report = &h.manager.snapshot()[0];
    assert_eq!(report.server.status, PeerStatus::Connected);
    assert_eq!(report.server.server_type, "jira-adapter");
    assert_eq!(report.server.retry_count, 0);
}

#[tokio::test]
async fn test_disabled_bridge_never_probes() {
    let h = harness(BridgeConfig {
        enabled: false,
        ..test_bridge_config()
    });

    h.manager.probe_once().await;
    h.manager.reconnect_pass().await;

    assert_eq!(h.transport.probes.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert!(h.manager.snapshot().is_empty());
}

#[tokio::test]
async fn test_call_tool_round_trips_through_connected_peer() {
    let h = harness(test_bridge_config());
    h.manager.probe_once().await;
    h.manager.reconnect_pass().await;

    let payload = h.manager.call_tool("get_issue", None).await.unwrap();
    assert!(matches!(
        payload,
        wikimux_core::PeerPayload::ToolResult { is_error: false, .. }
    ));
    assert_eq!(h.transport.handle.call_count(), 1);
}

#[tokio::test]
async fn test_call_without_connection_is_peer_unavailable() {
    let h = harness(test_bridge_config());

    let err = h.manager.call_tool("get_issue", None).await.unwrap_err();
    assert!(matches!(err, RoutingError::PeerUnavailable));
}

#[tokio::test]
async fn test_probe_failure_demotes_connected_peer() {
    let h = harness(test_bridge_config());
    h.manager.probe_once().await;
    h.manager.reconnect_pass().await;
    assert_eq!(h.manager.connected_count(), 1);

    h.transport.set_healthy(false);
    h.manager.probe_once().await;

    assert_eq!(h.manager.connected_count(), 0);
    assert_eq!(status_of(&h), PeerStatus::Failed);
    // The session was released, not leaked.
    assert_eq!(
        h.transport.handle.disconnects.load(std::sync::atomic::Ordering::SeqCst),
        1
    );

    // Demoted peer is unusable even though it once existed.
    let err = h.manager.call_tool("get_issue", None).await.unwrap_err();
    assert!(matches!(err, RoutingError::PeerUnavailable));
}

#[tokio::test]
async fn test_reconnect_respects_exponential_backoff() {
    let h = harness(test_bridge_config());
    h.manager.probe_once().await;
    h.transport.set_connectable(false);
    h.manager.reconnect_pass().await;

    assert_eq!(h.transport.connect_attempt_count(), 1);
    assert_eq!(status_of(&h), PeerStatus::Failed);

    // First retry is due after 5s, not before.
    h.clock.advance(chrono::Duration::seconds(3));
    h.manager.reconnect_pass().await;
    assert_eq!(h.transport.connect_attempt_count(), 1);

    h.clock.advance(chrono::Duration::seconds(3));
    h.manager.reconnect_pass().await;
    assert_eq!(h.transport.connect_attempt_count(), 2);

    // Second retry doubles to 10s.
    h.clock.advance(chrono::Duration::seconds(6));
    h.manager.reconnect_pass().await;
    assert_eq!(h.transport.connect_attempt_count(), 2);

    h.clock.advance(chrono::Duration::seconds(5));
    h.manager.reconnect_pass().await;
    assert_eq!(h.transport.connect_attempt_count(), 3);
}

#[tokio::test]
async fn test_retries_exhaust_then_probe_revives() {
    let config = BridgeConfig {
        max_retries: 2,
        ..test_bridge_config()
    };
    let h = harness(config);

    h.manager.probe_once().await;
    h.transport.set_connectable(false);

    // Exhaust the retries (advancing well past every backoff delay).
    for _ in 0..5 {
        h.manager.reconnect_pass().await;
        h.clock.advance(chrono::Duration::minutes(2));
    }
    assert_eq!(h.transport.connect_attempt_count(), 2);

    // Still failed, still present: candidates are never deleted.
    assert_eq!(status_of(&h), PeerStatus::Failed);

    // More passes do nothing while exhausted.
    h.manager.reconnect_pass().await;
    assert_eq!(h.transport.connect_attempt_count(), 2);

    // A successful discovery probe revives the candidate.
    h.transport.set_connectable(true);
    h.manager.probe_once().await;
    h.manager.reconnect_pass().await;
    assert_eq!(h.manager.connected_count(), 1);
}

#[tokio::test]
async fn test_breaker_opens_after_repeated_call_failures() {
    let h = harness(test_bridge_config());
    h.manager.probe_once().await;
    h.manager.reconnect_pass().await;

    h.transport.handle.set_fail_calls(true);

    // Default threshold is 5 consecutive failures.
    for _ in 0..5 {
        let err = h.manager.call_tool("get_issue", None).await.unwrap_err();
        assert!(matches!(err, RoutingError::PeerCallFailed { .. }));
    }
    assert_eq!(h.transport.handle.call_count(), 5);

    // Breaker open: short-circuits without touching the handle, and is
    // distinct from PeerUnavailable.
    let err = h.manager.call_tool("get_issue", None).await.unwrap_err();
    assert!(matches!(err, RoutingError::CircuitOpen { .. }));
    assert_eq!(h.transport.handle.call_count(), 5);

    // After the reset timeout the trial call goes through and recovers.
    h.transport.handle.set_fail_calls(false);
    h.clock.advance(chrono::Duration::seconds(31));
    let payload = h.manager.call_tool("get_issue", None).await;
    assert!(payload.is_ok());
}

#[tokio::test]
async fn test_shutdown_clears_candidates_and_disconnects() {
    let h = harness(test_bridge_config());
    h.manager.probe_once().await;
    h.manager.reconnect_pass().await;

    h.manager.shutdown().await;

    assert!(h.manager.snapshot().is_empty());
    assert_eq!(
        h.transport.handle.disconnects.load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}
