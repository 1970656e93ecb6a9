//! Sliding-window rate limiting through the service facade.

use tests::mocks::single_instance_config;
use tests::{test_bridge_config, AdapterHarness};
use wikimux_core::{BridgeConfig, Direction, OperationContext};

fn ctx() -> OperationContext {
    OperationContext::new("confluence")
}

#[test]
fn test_minute_window_saturation_and_rollover() {
    let bridge = BridgeConfig {
        operations_per_minute: 4,
        ..test_bridge_config()
    };
    let harness = AdapterHarness::with_bridge(single_instance_config(), bridge);

    for _ in 0..4 {
        let verdict =
            harness
                .services
                .validate_cross_server_op(Direction::Outgoing, "get_issue", &ctx());
        assert!(verdict.allowed);
        harness.services.record_cross_server_op("get_issue", &ctx());
    }

    let verdict =
        harness
            .services
            .validate_cross_server_op(Direction::Outgoing, "get_issue", &ctx());
    assert!(!verdict.allowed);
    assert!(verdict.rate_limited);

    // Window rolls: the same check passes again.
    harness.clock.advance(chrono::Duration::seconds(61));
    let verdict =
        harness
            .services
            .validate_cross_server_op(Direction::Outgoing, "get_issue", &ctx());
    assert!(verdict.allowed);
}

#[test]
fn test_hour_window_outlasts_minute_window() {
    let bridge = BridgeConfig {
        operations_per_minute: 100,
        operations_per_hour: 6,
        ..test_bridge_config()
    };
    let harness = AdapterHarness::with_bridge(single_instance_config(), bridge);

    for _ in 0..6 {
        harness.services.record_cross_server_op("get_issue", &ctx());
        harness.clock.advance(chrono::Duration::minutes(5));
    }

    // 30 minutes in: minute window is clear, hour window is full.
    let verdict =
        harness
            .services
            .validate_cross_server_op(Direction::Outgoing, "get_issue", &ctx());
    assert!(verdict.rate_limited);

    // Far enough that the oldest records age out of the hour window.
    harness.clock.advance(chrono::Duration::minutes(45));
    let verdict =
        harness
            .services
            .validate_cross_server_op(Direction::Outgoing, "get_issue", &ctx());
    assert!(verdict.allowed);
}

#[test]
fn test_rejections_are_not_recorded() {
    let bridge = BridgeConfig {
        operations_per_minute: 2,
        ..test_bridge_config()
    };
    let harness = AdapterHarness::with_bridge(single_instance_config(), bridge);

    harness.services.record_cross_server_op("get_issue", &ctx());
    harness.services.record_cross_server_op("get_issue", &ctx());

    // Repeated rejected validations must not extend the window.
    for _ in 0..5 {
        let verdict =
            harness
                .services
                .validate_cross_server_op(Direction::Outgoing, "get_issue", &ctx());
        assert!(verdict.rate_limited);
    }

    let diag = harness.services.diagnostics().unwrap();
    assert_eq!(diag.recorded_operations, 2);
}
