//! Resolution cascade tests: every step, in priority order.

use pretty_assertions::assert_eq;
use tests::mocks::{single_instance_config, two_instance_config, with_route};
use tests::AdapterHarness;
use wikimux_core::RoutingError;
use wikimux_gateway::ResolveArgs;

#[test]
fn test_single_instance_resolves_with_no_hints() {
    let harness = AdapterHarness::new(single_instance_config());

    let routed = harness
        .services
        .resolve_instance(&ResolveArgs::default())
        .unwrap();

    assert_eq!(routed.instance_name, "solo");
    assert_eq!(routed.client.base_url(), "https://solo.atlassian.net");
}

#[test]
fn test_explicit_instance_wins_over_everything() {
    let config = with_route(two_instance_config(), "ENG", "prod");
    let harness = AdapterHarness::new(config);

    // Space key points at prod via both route and known_spaces; the
    // explicit override still wins.
    let args = ResolveArgs {
        instance: Some("staging".to_string()),
        space_key: Some("ENG".to_string()),
        page_id: None,
    };
    let routed = harness.services.resolve_instance(&args).unwrap();
    assert_eq!(routed.instance_name, "staging");
}

#[test]
fn test_unknown_explicit_instance_fails_regardless_of_context() {
    let harness = AdapterHarness::new(two_instance_config());

    let args = ResolveArgs {
        instance: Some("nonexistent".to_string()),
        space_key: Some("ENG".to_string()),
        page_id: Some("12345".to_string()),
    };
    let err = harness.services.resolve_instance(&args).unwrap_err();

    match err {
        RoutingError::InstanceNotFound { name, available } => {
            assert_eq!(name, "nonexistent");
            assert_eq!(available, vec!["prod".to_string(), "staging".to_string()]);
        }
        other => panic!("expected InstanceNotFound, got {other:?}"),
    }
}

#[test]
fn test_space_route_beats_known_spaces() {
    // ENG is in prod's known_spaces, but the route table binds it to
    // staging; the route wins.
    let config = with_route(two_instance_config(), "ENG", "staging");
    let harness = AdapterHarness::new(config);

    let routed = harness
        .services
        .resolve_instance(&ResolveArgs::with_space("ENG"))
        .unwrap();
    assert_eq!(routed.instance_name, "staging");
}

#[test]
fn test_dangling_space_route_is_an_error() {
    let config = with_route(two_instance_config(), "ENG", "retired");
    let harness = AdapterHarness::new(config);

    let err = harness
        .services
        .resolve_instance(&ResolveArgs::with_space("ENG"))
        .unwrap_err();
    assert!(matches!(err, RoutingError::InstanceNotFound { name, .. } if name == "retired"));
}

#[test]
fn test_known_spaces_routes_in_document_order() {
    let harness = AdapterHarness::new(two_instance_config());

    let routed = harness
        .services
        .resolve_instance(&ResolveArgs::with_space("SAND"))
        .unwrap();
    assert_eq!(routed.instance_name, "staging");
}

#[test]
fn test_default_instance_used_when_nothing_else_matches() {
    let mut config = two_instance_config();
    config.default_instance = Some("staging".to_string());
    let harness = AdapterHarness::new(config);

    // Unknown space key falls through the space steps to the default.
    let routed = harness
        .services
        .resolve_instance(&ResolveArgs::with_space("UNKNOWN"))
        .unwrap();
    assert_eq!(routed.instance_name, "staging");
}

#[test]
fn test_ambiguous_without_default_lists_candidates() {
    let harness = AdapterHarness::new(two_instance_config());

    let err = harness
        .services
        .resolve_instance(&ResolveArgs::default())
        .unwrap_err();

    match err {
        RoutingError::AmbiguousInstance { available } => {
            assert_eq!(available, vec!["prod".to_string(), "staging".to_string()]);
        }
        other => panic!("expected AmbiguousInstance, got {other:?}"),
    }
}

#[test]
fn test_page_cache_consulted_when_only_page_id_given() {
    let harness = AdapterHarness::new(two_instance_config());

    harness.services.note_page_instance("12345", "ENG", "prod");

    let routed = harness
        .services
        .resolve_instance(&ResolveArgs::with_page("12345"))
        .unwrap();
    assert_eq!(routed.instance_name, "prod");
}

#[test]
fn test_page_cache_miss_falls_through_to_ambiguous() {
    let harness = AdapterHarness::new(two_instance_config());

    let err = harness
        .services
        .resolve_instance(&ResolveArgs::with_page("99999"))
        .unwrap_err();
    assert!(matches!(err, RoutingError::AmbiguousInstance { .. }));
}

#[test]
fn test_space_key_takes_precedence_over_page_cache() {
    let harness = AdapterHarness::new(two_instance_config());

    // The cache says prod, but an explicit space context says staging.
    harness.services.note_page_instance("12345", "ENG", "prod");

    let args = ResolveArgs {
        instance: None,
        space_key: Some("SAND".to_string()),
        page_id: Some("12345".to_string()),
    };
    let routed = harness.services.resolve_instance(&args).unwrap();
    assert_eq!(routed.instance_name, "staging");
}

#[test]
fn test_resolution_is_idempotent() {
    let config = with_route(two_instance_config(), "ENG", "staging");
    let harness = AdapterHarness::new(config);

    let args = ResolveArgs {
        instance: None,
        space_key: Some("ENG".to_string()),
        page_id: Some("777".to_string()),
    };

    let first = harness.services.resolve_instance(&args).unwrap();
    let second = harness.services.resolve_instance(&args).unwrap();
    assert_eq!(first.instance_name, second.instance_name);
}
