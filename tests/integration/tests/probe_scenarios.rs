//! Integration test: probe sessions end to end.
//!
//! Drives `subscribe_to_probe_for_route` against the scripted node and a
//! graph-backed node, and checks the event stream a subscriber sees.

use std::sync::Arc;
use std::time::Duration;

use lnprobe_core::{
    AttemptResult, Capability, ChannelId, CoreError, FailureReason, Ignore, Millitokens, ProbeState,
    Route, RpcError,
};
use lnprobe_integration_tests::{
    assert_single_terminal, collect, end_of, key, names, route_via, zero_key, GraphChannel,
    GraphNode,
};
use lnprobe_probe::{subscribe_to_probe_for_route, ProbeError, ProbeEvent, ProbeRequest, ScriptedNode};

fn request_for(mtokens: u128) -> ProbeRequest {
    ProbeRequest::builder()
        .destination(zero_key())
        .mtokens(Millitokens(mtokens))
        .build()
        .expect("valid request")
}

fn errors(events: &[ProbeEvent]) -> Vec<&ProbeError> {
    events
        .iter()
        .filter_map(|event| match event {
            ProbeEvent::Error(e) => Some(e),
            _ => None,
        })
        .collect()
}

// =========================================================================
// Reachability
// =========================================================================

#[tokio::test]
async fn test_zero_key_destination_reached_once() {
    let node = Arc::new(ScriptedNode::new(key(1)));
    let route = route_via(&[(1, zero_key())], 1);
    node.push_routes(vec![route.clone()]);
    node.push_attempt(AttemptResult::failed_at(1, "INCORRECT_OR_UNKNOWN_PAYMENT_DETAILS"));

    let events = collect(subscribe_to_probe_for_route(Arc::clone(&node), request_for(1)).unwrap()).await;

    assert_eq!(names(&events), vec!["probing", "probe_success", "end"]);
    assert_eq!(events[1], ProbeEvent::ProbeSuccess { route });
    assert_eq!(end_of(&events), Some((ProbeState::Succeeded, 1)));
    assert_single_terminal(&events);
}

#[tokio::test]
async fn test_same_route_forever_succeeds_once() {
    let node = Arc::new(ScriptedNode::new(key(1)));
    node.always_routes(vec![route_via(&[(1, key(2)), (2, zero_key())], 10)]);
    node.push_attempt(AttemptResult::failed_at(2, "UNKNOWN_PAYMENT_HASH"));

    let events = collect(subscribe_to_probe_for_route(Arc::clone(&node), request_for(10)).unwrap()).await;

    let successes = events
        .iter()
        .filter(|event| matches!(event, ProbeEvent::ProbeSuccess { .. }))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(node.sent().len(), 1);
    assert_single_terminal(&events);
}

#[tokio::test]
async fn test_no_routes_on_first_query_exhausts() {
    let node = Arc::new(ScriptedNode::new(key(1)));

    let events = collect(subscribe_to_probe_for_route(Arc::clone(&node), request_for(1)).unwrap()).await;

    assert_eq!(names(&events), vec!["end"]);
    assert_eq!(end_of(&events), Some((ProbeState::Exhausted, 0)));
    assert!(node.sent().is_empty());
}

// =========================================================================
// Routing failures and the ignore set
// =========================================================================

#[tokio::test]
async fn test_first_hop_failure_excludes_edge() {
    let node = Arc::new(ScriptedNode::new(key(1)));
    node.push_routes(vec![route_via(&[(1, key(2)), (2, zero_key())], 5)]);
    node.push_attempt(AttemptResult::failed_at(0, "TEMPORARY_CHANNEL_FAILURE"));

    let events = collect(subscribe_to_probe_for_route(Arc::clone(&node), request_for(5)).unwrap()).await;

    assert_eq!(names(&events), vec!["probing", "routing_failure", "end"]);
    let ProbeEvent::RoutingFailure(failure) = &events[1] else {
        panic!("expected routing failure");
    };
    assert_eq!(failure.index, 0);
    assert_eq!(failure.channel, Some(ChannelId::from_u64(1)));
    assert_eq!(failure.channel.map(|c| c.to_string()), Some("0x0x1".to_string()));
    assert_eq!(failure.reason, FailureReason::TemporaryChannelFailure);
    assert_eq!(failure.public_key, Some(key(1)));

    let queries = node.queries();
    assert_eq!(queries.len(), 2);
    assert!(queries[0].ignore.is_empty());
    assert_eq!(
        queries[1].ignore,
        vec![Ignore::Edge {
            from_public_key: key(1),
            to_public_key: key(2),
            channel: Some(ChannelId::from_u64(1)),
        }]
    );
    assert_eq!(end_of(&events), Some((ProbeState::Exhausted, 1)));
}

#[tokio::test]
async fn test_failed_edges_never_proposed_again() {
    let source = key(1);
    let (a, b, c, e, destination) = (key(2), key(3), key(4), key(5), zero_key());
    let node = Arc::new(
        GraphNode::new(
            source,
            vec![
                GraphChannel::new(11, source, a),
                GraphChannel::new(12, a, destination),
                GraphChannel::new(21, source, b),
                GraphChannel::new(22, b, destination),
                GraphChannel::new(31, source, c),
                GraphChannel::new(32, c, e),
                GraphChannel::new(33, e, destination),
            ],
        )
        .break_channel(12)
        .break_channel(21),
    );

    let events = collect(subscribe_to_probe_for_route(Arc::clone(&node), request_for(1_000)).unwrap()).await;

    assert_eq!(
        names(&events),
        vec![
            "probing",
            "routing_failure",
            "probing",
            "routing_failure",
            "probing",
            "probe_success",
            "end"
        ]
    );
    assert_eq!(end_of(&events), Some((ProbeState::Succeeded, 3)));

    let attempted = node.attempted();
    let mut failed = Vec::new();
    for (route, event) in attempted.iter().zip(events.iter().filter(|e| {
        matches!(e, ProbeEvent::RoutingFailure(_) | ProbeEvent::ProbeSuccess { .. })
    })) {
        for channel in &failed {
            assert!(
                route.hops.iter().all(|hop| hop.channel != *channel),
                "channel {channel} proposed again after failing"
            );
        }
        if let ProbeEvent::RoutingFailure(failure) = event {
            failed.extend(failure.channel);
        }
    }
    assert_eq!(failed, vec![ChannelId::from_u64(12), ChannelId::from_u64(21)]);

    // The ignore list only grows.
    let sizes: Vec<usize> = node.queries().iter().map(|q| q.ignore.len()).collect();
    assert_eq!(sizes, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_ranked_candidates_all_announced() {
    let node = Arc::new(ScriptedNode::new(key(1)));
    let ranked = |confidence: u32, channel: u64, via: u8| Route {
        confidence: Some(confidence),
        ..route_via(&[(channel, key(via)), (channel + 1, zero_key())], 7)
    };
    let low = ranked(200_000, 30, 4);
    let high = ranked(900_000, 10, 2);
    let mid = ranked(500_000, 20, 3);
    node.push_routes(vec![low.clone(), high.clone(), mid.clone()]);
    // The failed first hop of `high` rules it out of the second search.
    node.push_routes(vec![high.clone(), mid.clone()]);
    node.push_attempt(AttemptResult::failed_at(0, "TEMPORARY_CHANNEL_FAILURE"));
    node.push_attempt(AttemptResult::failed_at(2, "INCORRECT_OR_UNKNOWN_PAYMENT_DETAILS"));

    let events = collect(subscribe_to_probe_for_route(Arc::clone(&node), request_for(7)).unwrap()).await;

    assert_eq!(
        names(&events),
        vec![
            "probing",
            "probing",
            "probing",
            "routing_failure",
            "probing",
            "probe_success",
            "end"
        ]
    );
    let announced: Vec<&Route> = events
        .iter()
        .filter_map(|event| match event {
            ProbeEvent::Probing { route } => Some(route),
            _ => None,
        })
        .collect();
    assert_eq!(announced, vec![&high, &mid, &low, &mid]);

    let sent = node.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].0, high);
    assert_eq!(sent[1].0, mid);
    assert_eq!(end_of(&events), Some((ProbeState::Succeeded, 2)));
    assert_single_terminal(&events);
}

#[tokio::test]
async fn test_caller_ignore_list_is_honoured() {
    let source = key(1);
    let node = Arc::new(GraphNode::new(
        source,
        vec![
            GraphChannel::new(1, source, key(2)),
            GraphChannel::new(2, key(2), zero_key()),
            GraphChannel::new(3, source, key(3)),
            GraphChannel::new(4, key(3), key(4)),
            GraphChannel::new(5, key(4), zero_key()),
        ],
    ));
    let request = ProbeRequest::builder()
        .destination(zero_key())
        .tokens(1)
        .ignore(Ignore::Node { public_key: key(2) })
        .build()
        .unwrap();

    let events = collect(subscribe_to_probe_for_route(Arc::clone(&node), request).unwrap()).await;

    assert_eq!(end_of(&events), Some((ProbeState::Succeeded, 1)));
    let attempted = node.attempted();
    assert!(attempted[0].hops.iter().all(|hop| hop.public_key != Some(key(2))));
    assert_eq!(attempted[0].hop_count(), 3);
}

// =========================================================================
// Timeouts
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_session_timeout_before_attempt_completes() {
    let node = Arc::new(ScriptedNode::new(key(1)));
    node.push_routes(vec![route_via(&[(1, zero_key())], 1)]);
    node.push_attempt_after(Duration::from_secs(600), AttemptResult::failed_at(1, "UNKNOWN_PAYMENT_HASH"));

    let mut request = request_for(1);
    request.probe_timeout = Some(Duration::from_secs(1));
    let events = collect(subscribe_to_probe_for_route(Arc::clone(&node), request).unwrap()).await;

    assert_eq!(names(&events), vec!["probing", "error", "end"]);
    let errs = errors(&events);
    assert_eq!(*errs[0], ProbeError::ProbeTimeout);
    assert_eq!(errs[0].code(), 503);
    assert_eq!(end_of(&events), Some((ProbeState::TimedOut, 1)));
}

#[tokio::test(start_paused = true)]
async fn test_path_timeouts_until_session_deadline() {
    let node = Arc::new(ScriptedNode::new(key(1)));
    node.always_routes(vec![route_via(&[(1, zero_key())], 1)]);
    for _ in 0..10 {
        node.push_attempt_after(Duration::from_secs(5), AttemptResult::default());
    }

    let request = ProbeRequest::builder()
        .destination(zero_key())
        .tokens(1)
        .probe_timeout(Duration::from_millis(350))
        .path_timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let events = collect(subscribe_to_probe_for_route(Arc::clone(&node), request).unwrap()).await;

    let probing = events
        .iter()
        .filter(|event| matches!(event, ProbeEvent::Probing { .. }))
        .count();
    assert!(probing >= 3, "expected retries after path timeouts, got {probing}");
    assert!(!names(&events).contains(&"routing_failure"));
    assert_eq!(end_of(&events).map(|(state, _)| state), Some(ProbeState::TimedOut));
    assert_single_terminal(&events);
}

#[tokio::test]
async fn test_synchronous_node_cannot_starve_session_timer() {
    let node = Arc::new(ScriptedNode::new(key(1)));
    // Every attempt is inconclusive and answers without suspending.
    node.always_routes(vec![route_via(&[(1, zero_key())], 1)]);

    let mut request = request_for(1);
    request.probe_timeout = Some(Duration::from_millis(50));
    let events = collect(subscribe_to_probe_for_route(Arc::clone(&node), request).unwrap()).await;

    assert_eq!(end_of(&events).map(|(state, _)| state), Some(ProbeState::TimedOut));
    assert_single_terminal(&events);
}

// =========================================================================
// Errors
// =========================================================================

#[tokio::test]
async fn test_transport_error_is_reported() {
    let node = Arc::new(ScriptedNode::new(key(1)));
    node.push_routes(vec![route_via(&[(1, zero_key())], 1)]);
    node.push_attempt_error(RpcError::Unavailable("err".into()));

    let events = collect(subscribe_to_probe_for_route(Arc::clone(&node), request_for(1)).unwrap()).await;

    assert_eq!(names(&events), vec!["probing", "error", "end"]);
    let errs = errors(&events);
    assert_eq!(errs[0].code(), 503);
    assert_eq!(errs[0].label(), "UnexpectedErrorWhenPayingViaRoute");
    assert_eq!(end_of(&events), Some((ProbeState::Failed, 1)));
}

#[tokio::test]
async fn test_suppressed_transport_error_ends_quietly() {
    let node = Arc::new(ScriptedNode::new(key(1)));
    node.always_routes(vec![route_via(&[(1, zero_key())], 1)]);
    node.push_attempt_error(RpcError::Unavailable("err".into()));

    let mut request = request_for(1);
    request.suppress_errors = true;
    let mut subscription = subscribe_to_probe_for_route(Arc::clone(&node), request).unwrap();
    let mut events = Vec::new();
    while let Some(event) = futures::StreamExt::next(&mut subscription).await {
        events.push(event);
    }
    subscription.closed().await;

    assert_eq!(names(&events), vec!["probing", "end"]);
    assert_eq!(end_of(&events), Some((ProbeState::Failed, 1)));
    // The session halted: no further attempts after the failure.
    assert_eq!(node.sent().len(), 1);
}

#[tokio::test]
async fn test_route_query_error_is_fatal() {
    let node = Arc::new(ScriptedNode::new(key(1)));
    node.push_route_error(RpcError::Unavailable("down".into()));

    let events = collect(subscribe_to_probe_for_route(Arc::clone(&node), request_for(1)).unwrap()).await;

    assert_eq!(names(&events), vec!["error", "end"]);
    assert!(matches!(errors(&events)[0], ProbeError::FindRoutes(_)));
    assert_eq!(end_of(&events), Some((ProbeState::Failed, 0)));
}

#[tokio::test]
async fn test_settled_probe_is_fatal() {
    let node = Arc::new(ScriptedNode::new(key(1)));
    node.push_routes(vec![route_via(&[(1, zero_key())], 1)]);
    node.push_attempt(AttemptResult::settled(vec![9; 32]));

    let events = collect(subscribe_to_probe_for_route(Arc::clone(&node), request_for(1)).unwrap()).await;

    assert_eq!(*errors(&events)[0], ProbeError::ProbeSettled);
    assert_eq!(end_of(&events), Some((ProbeState::Failed, 1)));
}

#[tokio::test]
async fn test_validation_errors_are_synchronous() {
    let node = Arc::new(ScriptedNode::new(key(1)));

    let mut zero_amount = request_for(1);
    zero_amount.mtokens = Millitokens::ZERO;
    let err = subscribe_to_probe_for_route(Arc::clone(&node), zero_amount)
        .err()
        .expect("zero amount rejected");
    assert!(matches!(err, ProbeError::InvalidRequest(CoreError::InvalidAmount(_))));
    assert_eq!(err.code(), 400);

    node.disable(Capability::SendToRoute);
    let err = subscribe_to_probe_for_route(Arc::clone(&node), request_for(1))
        .err()
        .expect("missing capability rejected");
    assert_eq!(err, ProbeError::MissingCapability(Capability::SendToRoute));
    assert_eq!(err.label(), "ExpectedRouterRpcToSubscribeToProbe");

    assert!(node.queries().is_empty());
}

// =========================================================================
// Cancellation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_during_attempt() {
    let node = Arc::new(ScriptedNode::new(key(1)));
    node.always_routes(vec![route_via(&[(1, zero_key())], 1)]);
    node.push_attempt_after(Duration::from_secs(30), AttemptResult::failed_at(1, "UNKNOWN_PAYMENT_HASH"));

    let mut subscription = subscribe_to_probe_for_route(Arc::clone(&node), request_for(1)).unwrap();
    let first = futures::StreamExt::next(&mut subscription).await;
    assert!(matches!(first, Some(ProbeEvent::Probing { .. })));

    subscription.unsubscribe();
    assert!(futures::StreamExt::next(&mut subscription).await.is_none());
    subscription.closed().await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(node.sent().len(), 1);
}
