//! Fixtures shared by the cross-crate probe scenarios.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lnprobe_core::{
    AttemptResult, Capability, ChannelId, Hop, LightningRpc, Millitokens, NodeFeature, NodeInfo,
    PaymentHash, ProbeState, PublicKey, Route, RouteQuery, RpcError,
};
use lnprobe_probe::{ProbeEvent, ProbeSubscription};

/// Longest path the graph search explores.
const MAX_HOPS: usize = 4;

pub fn key(byte: u8) -> PublicKey {
    PublicKey::from_bytes([byte; 33])
}

/// The all-zero public key.
pub fn zero_key() -> PublicKey {
    PublicKey::from_bytes([0; 33])
}

/// A fee-free route over `hops`, given as (channel, far-end node) pairs.
pub fn route_via(hops: &[(u64, PublicKey)], mtokens: u128) -> Route {
    Route {
        confidence: None,
        fee_mtokens: Millitokens::ZERO,
        hops: hops
            .iter()
            .map(|(channel, to)| Hop {
                channel: ChannelId::from_u64(*channel),
                channel_capacity: 1_000_000,
                fee_mtokens: Millitokens::ZERO,
                forward_mtokens: Millitokens(mtokens),
                public_key: Some(*to),
                timeout: Some(800_040),
            })
            .collect(),
        mtokens: Millitokens(mtokens),
        timeout: 800_040,
    }
}

/// Drain a subscription until it ends.
pub async fn collect(mut subscription: ProbeSubscription) -> Vec<ProbeEvent> {
    let mut events = Vec::new();
    while let Some(event) = subscription.next().await {
        events.push(event);
    }
    events
}

pub fn names(events: &[ProbeEvent]) -> Vec<&'static str> {
    events.iter().map(ProbeEvent::name).collect()
}

/// State and attempt count of the `End` event, if there is one.
pub fn end_of(events: &[ProbeEvent]) -> Option<(ProbeState, u32)> {
    events.iter().find_map(|event| match event {
        ProbeEvent::End { state, attempts } => Some((*state, *attempts)),
        _ => None,
    })
}

/// Checks that a finished session produced `End` exactly once, as its last
/// event, with at most one terminal payload right before it.
pub fn assert_single_terminal(events: &[ProbeEvent]) {
    let ends = events
        .iter()
        .filter(|event| matches!(event, ProbeEvent::End { .. }))
        .count();
    assert_eq!(ends, 1, "expected one end event in {:?}", names(events));
    assert!(matches!(events.last(), Some(ProbeEvent::End { .. })));

    let payloads: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, event)| matches!(event, ProbeEvent::ProbeSuccess { .. } | ProbeEvent::Error(_)))
        .map(|(i, _)| i)
        .collect();
    assert!(payloads.len() <= 1, "several terminal payloads in {:?}", names(events));
    if let Some(index) = payloads.first() {
        assert_eq!(*index, events.len() - 2);
    }
}

/// A public channel between two nodes.
#[derive(Debug, Clone)]
pub struct GraphChannel {
    pub id: ChannelId,
    pub a: PublicKey,
    pub b: PublicKey,
}

impl GraphChannel {
    pub fn new(id: u64, a: PublicKey, b: PublicKey) -> Self {
        Self {
            id: ChannelId::from_u64(id),
            a,
            b,
        }
    }

    fn peer_of(&self, node: &PublicKey) -> Option<PublicKey> {
        if *node == self.a {
            Some(self.b)
        } else if *node == self.b {
            Some(self.a)
        } else {
            None
        }
    }
}

/// A node that searches a small channel graph for routes and fails HTLCs on
/// channels marked broken.
///
/// Route queries return the shortest path that avoids the query's ignore
/// list, the way a real node honours it. Attempts fail with
/// `TEMPORARY_CHANNEL_FAILURE` at the first broken channel, otherwise the
/// destination rejects the unknown payment hash.
pub struct GraphNode {
    source: PublicKey,
    channels: Vec<GraphChannel>,
    broken: HashSet<ChannelId>,
    queries: Mutex<Vec<RouteQuery>>,
    attempted: Mutex<Vec<Route>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl GraphNode {
    pub fn new(source: PublicKey, channels: Vec<GraphChannel>) -> Self {
        Self {
            source,
            channels,
            broken: HashSet::new(),
            queries: Mutex::new(Vec::new()),
            attempted: Mutex::new(Vec::new()),
        }
    }

    pub fn break_channel(mut self, id: u64) -> Self {
        self.broken.insert(ChannelId::from_u64(id));
        self
    }

    pub fn queries(&self) -> Vec<RouteQuery> {
        lock(&self.queries).clone()
    }

    pub fn attempted(&self) -> Vec<Route> {
        lock(&self.attempted).clone()
    }

    fn walk(
        &self,
        at: PublicKey,
        query: &RouteQuery,
        path: &mut Vec<(u64, PublicKey)>,
        found: &mut Vec<Vec<(u64, PublicKey)>>,
    ) {
        if at == query.destination {
            found.push(path.clone());
            return;
        }
        if path.len() >= MAX_HOPS {
            return;
        }
        for channel in &self.channels {
            let Some(next) = channel.peer_of(&at) else {
                continue;
            };
            if next == self.source || path.iter().any(|(_, node)| *node == next) {
                continue;
            }
            if query
                .ignore
                .iter()
                .any(|entry| entry.matches(&at, channel.id, Some(&next)))
            {
                continue;
            }
            path.push((channel.id.as_u64(), next));
            self.walk(next, query, path, found);
            path.pop();
        }
    }
}

#[async_trait]
impl LightningRpc for GraphNode {
    fn supports(&self, _capability: Capability) -> bool {
        true
    }

    async fn get_info(&self) -> Result<NodeInfo, RpcError> {
        Ok(NodeInfo {
            public_key: self.source,
            alias: "graph".into(),
            block_height: 800_000,
            features: vec![NodeFeature {
                bit: 9,
                name: "tlv-onion".into(),
                is_known: true,
                is_required: false,
            }],
            is_synced_to_chain: true,
        })
    }

    async fn query_routes(&self, query: &RouteQuery) -> Result<Vec<Route>, RpcError> {
        lock(&self.queries).push(query.clone());

        let mut found = Vec::new();
        self.walk(self.source, query, &mut Vec::new(), &mut found);
        let shortest = found.into_iter().min_by_key(Vec::len);
        Ok(shortest
            .map(|hops| vec![route_via(&hops, query.mtokens.0)])
            .unwrap_or_default())
    }

    async fn send_to_route(
        &self,
        route: &Route,
        _payment_hash: &PaymentHash,
    ) -> Result<AttemptResult, RpcError> {
        lock(&self.attempted).push(route.clone());

        let broken = route
            .hops
            .iter()
            .position(|hop| self.broken.contains(&hop.channel));
        Ok(match broken {
            Some(index) => AttemptResult::failed_at(index, "TEMPORARY_CHANNEL_FAILURE"),
            None => AttemptResult::failed_at(route.hop_count(), "INCORRECT_OR_UNKNOWN_PAYMENT_DETAILS"),
        })
    }
}
