use std::collections::BTreeSet;

use lnprobe_core::{Ignore, PublicKey, Route, RoutingFailure};

/// Nodes and edges excluded from route searches for the rest of a session.
///
/// The set only grows: entries come from the caller's request and from
/// routing failures, and are never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreSet {
    entries: BTreeSet<Ignore>,
}

impl IgnoreSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the set from caller-supplied entries.
    pub fn seeded(entries: impl IntoIterator<Item = Ignore>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Add an entry. Returns `true` if it was not already present.
    pub fn insert(&mut self, entry: Ignore) -> bool {
        self.entries.insert(entry)
    }

    /// Exclude the edge that produced `failure` on a route walked from
    /// `source`.
    ///
    /// When both endpoints are known the directed pair is ignored, pinned to
    /// the failing channel; otherwise the channel alone is ignored.
    pub fn exclude_failure(&mut self, source: &PublicKey, failure: &RoutingFailure) -> bool {
        let route = &failure.route;
        let hop = route.hops.get(failure.index);
        let channel = failure.channel.or_else(|| hop.map(|hop| hop.channel));
        let from = route.forwarding_node(source, failure.index).copied();
        let to = hop.and_then(|hop| hop.public_key);

        let entry = match (from, to, channel) {
            (Some(from_public_key), Some(to_public_key), channel) => Ignore::Edge {
                from_public_key,
                to_public_key,
                channel,
            },
            (_, _, Some(channel)) => Ignore::Channel { channel },
            _ => {
                tracing::warn!(
                    index = failure.index,
                    "routing failure names no edge, nothing to ignore"
                );
                return false;
            }
        };

        let added = self.insert(entry);
        if added {
            tracing::debug!(index = failure.index, ignored = self.len(), "ignoring failed edge");
        }
        added
    }

    /// Whether `route`, walked from `source`, avoids every entry.
    pub fn allows(&self, source: &PublicKey, route: &Route) -> bool {
        !self.entries.iter().any(|entry| route.crosses(source, entry))
    }

    pub fn contains(&self, entry: &Ignore) -> bool {
        self.entries.contains(entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ignore> {
        self.entries.iter()
    }

    /// Snapshot for a route query.
    pub fn to_vec(&self) -> Vec<Ignore> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lnprobe_core::{ChannelId, FailureReason, Hop, Millitokens};

    fn key(byte: u8) -> PublicKey {
        PublicKey::from_bytes([byte; 33])
    }

    fn hop(channel: u64, to: Option<PublicKey>) -> Hop {
        Hop {
            channel: ChannelId::from_u64(channel),
            channel_capacity: 1_000,
            fee_mtokens: Millitokens(0),
            forward_mtokens: Millitokens(1_000),
            public_key: to,
            timeout: None,
        }
    }

    fn route(hops: Vec<Hop>) -> Route {
        Route {
            confidence: None,
            fee_mtokens: Millitokens(0),
            hops,
            mtokens: Millitokens(1_000),
            timeout: 100,
        }
    }

    fn failure_at(route: Route, index: usize) -> RoutingFailure {
        RoutingFailure {
            index,
            channel: None,
            reason: FailureReason::TemporaryChannelFailure,
            mtokens: None,
            public_key: None,
            policy: None,
            update: None,
            route,
        }
    }

    #[test]
    fn test_exclude_first_hop_uses_source() {
        let mut set = IgnoreSet::new();
        let failed = route(vec![hop(1, Some(key(2))), hop(2, Some(key(3)))]);
        assert!(set.exclude_failure(&key(1), &failure_at(failed.clone(), 0)));

        assert!(set.contains(&Ignore::Edge {
            from_public_key: key(1),
            to_public_key: key(2),
            channel: Some(ChannelId::from_u64(1)),
        }));
        assert!(!set.allows(&key(1), &failed));
    }

    #[test]
    fn test_exclude_is_idempotent() {
        let mut set = IgnoreSet::new();
        let failed = route(vec![hop(1, Some(key(2)))]);
        assert!(set.exclude_failure(&key(1), &failure_at(failed.clone(), 0)));
        assert!(!set.exclude_failure(&key(1), &failure_at(failed, 0)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_exclude_falls_back_to_channel() {
        let mut set = IgnoreSet::new();
        let failed = route(vec![hop(1, None), hop(2, Some(key(3)))]);
        // Forwarder of hop 1 is the unknown key of hop 0.
        assert!(set.exclude_failure(&key(1), &failure_at(failed, 1)));
        assert!(set.contains(&Ignore::Channel {
            channel: ChannelId::from_u64(2)
        }));
    }

    #[test]
    fn test_other_routes_still_allowed() {
        let mut set = IgnoreSet::new();
        let failed = route(vec![hop(1, Some(key(2))), hop(2, Some(key(3)))]);
        set.exclude_failure(&key(1), &failure_at(failed, 1));

        let detour = route(vec![hop(1, Some(key(2))), hop(5, Some(key(4))), hop(6, Some(key(3)))]);
        assert!(set.allows(&key(1), &detour));
    }

    #[test]
    fn test_seeded_entries_snapshot() {
        let set = IgnoreSet::seeded(vec![
            Ignore::Node { public_key: key(9) },
            Ignore::Node { public_key: key(9) },
        ]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.to_vec(), vec![Ignore::Node { public_key: key(9) }]);
    }
}
