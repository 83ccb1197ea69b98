use serde::{Deserialize, Serialize};

use crate::types::{ChannelId, Ignore, Millitokens, PublicKey};

/// Upper bound of the route confidence scale.
pub const MAX_CONFIDENCE: u32 = 1_000_000;

/// A single hop of a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    /// Channel the HTLC is forwarded over.
    pub channel: ChannelId,
    /// Channel capacity in tokens.
    pub channel_capacity: u64,
    /// Fee charged by the forwarding node.
    pub fee_mtokens: Millitokens,
    /// Amount forwarded to the next node.
    pub forward_mtokens: Millitokens,
    /// Node at the far end of `channel`.
    pub public_key: Option<PublicKey>,
    /// CLTV expiry height for this hop.
    pub timeout: Option<u32>,
}

impl Hop {
    pub fn fee(&self) -> u64 {
        self.fee_mtokens.tokens()
    }

    pub fn forward(&self) -> u64 {
        self.forward_mtokens.tokens()
    }
}

/// A candidate payment route as computed by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Estimated success likelihood, 0..=1_000_000.
    pub confidence: Option<u32>,
    /// Total fees across all hops.
    pub fee_mtokens: Millitokens,
    /// Ordered hops from the source toward the destination.
    pub hops: Vec<Hop>,
    /// Total amount including fees.
    pub mtokens: Millitokens,
    /// Overall CLTV timeout height.
    pub timeout: u32,
}

impl Route {
    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    /// Fee in whole tokens, rounded down.
    pub fn fee(&self) -> u64 {
        self.fee_mtokens.tokens()
    }

    /// Fee in whole tokens, rounded up.
    pub fn safe_fee(&self) -> u64 {
        self.fee_mtokens.safe_tokens()
    }

    pub fn tokens(&self) -> u64 {
        self.mtokens.tokens()
    }

    pub fn safe_tokens(&self) -> u64 {
        self.mtokens.safe_tokens()
    }

    /// The last hop's node, if the node reported it.
    pub fn destination(&self) -> Option<&PublicKey> {
        self.hops.last().and_then(|hop| hop.public_key.as_ref())
    }

    /// Node that forwards over hop `index`: the source for hop 0, otherwise
    /// the previous hop's node.
    pub fn forwarding_node<'a>(&'a self, source: &'a PublicKey, index: usize) -> Option<&'a PublicKey> {
        match index {
            0 => Some(source),
            i => self.hops.get(i - 1).and_then(|hop| hop.public_key.as_ref()),
        }
    }

    /// Whether any hop of this route, walked from `source`, is excluded by
    /// `ignore`.
    pub fn crosses(&self, source: &PublicKey, ignore: &Ignore) -> bool {
        self.hops.iter().enumerate().any(|(index, hop)| {
            match self.forwarding_node(source, index) {
                Some(from) => ignore.matches(from, hop.channel, hop.public_key.as_ref()),
                // Unknown forwarder: only channel-level exclusions apply.
                None => match ignore {
                    Ignore::Channel { channel } => *channel == hop.channel,
                    Ignore::Edge { channel, .. } => *channel == Some(hop.channel),
                    Ignore::Node { public_key } => hop.public_key.as_ref() == Some(public_key),
                },
            }
        })
    }
}
