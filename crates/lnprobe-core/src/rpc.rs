use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::route::Route;
use crate::types::{ChannelId, Ignore, Millitokens, PaymentHash, PublicKey, RouteHint};

/// A node RPC method the probe engine depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    GetInfo,
    QueryRoutes,
    SendToRoute,
}

impl Capability {
    /// Every capability a probe session needs.
    pub const PROBING: [Capability; 3] = [
        Capability::GetInfo,
        Capability::QueryRoutes,
        Capability::SendToRoute,
    ];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GetInfo => write!(f, "get_info"),
            Self::QueryRoutes => write!(f, "query_routes"),
            Self::SendToRoute => write!(f, "send_to_route"),
        }
    }
}

/// Errors surfaced by a node RPC client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    #[error("node unavailable: {0}")]
    Unavailable(String),

    #[error("request rejected by node: {0}")]
    Rejected(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// A feature bit advertised by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFeature {
    pub bit: u32,
    pub name: String,
    pub is_known: bool,
    pub is_required: bool,
}

/// Identity and status of the node the client talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub public_key: PublicKey,
    pub alias: String,
    pub block_height: u32,
    pub features: Vec<NodeFeature>,
    pub is_synced_to_chain: bool,
}

/// Route search parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteQuery {
    pub destination: PublicKey,
    pub mtokens: Millitokens,
    /// Final hop CLTV delta.
    pub cltv_delta: Option<u16>,
    pub ignore: Vec<Ignore>,
    /// Last node before the destination.
    pub incoming_peer: Option<PublicKey>,
    pub max_fee_mtokens: Option<Millitokens>,
    pub max_timeout_height: Option<u32>,
    pub outgoing_channel: Option<ChannelId>,
    pub routes: Vec<RouteHint>,
}

/// A channel update attached to a hop failure, as the node reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelUpdate {
    /// Hex.
    pub chain_hash: String,
    pub channel: Option<ChannelId>,
    pub timestamp: u32,
    pub message_flags: u32,
    pub channel_flags: u32,
    pub time_lock_delta: u32,
    pub htlc_minimum_mtokens: Millitokens,
    pub base_fee_mtokens: Millitokens,
    pub fee_rate: u32,
    pub htlc_maximum_mtokens: Millitokens,
    /// Hex.
    pub extra_opaque_data: String,
    /// Hex.
    pub signature: String,
}

/// Where and why an HTLC attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopFailure {
    pub channel: Option<ChannelId>,
    /// Wire failure code, e.g. `TEMPORARY_CHANNEL_FAILURE`.
    pub code: String,
    /// 0 is the sending node, `hops.len()` is the destination.
    pub failure_source_index: usize,
    pub htlc_mtokens: Option<Millitokens>,
    pub channel_update: Option<ChannelUpdate>,
}

/// Node answer to a send-to-route call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptResult {
    pub failure: Option<HopFailure>,
    /// Empty unless the HTLC settled.
    pub preimage: Vec<u8>,
}

impl AttemptResult {
    /// A failure reported by the node at `failure_source_index` with no
    /// channel update attached.
    pub fn failed_at(failure_source_index: usize, code: impl Into<String>) -> Self {
        Self {
            failure: Some(HopFailure {
                channel: None,
                code: code.into(),
                failure_source_index,
                htlc_mtokens: None,
                channel_update: None,
            }),
            preimage: Vec::new(),
        }
    }

    /// The HTLC settled and the node revealed `preimage`.
    pub fn settled(preimage: Vec<u8>) -> Self {
        Self {
            failure: None,
            preimage,
        }
    }
}

/// RPC surface of a Lightning node used by route probing.
///
/// Implementations bridge to a concrete node API. Callers check
/// [`supports`](Self::supports) before relying on a method.
#[async_trait]
pub trait LightningRpc: Send + Sync {
    /// Whether this client can perform `capability`.
    fn supports(&self, capability: Capability) -> bool;

    /// Identity, chain status and features of the node.
    async fn get_info(&self) -> Result<NodeInfo, RpcError>;

    /// Candidate routes for `query`, best first. An empty list means no
    /// route exists under the given constraints.
    async fn query_routes(&self, query: &RouteQuery) -> Result<Vec<Route>, RpcError>;

    /// Send an HTLC along `route` locked to `payment_hash` and report how it
    /// resolved.
    async fn send_to_route(
        &self,
        route: &Route,
        payment_hash: &PaymentHash,
    ) -> Result<AttemptResult, RpcError>;
}
