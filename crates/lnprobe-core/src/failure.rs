//! Normalized routing failures.
//!
//! A node reports a failed HTLC with a wire code, the index of the hop that
//! produced it, and sometimes a fresh channel update. This module turns that
//! raw report into a [`RoutingFailure`] that names the failing channel and node.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::route::Route;
use crate::rpc::{ChannelUpdate, HopFailure};
use crate::types::{ChannelId, Millitokens, PublicKey};

/// Channel flag bit marking the channel as disabled in a channel update.
const DISABLED_FLAG: u32 = 0b10;

/// Why a hop refused to forward.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    AmountBelowMinimum,
    ChannelDisabled,
    ExpiryTooFar,
    ExpiryTooSoon,
    FeeInsufficient,
    FinalExpiryTooSoon,
    FinalIncorrectCltvExpiry,
    FinalIncorrectHtlcAmount,
    IncorrectCltvExpiry,
    IncorrectPaymentAmount,
    InsufficientBalance,
    InternalFailure,
    InvalidOnionBlinding,
    InvalidOnionHmac,
    InvalidOnionKey,
    InvalidOnionPayload,
    InvalidOnionVersion,
    InvalidRealm,
    MppTimeout,
    PermanentChannelFailure,
    PermanentNodeFailure,
    RequiredChannelFeatureMissing,
    RequiredNodeFeatureMissing,
    TemporaryChannelFailure,
    TemporaryNodeFailure,
    UnknownFailure,
    UnknownNextPeer,
    UnknownPaymentHash,
    UnreadableFailure,
    /// A code this crate does not know about, kept verbatim.
    Other(String),
}

impl FailureReason {
    /// Normalize a node failure code such as `TEMPORARY_CHANNEL_FAILURE`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "AMOUNT_BELOW_MINIMUM" => Self::AmountBelowMinimum,
            "CHANNEL_DISABLED" => Self::ChannelDisabled,
            "EXPIRY_TOO_FAR" => Self::ExpiryTooFar,
            "EXPIRY_TOO_SOON" => Self::ExpiryTooSoon,
            "FEE_INSUFFICIENT" => Self::FeeInsufficient,
            "FINAL_EXPIRY_TOO_SOON" => Self::FinalExpiryTooSoon,
            "FINAL_INCORRECT_CLTV_EXPIRY" => Self::FinalIncorrectCltvExpiry,
            "FINAL_INCORRECT_HTLC_AMOUNT" => Self::FinalIncorrectHtlcAmount,
            "INCORRECT_CLTV_EXPIRY" => Self::IncorrectCltvExpiry,
            "INCORRECT_PAYMENT_AMOUNT" => Self::IncorrectPaymentAmount,
            "INSUFFICIENT_BALANCE" => Self::InsufficientBalance,
            "INTERNAL_FAILURE" => Self::InternalFailure,
            "INVALID_ONION_BLINDING" => Self::InvalidOnionBlinding,
            "INVALID_ONION_HMAC" => Self::InvalidOnionHmac,
            "INVALID_ONION_KEY" => Self::InvalidOnionKey,
            "INVALID_ONION_PAYLOAD" => Self::InvalidOnionPayload,
            "INVALID_ONION_VERSION" => Self::InvalidOnionVersion,
            "INVALID_REALM" => Self::InvalidRealm,
            "MPP_TIMEOUT" => Self::MppTimeout,
            "PERMANENT_CHANNEL_FAILURE" => Self::PermanentChannelFailure,
            "PERMANENT_NODE_FAILURE" => Self::PermanentNodeFailure,
            "REQUIRED_CHANNEL_FEATURE_MISSING" => Self::RequiredChannelFeatureMissing,
            "REQUIRED_NODE_FEATURE_MISSING" => Self::RequiredNodeFeatureMissing,
            "TEMPORARY_CHANNEL_FAILURE" => Self::TemporaryChannelFailure,
            "TEMPORARY_NODE_FAILURE" => Self::TemporaryNodeFailure,
            "UNKNOWN_FAILURE" => Self::UnknownFailure,
            "UNKNOWN_NEXT_PEER" => Self::UnknownNextPeer,
            "INCORRECT_OR_UNKNOWN_PAYMENT_DETAILS" | "UNKNOWN_PAYMENT_HASH" => {
                Self::UnknownPaymentHash
            }
            "UNREADABLE_FAILURE" => Self::UnreadableFailure,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(code) => write!(f, "{code}"),
            known => write!(f, "{known:?}"),
        }
    }
}

/// Forwarding policy advertised in the failing node's channel update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailurePolicy {
    pub base_fee_mtokens: Millitokens,
    pub cltv_delta: u32,
    /// Millitokens charged per million forwarded.
    pub fee_rate: u32,
    pub is_disabled: bool,
    pub max_htlc_mtokens: Millitokens,
    pub min_htlc_mtokens: Millitokens,
    pub updated_at: DateTime<Utc>,
}

/// Raw channel update fields that are not part of the policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureUpdate {
    /// Chain hash, hex.
    pub chain: String,
    pub channel_flags: u32,
    /// Hex.
    pub extra_opaque_data: String,
    pub message_flags: u32,
    /// Hex.
    pub signature: String,
}

impl FailurePolicy {
    fn from_update(update: &ChannelUpdate) -> Self {
        let updated_at = Utc
            .timestamp_opt(i64::from(update.timestamp), 0)
            .single()
            .unwrap_or_default();
        Self {
            base_fee_mtokens: update.base_fee_mtokens,
            cltv_delta: update.time_lock_delta,
            fee_rate: update.fee_rate,
            is_disabled: update.channel_flags & DISABLED_FLAG != 0,
            max_htlc_mtokens: update.htlc_maximum_mtokens,
            min_htlc_mtokens: update.htlc_minimum_mtokens,
            updated_at,
        }
    }
}

impl FailureUpdate {
    fn from_update(update: &ChannelUpdate) -> Self {
        Self {
            chain: update.chain_hash.clone(),
            channel_flags: update.channel_flags,
            extra_opaque_data: update.extra_opaque_data.clone(),
            message_flags: update.message_flags,
            signature: update.signature.clone(),
        }
    }
}

/// A hop refused to forward a probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingFailure {
    /// Index of the hop whose forwarding node failed.
    pub index: usize,
    /// Channel the failing node was asked to forward over.
    pub channel: Option<ChannelId>,
    pub reason: FailureReason,
    /// HTLC amount the failing node saw, when reported.
    pub mtokens: Option<Millitokens>,
    /// Node that produced the failure.
    pub public_key: Option<PublicKey>,
    pub policy: Option<FailurePolicy>,
    pub update: Option<FailureUpdate>,
    /// The route the failure happened on.
    pub route: Route,
}

impl RoutingFailure {
    /// Build a failure record for an intermediate hop of `route` that was
    /// walked from `source`.
    pub fn from_hop_failure(source: &PublicKey, route: &Route, failure: &HopFailure) -> Self {
        let index = failure.failure_source_index;
        let channel = failure
            .channel
            .or_else(|| route.hops.get(index).map(|hop| hop.channel));

        Self {
            index,
            channel,
            reason: FailureReason::from_code(&failure.code),
            mtokens: failure.htlc_mtokens,
            public_key: route.forwarding_node(source, index).copied(),
            policy: failure.channel_update.as_ref().map(FailurePolicy::from_update),
            update: failure.channel_update.as_ref().map(FailureUpdate::from_update),
            route: route.clone(),
        }
    }
}
