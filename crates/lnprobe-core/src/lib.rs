//! lnprobe core: the shared vocabulary of the probe engine.
//!
//! Node identifiers and amounts, routes, normalized routing failures, the
//! [`LightningRpc`] trait a node client implements, and the probe session
//! state machine.

pub mod config;
pub mod error;
pub mod failure;
pub mod route;
pub mod rpc;
pub mod state_machine;
pub mod types;

pub use config::ProbeConfig;
pub use error::CoreError;
pub use failure::{FailurePolicy, FailureReason, FailureUpdate, RoutingFailure};
pub use route::{Hop, Route, MAX_CONFIDENCE};
pub use rpc::{
    AttemptResult, Capability, ChannelUpdate, HopFailure, LightningRpc, NodeFeature, NodeInfo,
    RouteQuery, RpcError,
};
pub use state_machine::{ProbeInput, ProbeState, ProbeStateMachine};
pub use types::{ChannelId, HintHop, Ignore, Millitokens, PaymentHash, PublicKey, RouteHint};
