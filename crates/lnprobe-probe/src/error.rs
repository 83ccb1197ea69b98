use lnprobe_core::{Capability, CoreError, RpcError};
use lnprobe_routing::RoutingError;

/// Errors that end a probe session or reject it before it starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid probe request: {0}")]
    InvalidRequest(#[from] CoreError),

    #[error("node client cannot {0}")]
    MissingCapability(Capability),

    #[error("node reported no features")]
    MissingNodeFeatures,

    #[error("failed to get node info: {0}")]
    GetInfo(RpcError),

    #[error("failed to find routes: {0}")]
    FindRoutes(#[from] RoutingError),

    #[error("failed to send probe along route: {0}")]
    SendToRoute(RpcError),

    #[error("failure source index {index} is past a route of {hops} hops")]
    MalformedFailure { index: usize, hops: usize },

    #[error("probe settled with a preimage")]
    ProbeSettled,

    #[error("probe timed out")]
    ProbeTimeout,
}

impl ProbeError {
    /// HTTP-like status: 400 when the caller can fix the problem, 503 when
    /// the node, the transport or the clock is to blame.
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) | Self::MissingCapability(_) | Self::MissingNodeFeatures => 400,
            Self::GetInfo(_)
            | Self::FindRoutes(_)
            | Self::SendToRoute(_)
            | Self::MalformedFailure { .. }
            | Self::ProbeSettled
            | Self::ProbeTimeout => 503,
        }
    }

    /// Stable machine-readable name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidRequest(CoreError::MissingField(field)) if field == "destination" => {
                "ExpectedDestinationPublicKeyToSubscribeToProbe"
            }
            Self::InvalidRequest(CoreError::MissingField(_) | CoreError::InvalidAmount(_)) => {
                "ExpectedTokenAmountToSubscribeToProbe"
            }
            Self::InvalidRequest(_) => "InvalidProbeRequest",
            Self::MissingCapability(_) => "ExpectedRouterRpcToSubscribeToProbe",
            Self::MissingNodeFeatures => "ExpectedFeaturesToSubscribeToProbeDestination",
            Self::GetInfo(_) => "GetWalletInfoErr",
            Self::FindRoutes(_) => "UnexpectedErrorGettingRouteToDestination",
            Self::SendToRoute(_) => "UnexpectedErrorWhenPayingViaRoute",
            Self::MalformedFailure { .. } => "UnexpectedFailureSourceIndexInProbe",
            Self::ProbeSettled => "ProbeUnexpectedlySettled",
            Self::ProbeTimeout => "ProbeTimeout",
        }
    }
}
