use lnprobe_core::RpcError;

/// Errors that can occur while finding routes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("amount to route must be greater than zero")]
    ZeroAmount,

    #[error("route query failed: {0}")]
    Rpc(#[from] RpcError),

    #[error("node does not support route queries")]
    Unsupported,
}
