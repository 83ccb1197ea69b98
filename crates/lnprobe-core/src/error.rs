use crate::state_machine::{ProbeInput, ProbeState};

/// Core validation and state errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("invalid probe transition from {from} on {input:?}")]
    InvalidStateTransition { from: ProbeState, input: ProbeInput },

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid channel id: {0}")]
    InvalidChannelId(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("validation failed: {0}")]
    ValidationError(String),
}
