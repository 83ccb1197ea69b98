use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// States of a probe session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeState {
    /// Session created, nothing requested from the node yet.
    Idle,
    /// Waiting for candidate routes.
    FindingRoutes,
    /// A route attempt is in flight.
    AttemptingRoute,
    /// A route reached the destination. Final state.
    Succeeded,
    /// The node has no more candidate routes. Final state.
    Exhausted,
    /// The session deadline passed. Final state.
    TimedOut,
    /// A fatal error ended the session. Final state.
    Failed,
    /// The caller unsubscribed. Final state.
    Cancelled,
}

impl ProbeState {
    /// Whether this is a final (terminal) state.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Exhausted | Self::TimedOut | Self::Failed | Self::Cancelled
        )
    }
}

impl fmt::Display for ProbeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::FindingRoutes => write!(f, "finding_routes"),
            Self::AttemptingRoute => write!(f, "attempting_route"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Inputs that drive probe state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeInput {
    /// The session was started with a validated request.
    Start,
    /// The finder returned at least one candidate.
    RoutesFound,
    /// The finder returned no candidates, or the attempt budget is spent.
    NoRoutes,
    /// The probe reached the destination.
    ReachedDestination,
    /// An intermediate hop refused the probe.
    RoutingFailed,
    /// The path deadline passed before the attempt resolved.
    PathTimedOut,
    /// The attempt resolved with neither a failure nor a preimage.
    AttemptInconclusive,
    /// The session deadline passed.
    SessionTimedOut,
    /// A transport or consistency error.
    FatalError,
    /// The caller unsubscribed.
    Unsubscribed,
}

/// Probe session transitions.
///
/// Valid transitions:
/// - Idle → FindingRoutes (Start)
/// - FindingRoutes → AttemptingRoute (RoutesFound)
/// - FindingRoutes → Exhausted (NoRoutes)
/// - AttemptingRoute → Succeeded (ReachedDestination)
/// - AttemptingRoute → FindingRoutes (RoutingFailed, PathTimedOut, AttemptInconclusive)
/// - any non-final → TimedOut (SessionTimedOut)
/// - any non-final → Failed (FatalError)
/// - any non-final → Cancelled (Unsubscribed)
pub struct ProbeStateMachine;

impl ProbeStateMachine {
    /// Attempt a state transition.
    /// Returns the new state, or an error when the input is not valid in `current`.
    pub fn transition(current: ProbeState, input: ProbeInput) -> Result<ProbeState, CoreError> {
        let new_state = match (current, input) {
            (from, _) if from.is_final() => {
                return Err(CoreError::InvalidStateTransition { from, input });
            }

            (ProbeState::Idle, ProbeInput::Start) => ProbeState::FindingRoutes,

            (ProbeState::FindingRoutes, ProbeInput::RoutesFound) => ProbeState::AttemptingRoute,
            (ProbeState::FindingRoutes, ProbeInput::NoRoutes) => ProbeState::Exhausted,

            (ProbeState::AttemptingRoute, ProbeInput::ReachedDestination) => ProbeState::Succeeded,
            (
                ProbeState::AttemptingRoute,
                ProbeInput::RoutingFailed | ProbeInput::PathTimedOut | ProbeInput::AttemptInconclusive,
            ) => ProbeState::FindingRoutes,

            // Interruptions apply from every live state.
            (_, ProbeInput::SessionTimedOut) => ProbeState::TimedOut,
            (_, ProbeInput::FatalError) => ProbeState::Failed,
            (_, ProbeInput::Unsubscribed) => ProbeState::Cancelled,

            (from, input) => return Err(CoreError::InvalidStateTransition { from, input }),
        };

        tracing::debug!(
            from = %current,
            to = %new_state,
            input = ?input,
            "probe state transition"
        );

        Ok(new_state)
    }

    /// Check if a transition is valid without performing it.
    pub fn can_transition(current: ProbeState, input: ProbeInput) -> bool {
        Self::transition(current, input).is_ok()
    }
}
