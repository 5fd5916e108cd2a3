//! Internal orchestrator faults.

use super::TurnState;
use crate::session::domain::SessionError;
use thiserror::Error;

/// Invariant violations inside the orchestrator.
///
/// These are never expected; when one occurs it is logged and reported to
/// the caller as an `internal` failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    /// A turn tried to move between states the machine does not connect.
    #[error("invalid turn transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: TurnState,
        /// Requested state.
        to: TurnState,
    },

    /// The session refused a mutation.
    #[error(transparent)]
    Session(#[from] SessionError),
}
