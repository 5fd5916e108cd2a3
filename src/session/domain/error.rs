//! Error types for session mutation.

use super::{SessionId, TurnId};
use crate::routing::domain::StepId;
use thiserror::Error;

/// Errors returned while mutating a session.
///
/// None of these should reach a caller while the session manager's
/// exclusion holds; the orchestrator treats them as internal faults.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// A second turn tried to start while another turn was active.
    #[error("session {session_id} is already executing turn {active_turn}")]
    ConcurrentMutationDenied {
        /// Session being mutated.
        session_id: SessionId,
        /// Turn currently holding the session.
        active_turn: TurnId,
    },

    /// A mutation named a turn that is not the active one.
    #[error("turn {turn_id} is not active on session {session_id}")]
    TurnNotActive {
        /// Session being mutated.
        session_id: SessionId,
        /// Turn named by the mutation.
        turn_id: TurnId,
    },

    /// A step result was recorded twice within one plan.
    #[error("result for step {step} was already recorded")]
    ResultAlreadyRecorded {
        /// Step whose result already exists.
        step: StepId,
    },

    /// The session does not exist.
    #[error("session {0} not found")]
    NotFound(SessionId),
}
