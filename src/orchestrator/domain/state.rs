//! Turn state machine.

use super::OrchestratorError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one in-flight turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnState {
    /// The turn has been paired with its session.
    Received,
    /// The router is producing, or has produced, a plan.
    Planned,
    /// Plan steps are being dispatched.
    Executing,
    /// Step results are being folded into the reply.
    Merging,
    /// The reply was committed to the session.
    Replied,
    /// The turn ended without a complete result.
    Failed,
}

impl TurnState {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Planned => "PLANNED",
            Self::Executing => "EXECUTING",
            Self::Merging => "MERGING",
            Self::Replied => "REPLIED",
            Self::Failed => "FAILED",
        }
    }

    /// Returns `true` for `Replied` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Replied | Self::Failed)
    }

    /// Returns `true` when the machine allows moving to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Received, Self::Planned)
                | (Self::Planned | Self::Executing, Self::Failed)
                | (Self::Planned, Self::Executing)
                | (Self::Executing, Self::Merging)
                | (Self::Merging, Self::Replied)
        )
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::InvalidTransition`] when the move is not
    /// part of the machine.
    pub const fn transition(self, next: Self) -> Result<Self, OrchestratorError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(OrchestratorError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::TurnState;
    use rstest::rstest;

    #[rstest]
    #[case(TurnState::Received, TurnState::Planned)]
    #[case(TurnState::Planned, TurnState::Executing)]
    #[case(TurnState::Planned, TurnState::Failed)]
    #[case(TurnState::Executing, TurnState::Merging)]
    #[case(TurnState::Executing, TurnState::Failed)]
    #[case(TurnState::Merging, TurnState::Replied)]
    fn allowed_transitions(#[case] from: TurnState, #[case] to: TurnState) {
        assert_eq!(from.transition(to), Ok(to));
    }

    #[rstest]
    #[case(TurnState::Received, TurnState::Executing)]
    #[case(TurnState::Received, TurnState::Failed)]
    #[case(TurnState::Merging, TurnState::Failed)]
    #[case(TurnState::Replied, TurnState::Planned)]
    #[case(TurnState::Failed, TurnState::Replied)]
    fn forbidden_transitions(#[case] from: TurnState, #[case] to: TurnState) {
        assert!(from.transition(to).is_err());
    }
}
