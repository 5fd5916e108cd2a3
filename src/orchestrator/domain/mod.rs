//! Domain model for turns, their states and their replies.

mod error;
mod failure;
mod reply;
mod state;
mod turn;

pub use error::OrchestratorError;
pub use failure::{FailureReason, StepFailureReport};
pub use reply::{ReplyStatus, StepResult, TurnReply};
pub use state::TurnState;
pub use turn::InboundTurn;
