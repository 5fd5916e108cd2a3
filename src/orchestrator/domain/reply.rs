//! Replies emitted at the end of every turn.

use super::{StepFailureReport, TurnState};
use crate::registry::domain::{AgentId, CapabilityName};
use crate::routing::domain::StepId;
use crate::session::domain::{SessionId, TurnId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Outcome of a turn as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    /// Every step succeeded.
    Completed,
    /// Some steps succeeded before others failed.
    PartiallyCompleted,
    /// Nothing succeeded.
    Failed,
    /// Nothing succeeded and at least one step ran out of time.
    TimedOut,
    /// The caller went away; results were discarded.
    Cancelled,
}

impl ReplyStatus {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::PartiallyCompleted => "partially_completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One successful step result, in plan order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Step identifier.
    pub step: StepId,
    /// Capability invoked.
    pub capability: CapabilityName,
    /// Agent that served the step.
    pub agent_id: AgentId,
    /// Payload returned by the agent.
    pub result: Value,
}

/// Reply to one inbound turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnReply {
    /// Turn identifier.
    pub turn_id: TurnId,
    /// Session the turn belongs to.
    pub session_id: SessionId,
    /// Caller-facing outcome.
    pub status: ReplyStatus,
    /// State the turn ended in.
    pub state: TurnState,
    /// Merged step results in plan order.
    pub payload: Value,
    /// One-line explanation of the outcome.
    pub summary: String,
    /// Every failure that contributed to the outcome.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<StepFailureReport>,
    /// Whether the whole turn can be resubmitted without repeating a
    /// side effect.
    pub retry_safe: bool,
}

impl TurnReply {
    /// Folds results into the reply payload.
    ///
    /// Results are ordered by step so the payload never depends on
    /// completion order.
    #[must_use]
    pub fn merge_payload(results: &[StepResult]) -> Value {
        let mut ordered: Vec<&StepResult> = results.iter().collect();
        ordered.sort_by_key(|result| result.step);
        json!({ "results": ordered })
    }

    /// Returns the merged result of one step, if it succeeded.
    #[must_use]
    pub fn result_for(&self, capability: &str) -> Option<&Value> {
        self.payload
            .get("results")?
            .as_array()?
            .iter()
            .find(|entry| entry.get("capability").and_then(Value::as_str) == Some(capability))
            .and_then(|entry| entry.get("result"))
    }
}
