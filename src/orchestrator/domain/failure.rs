//! Structured explanations of what went wrong in a turn.

use crate::dispatch::domain::DispatchError;
use crate::registry::domain::{AgentId, CapabilityName};
use crate::routing::domain::{RoutingError, StepId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable cause of a failed step or turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// No UP agent serves the capability.
    NoCapableAgent,
    /// Several plans matched the intent.
    AmbiguousIntent,
    /// Nothing matched the intent.
    UnrecognizedIntent,
    /// The agent refused the request.
    Rejected,
    /// The agent could not be reached.
    Transport,
    /// No response arrived in time.
    Timeout,
    /// The step's input could not be assembled.
    Binding,
    /// The step never ran because a dependency failed or the turn ended.
    Skipped,
    /// The host violated one of its own invariants.
    Internal,
}

impl FailureReason {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoCapableAgent => "no_capable_agent",
            Self::AmbiguousIntent => "ambiguous_intent",
            Self::UnrecognizedIntent => "unrecognized_intent",
            Self::Rejected => "rejected",
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::Binding => "binding",
            Self::Skipped => "skipped",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl From<&RoutingError> for FailureReason {
    fn from(error: &RoutingError) -> Self {
        match error {
            RoutingError::NoCapableAgent { .. } => Self::NoCapableAgent,
            RoutingError::AmbiguousIntent { .. } => Self::AmbiguousIntent,
            RoutingError::UnrecognizedIntent { .. } => Self::UnrecognizedIntent,
            RoutingError::InvalidPlan(_) => Self::Internal,
        }
    }
}

impl From<&DispatchError> for FailureReason {
    fn from(error: &DispatchError) -> Self {
        match error {
            DispatchError::Timeout => Self::Timeout,
            DispatchError::Transport(_) => Self::Transport,
            DispatchError::Rejected(_) => Self::Rejected,
        }
    }
}

/// Which step failed, on which agent, and why.
///
/// Turn-level failures such as routing errors carry no step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailureReport {
    /// Failed step, when the failure belongs to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<StepId>,
    /// Capability involved, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<CapabilityName>,
    /// Agent involved, when one was chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    /// Machine-readable cause.
    pub reason: FailureReason,
    /// Human-readable explanation.
    pub detail: String,
}

impl StepFailureReport {
    /// Creates a report for a turn-level routing failure.
    #[must_use]
    pub fn routing(error: &RoutingError) -> Self {
        let capability = match error {
            RoutingError::NoCapableAgent { capability } => Some(capability.clone()),
            RoutingError::AmbiguousIntent { .. }
            | RoutingError::UnrecognizedIntent { .. }
            | RoutingError::InvalidPlan(_) => None,
        };
        Self {
            step: None,
            capability,
            agent_id: None,
            reason: FailureReason::from(error),
            detail: error.to_string(),
        }
    }

    /// Creates a report for one step.
    #[must_use]
    pub fn step(
        step: StepId,
        capability: CapabilityName,
        reason: FailureReason,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            step: Some(step),
            capability: Some(capability),
            agent_id: None,
            reason,
            detail: detail.into(),
        }
    }

    /// Creates a report for a turn-level internal fault.
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            step: None,
            capability: None,
            agent_id: None,
            reason: FailureReason::Internal,
            detail: detail.into(),
        }
    }

    /// Attaches the agent that was chosen for the step.
    #[must_use]
    pub fn on_agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }
}

impl fmt::Display for StepFailureReport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.capability, &self.agent_id) {
            (Some(capability), Some(agent_id)) => {
                write!(formatter, "{capability} on {agent_id}: {}", self.detail)
            }
            (Some(capability), None) => write!(formatter, "{capability}: {}", self.detail),
            (None, _) => formatter.write_str(&self.detail),
        }
    }
}
