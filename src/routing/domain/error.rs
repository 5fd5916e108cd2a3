//! Error types for routing and plan construction.

use super::StepId;
use crate::registry::domain::CapabilityName;
use thiserror::Error;

/// Why the router could not produce a plan.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutingError {
    /// No UP agent serves a capability the plan needs.
    #[error("no capable agent for capability '{capability}'")]
    NoCapableAgent {
        /// Capability without a servable agent.
        capability: CapabilityName,
    },

    /// Several candidate plans matched and no tie-break resolved them.
    #[error("ambiguous intent, candidates: {}", candidates.join(", "))]
    AmbiguousIntent {
        /// Names of the competing candidates.
        candidates: Vec<String>,
    },

    /// Nothing in the intent matched a known capability.
    #[error("unrecognised intent: '{text}'")]
    UnrecognizedIntent {
        /// The intent text that failed to match.
        text: String,
    },

    /// A configured rule produced a malformed plan.
    #[error(transparent)]
    InvalidPlan(#[from] PlanError),
}

/// Structural errors in a plan's dependency graph.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    /// The plan has no steps.
    #[error("plan must contain at least one step")]
    Empty,

    /// A step depends on itself or on a later step.
    #[error("step {step} depends on step {dependency}, which does not precede it")]
    ForwardDependency {
        /// Offending step.
        step: StepId,
        /// The dependency that does not precede it.
        dependency: StepId,
    },

    /// A step binds the result of a step it does not depend on.
    #[error("step {step} reads the result of step {referenced} without depending on it")]
    UnboundDependency {
        /// Offending step.
        step: StepId,
        /// The step whose result is read.
        referenced: StepId,
    },
}
