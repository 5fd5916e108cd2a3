//! Registry update events.

use super::{AgentDescriptor, AgentId, HealthStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single, explicit change to the capability registry.
///
/// Every registry mutation is expressed as one of these events and applied
/// under the affected entry's lock. Applied events are also broadcast to
/// subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RegistryEvent {
    /// An agent registered or replaced its registration.
    Registered {
        /// The new descriptor.
        descriptor: AgentDescriptor,
    },
    /// An agent was explicitly removed.
    Deregistered {
        /// The removed agent.
        agent_id: AgentId,
    },
    /// The agent client observed a health change.
    HealthObserved {
        /// Observed agent.
        agent_id: AgentId,
        /// Observed status.
        status: HealthStatus,
        /// Observation time.
        observed_at: DateTime<Utc>,
    },
    /// An agent was removed after sustained unreachability.
    Evicted {
        /// The evicted agent.
        agent_id: AgentId,
    },
}

impl RegistryEvent {
    /// Returns the agent the event concerns.
    #[must_use]
    pub const fn agent_id(&self) -> &AgentId {
        match self {
            Self::Registered { descriptor } => descriptor.agent_id(),
            Self::Deregistered { agent_id }
            | Self::HealthObserved { agent_id, .. }
            | Self::Evicted { agent_id } => agent_id,
        }
    }
}
