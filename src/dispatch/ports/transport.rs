//! Transport port for the agent protocol.

use crate::dispatch::domain::RequestEnvelope;
use crate::registry::domain::{
    AgentAddress, AgentDescriptor, AgentId, Capability, RegistryDomainError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Wire-level contract between the host and an agent.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Delivers one request envelope and returns the agent's payload.
    ///
    /// Implementations must not enforce the envelope deadline themselves;
    /// the agent client does.
    async fn send(&self, address: &AgentAddress, envelope: &RequestEnvelope)
    -> TransportResult<Value>;

    /// Fetches the agent's self-description.
    async fn fetch_card(&self, address: &AgentAddress) -> TransportResult<AgentCard>;
}

/// Errors returned by transport adapters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The agent could not be reached (connection refused, reset, 5xx).
    #[error("agent unreachable: {0}")]
    Unreachable(String),

    /// The agent answered with something that is not a valid response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The agent explicitly refused the request (e.g. malformed payload).
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl TransportError {
    /// Returns `true` for failures worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

/// Self-description an agent publishes at startup or on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCard {
    /// Stable agent identifier.
    pub agent_id: AgentId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Agent version string.
    #[serde(default)]
    pub version: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Address the agent accepts requests on.
    pub address: AgentAddress,
    /// Declared capabilities.
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

impl AgentCard {
    /// Creates a card with no capabilities.
    #[must_use]
    pub fn new(agent_id: AgentId, address: AgentAddress) -> Self {
        Self {
            agent_id,
            name: String::new(),
            version: String::new(),
            description: String::new(),
            address,
            capabilities: Vec::new(),
        }
    }

    /// Adds a declared capability.
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Builds a registry descriptor from the card.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError::DuplicateCapability`] when the card
    /// declares a capability twice.
    pub fn into_descriptor(
        self,
        registered_at: DateTime<Utc>,
    ) -> Result<AgentDescriptor, RegistryDomainError> {
        AgentDescriptor::new(
            self.agent_id,
            self.address,
            self.capabilities,
            registered_at,
        )
    }
}
