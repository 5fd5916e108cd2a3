//! Agent descriptor aggregate.

use super::{
    AgentAddress, AgentId, Capability, CapabilityName, HealthSnapshot, HealthStatus,
    RegistryDomainError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Everything the host knows about one specialised agent.
///
/// Created on registration. Health changes only through
/// [`AgentDescriptor::observe_health`], which the registry calls while
/// applying a health event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    agent_id: AgentId,
    address: AgentAddress,
    capabilities: Vec<Capability>,
    health: HealthSnapshot,
    registered_at: DateTime<Utc>,
}

impl AgentDescriptor {
    /// Creates a descriptor with [`HealthStatus::Unknown`] health.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError::DuplicateCapability`] when the same
    /// capability name appears twice.
    pub fn new(
        agent_id: AgentId,
        address: AgentAddress,
        capabilities: impl IntoIterator<Item = Capability>,
        registered_at: DateTime<Utc>,
    ) -> Result<Self, RegistryDomainError> {
        let declared: Vec<Capability> = capabilities.into_iter().collect();
        let mut seen = BTreeSet::new();
        for capability in &declared {
            if !seen.insert(capability.name().clone()) {
                return Err(RegistryDomainError::DuplicateCapability(
                    capability.name().as_str().to_owned(),
                ));
            }
        }

        Ok(Self {
            agent_id,
            address,
            capabilities: declared,
            health: HealthSnapshot::new(HealthStatus::Unknown, registered_at),
            registered_at,
        })
    }

    /// Sets the initial health status.
    #[must_use]
    pub fn with_health(mut self, status: HealthStatus) -> Self {
        self.health = HealthSnapshot::new(status, self.registered_at);
        self
    }

    /// Returns the agent id.
    #[must_use]
    pub const fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// Returns the network address.
    #[must_use]
    pub const fn address(&self) -> &AgentAddress {
        &self.address
    }

    /// Returns the declared capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Returns the declaration for `name`, if the agent serves it.
    #[must_use]
    pub fn capability(&self, name: &CapabilityName) -> Option<&Capability> {
        self.capabilities.iter().find(|c| c.name() == name)
    }

    /// Returns `true` when the agent declares `name`.
    #[must_use]
    pub fn declares(&self, name: &CapabilityName) -> bool {
        self.capability(name).is_some()
    }

    /// Returns the current health status.
    #[must_use]
    pub const fn health_status(&self) -> HealthStatus {
        self.health.status()
    }

    /// Returns the full health record.
    #[must_use]
    pub const fn health(&self) -> &HealthSnapshot {
        &self.health
    }

    /// Returns when the agent was registered.
    #[must_use]
    pub const fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    /// Records a health observation.
    pub fn observe_health(&mut self, status: HealthStatus, observed_at: DateTime<Utc>) {
        self.health.observe(status, observed_at);
    }
}
