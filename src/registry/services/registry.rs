//! Concurrent capability registry.
//!
//! Provides [`CapabilityRegistry`], the process-wide table of known agents.
//! Reads and health updates lock only the affected entry; registrations
//! pass through a gate so capability schema checks see a stable view.

use crate::registry::domain::{
    AgentDescriptor, AgentId, CapabilityName, HealthStatus, RegistryEvent,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use mockable::Clock;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Capacity of the registry event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors returned by registry operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No agent with the given id is registered.
    #[error("agent not found: {0}")]
    NotFound(AgentId),

    /// Another agent declares the same capability with a different contract.
    #[error(
        "capability '{capability}' declared by '{agent_id}' is incompatible with the declaration of '{existing_agent_id}'"
    )]
    IncompatibleSchema {
        /// Conflicting capability.
        capability: CapabilityName,
        /// Agent attempting to register.
        agent_id: AgentId,
        /// Agent already holding the declaration.
        existing_agent_id: AgentId,
    },

    /// The registration gate was poisoned by a panicking writer.
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Process-wide registry of agents and their declared capabilities.
pub struct CapabilityRegistry<C>
where
    C: Clock + Send + Sync,
{
    agents: DashMap<AgentId, AgentDescriptor>,
    registration_gate: Mutex<()>,
    events: broadcast::Sender<RegistryEvent>,
    clock: Arc<C>,
}

impl<C> CapabilityRegistry<C>
where
    C: Clock + Send + Sync,
{
    /// Creates an empty registry.
    #[must_use]
    pub fn new(clock: Arc<C>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            agents: DashMap::new(),
            registration_gate: Mutex::new(()),
            events,
            clock,
        }
    }

    /// Subscribes to applied registry events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Applies a registry event.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the event targets an unknown
    /// agent, [`RegistryError::IncompatibleSchema`] when a registration
    /// conflicts with another agent's capability contract, or
    /// [`RegistryError::Unavailable`] when the registration gate is poisoned.
    pub fn apply(&self, event: RegistryEvent) -> RegistryResult<()> {
        match &event {
            RegistryEvent::Registered { descriptor } => self.insert(descriptor)?,
            RegistryEvent::Deregistered { agent_id } | RegistryEvent::Evicted { agent_id } => {
                self.agents
                    .remove(agent_id)
                    .ok_or_else(|| RegistryError::NotFound(agent_id.clone()))?;
                info!(agent_id = %agent_id, "agent removed from registry");
            }
            RegistryEvent::HealthObserved {
                agent_id,
                status,
                observed_at,
            } => {
                let mut entry = self
                    .agents
                    .get_mut(agent_id)
                    .ok_or_else(|| RegistryError::NotFound(agent_id.clone()))?;
                let previous = entry.health_status();
                entry.observe_health(*status, *observed_at);
                if previous != *status {
                    match status {
                        HealthStatus::Down => warn!(agent_id = %agent_id, "agent marked down"),
                        HealthStatus::Up => info!(agent_id = %agent_id, %previous, "agent marked up"),
                        HealthStatus::Unknown => debug!(agent_id = %agent_id, "agent health reset"),
                    }
                }
            }
        }

        self.announce(event);
        Ok(())
    }

    fn announce(&self, event: RegistryEvent) {
        if self.events.send(event).is_err() {
            debug!("registry event applied with no subscribers");
        }
    }

    fn insert(&self, descriptor: &AgentDescriptor) -> RegistryResult<()> {
        let _gate = self
            .registration_gate
            .lock()
            .map_err(|err| RegistryError::Unavailable(err.to_string()))?;

        for entry in &self.agents {
            let existing = entry.value();
            if existing.agent_id() == descriptor.agent_id() {
                continue;
            }
            for capability in descriptor.capabilities() {
                if let Some(declared) = existing.capability(capability.name())
                    && !declared.is_compatible_with(capability)
                {
                    return Err(RegistryError::IncompatibleSchema {
                        capability: capability.name().clone(),
                        agent_id: descriptor.agent_id().clone(),
                        existing_agent_id: existing.agent_id().clone(),
                    });
                }
            }
        }

        let capability_count = descriptor.capabilities().len();
        self.agents
            .insert(descriptor.agent_id().clone(), descriptor.clone());
        info!(
            agent_id = %descriptor.agent_id(),
            address = %descriptor.address(),
            capability_count,
            health = %descriptor.health_status(),
            "agent registered"
        );
        Ok(())
    }

    /// Adds or replaces an agent registration.
    ///
    /// # Errors
    ///
    /// See [`CapabilityRegistry::apply`].
    pub fn register(&self, descriptor: AgentDescriptor) -> RegistryResult<()> {
        self.apply(RegistryEvent::Registered { descriptor })
    }

    /// Removes an agent registration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the agent is unknown.
    pub fn deregister(&self, agent_id: &AgentId) -> RegistryResult<()> {
        self.apply(RegistryEvent::Deregistered {
            agent_id: agent_id.clone(),
        })
    }

    /// Records a liveness observation for an agent.
    ///
    /// Only the agent client calls this, after each contact attempt.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the agent is unknown.
    pub fn mark_health(&self, agent_id: &AgentId, status: HealthStatus) -> RegistryResult<()> {
        self.apply(RegistryEvent::HealthObserved {
            agent_id: agent_id.clone(),
            status,
            observed_at: self.clock.utc(),
        })
    }

    /// Returns UP agents declaring `capability`, most recently healthy first.
    ///
    /// Agents with equal contact times are ordered by id.
    #[must_use]
    pub fn find(&self, capability: &CapabilityName) -> Vec<AgentDescriptor> {
        let mut candidates: Vec<AgentDescriptor> = self
            .agents
            .iter()
            .filter(|entry| {
                entry.health_status() == HealthStatus::Up && entry.declares(capability)
            })
            .map(|entry| entry.value().clone())
            .collect();
        candidates.sort_by(|a, b| {
            b.health()
                .last_success_at()
                .cmp(&a.health().last_success_at())
                .then_with(|| a.agent_id().cmp(b.agent_id()))
        });
        candidates
    }

    /// Returns `true` when any registered agent declares `capability`,
    /// regardless of health.
    #[must_use]
    pub fn is_declared(&self, capability: &CapabilityName) -> bool {
        self.agents.iter().any(|entry| entry.declares(capability))
    }

    /// Returns every capability name declared by at least one agent.
    #[must_use]
    pub fn capability_names(&self) -> Vec<CapabilityName> {
        let mut names: Vec<CapabilityName> = self
            .agents
            .iter()
            .flat_map(|entry| {
                entry
                    .capabilities()
                    .iter()
                    .map(|c| c.name().clone())
                    .collect::<Vec<_>>()
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Returns the descriptor for `agent_id`, if registered.
    #[must_use]
    pub fn get(&self, agent_id: &AgentId) -> Option<AgentDescriptor> {
        self.agents.get(agent_id).map(|entry| entry.value().clone())
    }

    /// Returns every registered descriptor ordered by agent id.
    #[must_use]
    pub fn list(&self) -> Vec<AgentDescriptor> {
        let mut all: Vec<AgentDescriptor> =
            self.agents.iter().map(|entry| entry.value().clone()).collect();
        all.sort_by(|a, b| a.agent_id().cmp(b.agent_id()));
        all
    }

    /// Evicts agents that have been DOWN for at least `threshold`.
    ///
    /// Returns the evicted agent ids.
    pub fn evict_unreachable(&self, threshold: Duration) -> Vec<AgentId> {
        let now = self.clock.utc();
        let candidates: Vec<AgentId> = self
            .agents
            .iter()
            .filter(|entry| down_for(entry.value(), now, threshold))
            .map(|entry| entry.key().clone())
            .collect();

        candidates
            .into_iter()
            .filter(|agent_id| self.evict_if_unreachable(agent_id, threshold))
            .collect()
    }

    /// Evicts one agent if it is still DOWN for at least `threshold`.
    ///
    /// The health check and the removal happen under the agent's entry, so
    /// an agent observed UP in the meantime stays registered. Returns
    /// `true` when the agent was evicted.
    #[must_use]
    pub fn evict_if_unreachable(&self, agent_id: &AgentId, threshold: Duration) -> bool {
        let now = self.clock.utc();
        let removed = self
            .agents
            .remove_if(agent_id, |_, descriptor| down_for(descriptor, now, threshold));
        if removed.is_none() {
            return false;
        }
        info!(agent_id = %agent_id, "agent evicted from registry");
        self.announce(RegistryEvent::Evicted {
            agent_id: agent_id.clone(),
        });
        true
    }

    /// Returns the number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Returns `true` when no agents are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

fn down_for(descriptor: &AgentDescriptor, now: DateTime<Utc>, threshold: Duration) -> bool {
    descriptor.health_status() == HealthStatus::Down
        && descriptor.health().down_since().is_some_and(|since| {
            now.signed_duration_since(since)
                .to_std()
                .is_ok_and(|elapsed| elapsed >= threshold)
        })
}
