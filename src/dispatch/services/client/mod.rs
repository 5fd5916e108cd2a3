//! The agent client: deadlines, bounded retry and liveness reporting.

use crate::dispatch::{
    domain::{
        DispatchError, HealthPolicy, RequestEnvelope, ResponseEnvelope, RetryPolicy,
    },
    ports::{AgentTransport, TransportError},
};
use crate::registry::{
    domain::{AgentAddress, AgentDescriptor, AgentId, HealthStatus, RegistryDomainError},
    services::{CapabilityRegistry, RegistryError},
};
use dashmap::DashMap;
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Errors returned while discovering or probing agents.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The agent card could not be fetched.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The agent card is not a valid declaration.
    #[error(transparent)]
    Domain(#[from] RegistryDomainError),
    /// The registry refused the registration.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Uniform client for calling capabilities on agents.
pub struct AgentClient<T, C>
where
    T: AgentTransport,
    C: Clock + Send + Sync,
{
    transport: Arc<T>,
    registry: Arc<CapabilityRegistry<C>>,
    clock: Arc<C>,
    retry: RetryPolicy,
    health: HealthPolicy,
    failure_streaks: DashMap<AgentId, u32>,
}

impl<T, C> AgentClient<T, C>
where
    T: AgentTransport,
    C: Clock + Send + Sync,
{
    /// Creates a client reporting liveness into `registry`.
    #[must_use]
    pub fn new(
        transport: Arc<T>,
        registry: Arc<CapabilityRegistry<C>>,
        clock: Arc<C>,
        retry: RetryPolicy,
        health: HealthPolicy,
    ) -> Self {
        Self {
            transport,
            registry,
            clock,
            retry,
            health,
            failure_streaks: DashMap::new(),
        }
    }

    /// Returns the retry policy in force.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Returns the current consecutive failure count for an agent.
    #[must_use]
    pub fn failure_streak(&self, agent_id: &AgentId) -> u32 {
        self.failure_streaks
            .get(agent_id)
            .map_or(0, |streak| *streak)
    }

    fn time_left(&self, envelope: &RequestEnvelope) -> Duration {
        envelope
            .deadline()
            .signed_duration_since(self.clock.utc())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Calls the envelope's capability on `agent`.
    ///
    /// No response by the envelope deadline yields a TIMEOUT response.
    /// Transient transport failures are retried with exponential backoff,
    /// each retry under a fresh request id. Rejections are returned as
    /// FAILED immediately. Every attempt updates the agent's health.
    pub async fn call(&self, agent: &AgentDescriptor, envelope: RequestEnvelope) -> ResponseEnvelope {
        let agent_id = agent.agent_id().clone();
        let deadline = Instant::now() + self.time_left(&envelope);
        let mut attempt_envelope = envelope;

        loop {
            let attempt = attempt_envelope.attempt();
            debug!(
                agent_id = %agent_id,
                capability = %attempt_envelope.capability_name(),
                request_id = %attempt_envelope.request_id(),
                attempt,
                "dispatching request"
            );

            let sent = tokio::time::timeout_at(
                deadline,
                self.transport.send(agent.address(), &attempt_envelope),
            )
            .await;

            let failure = match sent {
                Ok(Ok(payload)) => {
                    self.record_success(&agent_id);
                    return ResponseEnvelope::ok(
                        attempt_envelope.request_id(),
                        agent_id,
                        attempt,
                        payload,
                    );
                }
                Ok(Err(TransportError::Rejected(reason))) => {
                    self.record_success(&agent_id);
                    warn!(agent_id = %agent_id, %reason, "request rejected by agent");
                    return ResponseEnvelope::from_error(
                        attempt_envelope.request_id(),
                        agent_id,
                        attempt,
                        DispatchError::Rejected(reason),
                    );
                }
                Ok(Err(err)) => err,
                Err(_elapsed) => {
                    self.record_failure(&agent_id);
                    warn!(agent_id = %agent_id, attempt, "request timed out");
                    return ResponseEnvelope::from_error(
                        attempt_envelope.request_id(),
                        agent_id,
                        attempt,
                        DispatchError::Timeout,
                    );
                }
            };

            self.record_failure(&agent_id);
            if !failure.is_transient() || attempt >= self.retry.max_attempts() {
                warn!(agent_id = %agent_id, attempt, error = %failure, "dispatch failed");
                return ResponseEnvelope::from_error(
                    attempt_envelope.request_id(),
                    agent_id,
                    attempt,
                    DispatchError::Transport(failure.to_string()),
                );
            }

            let delay = self.retry.backoff(attempt);
            if Instant::now() + delay >= deadline {
                warn!(agent_id = %agent_id, attempt, "deadline reached while backing off");
                return ResponseEnvelope::from_error(
                    attempt_envelope.request_id(),
                    agent_id,
                    attempt,
                    DispatchError::Timeout,
                );
            }
            debug!(agent_id = %agent_id, attempt, ?delay, error = %failure, "retrying after transient failure");
            tokio::time::sleep(delay).await;
            attempt_envelope = attempt_envelope.next_attempt();
        }
    }

    /// Fetches an agent card and registers the agent as UP.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] when the card cannot be fetched, is
    /// invalid, or conflicts with existing registrations.
    pub async fn discover(&self, address: &AgentAddress) -> Result<AgentDescriptor, DiscoveryError> {
        let card = self.transport.fetch_card(address).await?;
        let descriptor = card
            .into_descriptor(self.clock.utc())?
            .with_health(HealthStatus::Up);
        self.registry.register(descriptor.clone())?;
        self.failure_streaks.remove(descriptor.agent_id());
        Ok(descriptor)
    }

    /// Probes a registered agent by re-fetching its card.
    ///
    /// Returns the agent's health after the probe.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Registry`] when the agent is not
    /// registered. Probe failures are not errors; they count towards the
    /// failure streak.
    pub async fn probe(&self, agent_id: &AgentId) -> Result<HealthStatus, DiscoveryError> {
        let agent = self
            .registry
            .get(agent_id)
            .ok_or_else(|| RegistryError::NotFound(agent_id.clone()))?;

        match self.transport.fetch_card(agent.address()).await {
            Ok(_) => self.record_success(agent_id),
            Err(err) => {
                debug!(agent_id = %agent_id, error = %err, "probe failed");
                self.record_failure(agent_id);
            }
        }

        Ok(self
            .registry
            .get(agent_id)
            .map_or(HealthStatus::Unknown, |descriptor| descriptor.health_status()))
    }

    fn record_success(&self, agent_id: &AgentId) {
        self.failure_streaks.remove(agent_id);
        self.report(agent_id, HealthStatus::Up);
    }

    fn record_failure(&self, agent_id: &AgentId) {
        let streak = {
            let mut entry = self.failure_streaks.entry(agent_id.clone()).or_insert(0);
            *entry = entry.saturating_add(1);
            *entry
        };
        if self.health.is_down(streak) {
            self.report(agent_id, HealthStatus::Down);
        } else {
            debug!(agent_id = %agent_id, streak, "failure below down threshold");
        }
    }

    fn report(&self, agent_id: &AgentId, status: HealthStatus) {
        if let Err(err) = self.registry.mark_health(agent_id, status) {
            debug!(agent_id = %agent_id, error = %err, "health observation dropped");
        }
    }
}
