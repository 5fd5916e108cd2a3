//! Assembly of every component from a [`HostConfig`].

use crate::config::{ConfigError, HostConfig};
use crate::dispatch::{ports::AgentTransport, services::AgentClient};
use crate::orchestrator::services::{Housekeeper, Orchestrator};
use crate::registry::{
    domain::RegistryDomainError,
    services::{CapabilityRegistry, RegistryError},
};
use crate::routing::services::Router;
use crate::session::services::SessionManager;
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Errors raised while assembling a host.
#[derive(Debug, Error)]
pub enum HostError {
    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A configured agent could not be described.
    #[error(transparent)]
    Descriptor(#[from] RegistryDomainError),

    /// A configured agent could not be registered.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A fully wired orchestration host.
pub struct Host<T, C>
where
    T: AgentTransport + 'static,
    C: Clock + Send + Sync + 'static,
{
    registry: Arc<CapabilityRegistry<C>>,
    client: Arc<AgentClient<T, C>>,
    router: Arc<Router<C>>,
    sessions: Arc<SessionManager<C>>,
    orchestrator: Arc<Orchestrator<T, C>>,
    housekeeper: Arc<Housekeeper<T, C>>,
}

impl<T, C> Host<T, C>
where
    T: AgentTransport + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Builds every component and registers the configured agents.
    ///
    /// Configured agents start with UNKNOWN health; a housekeeping pass
    /// probes them before they become routable.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Config`] when the routing rules are invalid and
    /// [`HostError::Registry`] when two agents declare incompatible
    /// capabilities.
    pub fn from_config(
        config: &HostConfig,
        transport: Arc<T>,
        clock: Arc<C>,
    ) -> Result<Self, HostError> {
        let rules = config.routing_rules()?;
        let registry = Arc::new(CapabilityRegistry::new(Arc::clone(&clock)));
        for agent in &config.agents {
            registry.register(agent.descriptor(clock.utc())?)?;
        }

        let client = Arc::new(AgentClient::new(
            transport,
            Arc::clone(&registry),
            Arc::clone(&clock),
            config.dispatch.retry_policy(),
            config.dispatch.health_policy(),
        ));
        let router = Arc::new(Router::new(Arc::clone(&registry), rules));
        let sessions = Arc::new(SessionManager::new(Arc::clone(&clock)));
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&client),
            Arc::clone(&router),
            Arc::clone(&sessions),
            clock,
            config.dispatch.turn_budget(),
        ));
        let housekeeper = Arc::new(Housekeeper::new(
            Arc::clone(&client),
            Arc::clone(&registry),
            Arc::clone(&sessions),
            config.sessions.housekeeping_policy(),
        ));

        info!(
            agents = config.agents.len(),
            decompositions = config.decompositions.len(),
            "host assembled"
        );
        Ok(Self {
            registry,
            client,
            router,
            sessions,
            orchestrator,
            housekeeper,
        })
    }

    /// Returns the capability registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<CapabilityRegistry<C>> {
        &self.registry
    }

    /// Returns the agent client.
    #[must_use]
    pub const fn client(&self) -> &Arc<AgentClient<T, C>> {
        &self.client
    }

    /// Returns the router.
    #[must_use]
    pub const fn router(&self) -> &Arc<Router<C>> {
        &self.router
    }

    /// Returns the session manager.
    #[must_use]
    pub const fn sessions(&self) -> &Arc<SessionManager<C>> {
        &self.sessions
    }

    /// Returns the orchestrator.
    #[must_use]
    pub const fn orchestrator(&self) -> &Arc<Orchestrator<T, C>> {
        &self.orchestrator
    }

    /// Returns the housekeeper.
    #[must_use]
    pub const fn housekeeper(&self) -> &Arc<Housekeeper<T, C>> {
        &self.housekeeper
    }

    /// Starts periodic housekeeping until `cancel` fires.
    #[must_use]
    pub fn spawn_housekeeping(&self, cancel: CancellationToken) -> JoinHandle<()> {
        Arc::clone(&self.housekeeper).spawn(cancel)
    }
}
