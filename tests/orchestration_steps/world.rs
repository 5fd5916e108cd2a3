//! Shared world state for orchestration BDD scenarios.

use std::sync::Arc;

use concierge::clock::ManualClock;
use concierge::config::HostConfig;
use concierge::dispatch::adapters::ScriptedAgentTransport;
use concierge::dispatch::ports::AgentCard;
use concierge::host::Host;
use concierge::orchestrator::domain::TurnReply;
use concierge::registry::domain::{AgentAddress, AgentId};
use concierge::session::domain::SessionId;
use rstest::fixture;

/// Host type used by the BDD world.
pub type TestHost = Host<ScriptedAgentTransport, ManualClock>;

/// Address the digest email is sent to.
pub const USER_EMAIL: &str = "me@example.com";

const BUNDLED: &str = include_str!("../../config/host.toml");

/// Scenario world for orchestration behaviour tests.
pub struct OrchestrationWorld {
    /// Scripted agents behind the host.
    pub transport: Arc<ScriptedAgentTransport>,
    /// Host under test, assembled by the first given step.
    pub host: Option<TestHost>,
    /// Session every turn in the scenario belongs to.
    pub session_id: SessionId,
    /// History length before the last turn.
    pub history_before: usize,
    /// Reply to the last turn.
    pub last_reply: Option<TurnReply>,
}

impl OrchestrationWorld {
    /// Creates a world with no host yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            transport: Arc::new(ScriptedAgentTransport::new()),
            host: None,
            session_id: SessionId::new(),
            history_before: 0,
            last_reply: None,
        }
    }

    /// Returns the assembled host.
    pub fn host(&self) -> Result<&TestHost, eyre::Report> {
        self.host
            .as_ref()
            .ok_or_else(|| eyre::eyre!("host not assembled in scenario world"))
    }

    /// Returns the reply to the last turn.
    pub fn reply(&self) -> Result<&TurnReply, eyre::Report> {
        self.last_reply
            .as_ref()
            .ok_or_else(|| eyre::eyre!("no turn was sent in scenario world"))
    }

    /// Returns the configured address of `agent`.
    pub fn address(&self, agent: &str) -> Result<AgentAddress, eyre::Report> {
        let agent_id = AgentId::new(agent)?;
        self.host()?
            .registry()
            .get(&agent_id)
            .map(|descriptor| descriptor.address().clone())
            .ok_or_else(|| eyre::eyre!("agent '{agent}' is not configured"))
    }
}

impl Default for OrchestrationWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> OrchestrationWorld {
    OrchestrationWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

/// Loads the bundled configuration with short timeouts and retries.
pub fn scenario_config() -> Result<HostConfig, eyre::Report> {
    let mut config = HostConfig::from_toml_str(BUNDLED)?;
    config.dispatch.step_timeout_ms = 1_000;
    config.dispatch.turn_timeout_ms = 3_000;
    config.dispatch.max_attempts = 2;
    config.dispatch.initial_backoff_ms = 1;
    config.dispatch.max_backoff_ms = 2;
    Ok(config)
}

/// Serves a card for every configured agent.
pub fn serve_cards(
    transport: &ScriptedAgentTransport,
    config: &HostConfig,
) -> Result<(), eyre::Report> {
    for agent in &config.agents {
        let mut card = AgentCard::new(agent.agent_id.clone(), agent.address.clone());
        card.capabilities.clone_from(&agent.capabilities);
        transport.serve(card)?;
    }
    Ok(())
}
