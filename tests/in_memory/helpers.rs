//! Shared helpers for in-memory orchestration tests.
//!
//! A deployment is the bundled host configuration wired to the scripted
//! transport, with every configured agent serving its card.

use concierge::clock::ManualClock;
use concierge::config::HostConfig;
use concierge::dispatch::adapters::{ScriptedAgentTransport, ScriptedBehaviour};
use concierge::dispatch::ports::AgentCard;
use concierge::host::Host;
use concierge::orchestrator::domain::{InboundTurn, TurnReply};
use concierge::registry::domain::{AgentAddress, AgentId, CapabilityName};
use concierge::routing::domain::Intent;
use concierge::session::domain::SessionId;
use std::sync::Arc;

/// Host type used by the integration tests.
pub type TestHost = Host<ScriptedAgentTransport, ManualClock>;

const BUNDLED: &str = include_str!("../../config/host.toml");

/// A running host together with its scripted agents.
pub struct Deployment {
    /// Assembled host.
    pub host: Arc<TestHost>,
    /// Scripted transport standing in for the agents.
    pub transport: Arc<ScriptedAgentTransport>,
}

impl Deployment {
    /// Returns the configured address of `agent`.
    pub fn address(&self, agent: &str) -> AgentAddress {
        self.host
            .registry()
            .get(&agent_id(agent))
            .map(|descriptor| descriptor.address().clone())
            .expect("agent is configured")
    }

    /// Scripts how `agent` answers `capability`.
    pub fn script(&self, agent: &str, capability: &str, behaviour: ScriptedBehaviour) {
        self.transport
            .set_behaviour(&self.address(agent), &capability_name(capability), behaviour)
            .expect("behaviour scripted");
    }

    /// Makes `agent` refuse every connection.
    pub fn take_offline(&self, agent: &str) {
        self.transport
            .take_offline(&self.address(agent))
            .expect("agent taken offline");
    }

    /// Sends one turn in `session_id`.
    pub async fn say(&self, session_id: SessionId, intent: Intent) -> TurnReply {
        self.host
            .orchestrator()
            .handle_turn(InboundTurn::new(intent).in_session(session_id))
            .await
    }
}

/// Loads the bundled configuration with timings shortened for tests.
pub fn test_config(step_timeout_ms: u64) -> HostConfig {
    let mut config = HostConfig::from_toml_str(BUNDLED).expect("bundled config is valid");
    config.dispatch.step_timeout_ms = step_timeout_ms;
    config.dispatch.turn_timeout_ms = step_timeout_ms.saturating_mul(3);
    config.dispatch.max_attempts = 2;
    config.dispatch.initial_backoff_ms = 1;
    config.dispatch.max_backoff_ms = 2;
    config
}

/// Assembles a host, serves every agent's card and probes them UP.
///
/// Agents named in `offline` are unreachable from the start and stay out
/// of routing.
pub async fn deploy(step_timeout_ms: u64, offline: &[&str]) -> Deployment {
    let config = test_config(step_timeout_ms);
    let transport = Arc::new(ScriptedAgentTransport::new());
    for agent in &config.agents {
        let mut card = AgentCard::new(agent.agent_id.clone(), agent.address.clone());
        card.capabilities.clone_from(&agent.capabilities);
        transport.serve(card).expect("card served");
        if offline.contains(&agent.agent_id.as_str()) {
            transport
                .take_offline(&agent.address)
                .expect("agent taken offline");
        }
    }
    let host = Host::from_config(
        &config,
        Arc::clone(&transport),
        Arc::new(ManualClock::default()),
    )
    .expect("host assembles");
    let report = host.housekeeper().run_once().await;
    assert_eq!(report.probed.len(), config.agents.len());
    Deployment {
        host: Arc::new(host),
        transport,
    }
}

/// Parses an agent id.
pub fn agent_id(value: &str) -> AgentId {
    AgentId::new(value).expect("valid agent id")
}

/// Parses a capability name.
pub fn capability_name(value: &str) -> CapabilityName {
    CapabilityName::new(value).expect("valid capability name")
}
