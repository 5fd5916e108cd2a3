//! Periodic maintenance off the hot path.

use crate::dispatch::{ports::AgentTransport, services::AgentClient};
use crate::registry::{
    domain::{AgentId, HealthStatus},
    services::CapabilityRegistry,
};
use crate::session::{domain::SessionId, services::SessionManager};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Thresholds and cadence for housekeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HousekeepingPolicy {
    /// Sessions idle for longer than this are evicted.
    pub session_idle: Duration,
    /// Agents DOWN for longer than this are evicted from the registry.
    pub agent_eviction: Duration,
    /// Pause between housekeeping passes.
    pub interval: Duration,
}

impl Default for HousekeepingPolicy {
    fn default() -> Self {
        Self {
            session_idle: Duration::from_secs(30 * 60),
            agent_eviction: Duration::from_secs(10 * 60),
            interval: Duration::from_secs(30),
        }
    }
}

/// What one housekeeping pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HousekeepingReport {
    /// Agents probed, with their health afterwards.
    pub probed: Vec<(AgentId, HealthStatus)>,
    /// Agents removed after sustained unreachability.
    pub evicted_agents: Vec<AgentId>,
    /// Sessions removed for inactivity.
    pub evicted_sessions: Vec<SessionId>,
}

/// Probes unhealthy agents and evicts stale agents and sessions.
pub struct Housekeeper<T, C>
where
    T: AgentTransport + 'static,
    C: Clock + Send + Sync + 'static,
{
    client: Arc<AgentClient<T, C>>,
    registry: Arc<CapabilityRegistry<C>>,
    sessions: Arc<SessionManager<C>>,
    policy: HousekeepingPolicy,
}

impl<T, C> Housekeeper<T, C>
where
    T: AgentTransport + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a housekeeper.
    #[must_use]
    pub const fn new(
        client: Arc<AgentClient<T, C>>,
        registry: Arc<CapabilityRegistry<C>>,
        sessions: Arc<SessionManager<C>>,
        policy: HousekeepingPolicy,
    ) -> Self {
        Self {
            client,
            registry,
            sessions,
            policy,
        }
    }

    /// Runs one pass: probe, then evict agents, then evict sessions.
    pub async fn run_once(&self) -> HousekeepingReport {
        let mut report = HousekeepingReport::default();

        let unhealthy: Vec<AgentId> = self
            .registry
            .list()
            .into_iter()
            .filter(|agent| agent.health_status() != HealthStatus::Up)
            .map(|agent| agent.agent_id().clone())
            .collect();
        for agent_id in unhealthy {
            match self.client.probe(&agent_id).await {
                Ok(status) => report.probed.push((agent_id, status)),
                Err(err) => debug!(agent_id = %agent_id, error = %err, "probe skipped"),
            }
        }

        report.evicted_agents = self.registry.evict_unreachable(self.policy.agent_eviction);
        for agent_id in &report.evicted_agents {
            warn!(agent_id = %agent_id, "agent evicted after sustained unreachability");
        }

        report.evicted_sessions = self.sessions.evict_idle(self.policy.session_idle);
        if !report.evicted_sessions.is_empty() {
            info!(count = report.evicted_sessions.len(), "idle sessions evicted");
        }
        report
    }

    /// Runs passes every `interval` until `cancel` fires.
    #[must_use]
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.policy.interval.max(Duration::from_millis(1));
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                }
            }
            debug!("housekeeping stopped");
        })
    }
}
