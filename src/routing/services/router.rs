//! Intent matching and plan construction against the registry.

use crate::registry::{
    domain::{AgentDescriptor, AgentId, CapabilityName},
    services::CapabilityRegistry,
};
use crate::routing::domain::{Intent, Plan, PlanStep, RoutingError, RoutingRules};
use crate::session::domain::Session;
use mockable::Clock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Builds plans from intents using configured rules and live registry state.
pub struct Router<C: Clock + Send + Sync> {
    registry: Arc<CapabilityRegistry<C>>,
    rules: RoutingRules,
}

impl<C: Clock + Send + Sync> Router<C> {
    /// Creates a router over `registry`.
    #[must_use]
    pub const fn new(registry: Arc<CapabilityRegistry<C>>, rules: RoutingRules) -> Self {
        Self { registry, rules }
    }

    /// Returns the configured rules.
    #[must_use]
    pub const fn rules(&self) -> &RoutingRules {
        &self.rules
    }

    /// Produces a plan for `intent` within `session`.
    ///
    /// Root steps are pinned to the most recently healthy UP agent. Steps
    /// that wait on earlier output only need a declaring agent now; they
    /// are resolved again when dispatched.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::UnrecognizedIntent`] when nothing matches,
    /// [`RoutingError::AmbiguousIntent`] when candidates compete, and
    /// [`RoutingError::NoCapableAgent`] when a step cannot be served.
    pub fn plan(&self, intent: &Intent, session: &Session) -> Result<Plan, RoutingError> {
        let draft = self.match_intent(intent)?;
        let plan = draft.assign_agents(|step| self.select_agent(step))?;
        debug!(
            session_id = %session.id(),
            rule = plan.rule().unwrap_or("direct"),
            steps = plan.len(),
            "intent routed"
        );
        Ok(plan)
    }

    /// Picks the agent to dispatch a capability to right now.
    ///
    /// The preferred agent is kept while it is still UP; otherwise the
    /// registry's most recently healthy agent is used.
    #[must_use]
    pub fn resolve_agent(
        &self,
        capability: &CapabilityName,
        preferred: Option<&AgentId>,
    ) -> Option<AgentDescriptor> {
        let candidates = self.registry.find(capability);
        let position = preferred
            .and_then(|agent_id| {
                candidates
                    .iter()
                    .position(|candidate| candidate.agent_id() == agent_id)
            })
            .unwrap_or(0);
        candidates.into_iter().nth(position)
    }

    fn match_intent(&self, intent: &Intent) -> Result<Plan, RoutingError> {
        if let Some(capability) = intent.capability() {
            return Ok(Plan::single(PlanStep::new(capability.clone())));
        }

        let tokens = intent.tokens();
        if let Some(rule) = self.rules.select_decomposition(&tokens)? {
            debug!(rule = %rule.name, "decomposition rule matched");
            return Ok(rule.instantiate()?);
        }

        let known: BTreeSet<CapabilityName> = self
            .registry
            .capability_names()
            .into_iter()
            .chain(self.rules.known_capabilities())
            .collect();
        let named: Vec<&CapabilityName> = known
            .iter()
            .filter(|capability| tokens.iter().any(|token| token == capability.as_str()))
            .collect();
        if let Some(capability) = single_candidate(&named)? {
            return Ok(Plan::single(PlanStep::new(capability.clone())));
        }

        let synonyms = self.rules.synonyms().resolve(&tokens);
        let via_synonym: Vec<&CapabilityName> = synonyms.iter().collect();
        if let Some(capability) = single_candidate(&via_synonym)? {
            debug!(capability = %capability, "intent matched by synonym");
            return Ok(Plan::single(PlanStep::new(capability.clone())));
        }

        Err(RoutingError::UnrecognizedIntent {
            text: intent.text().to_owned(),
        })
    }

    fn select_agent(&self, step: &PlanStep) -> Result<Option<AgentId>, RoutingError> {
        let capability = step.capability();
        if step.is_root() {
            return self
                .registry
                .find(capability)
                .into_iter()
                .next()
                .map(|agent| Some(agent.agent_id().clone()))
                .ok_or_else(|| RoutingError::NoCapableAgent {
                    capability: capability.clone(),
                });
        }
        if self.registry.is_declared(capability) {
            Ok(None)
        } else {
            Err(RoutingError::NoCapableAgent {
                capability: capability.clone(),
            })
        }
    }
}

fn single_candidate<'a>(
    candidates: &[&'a CapabilityName],
) -> Result<Option<&'a CapabilityName>, RoutingError> {
    match candidates {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        _ => Err(RoutingError::AmbiguousIntent {
            candidates: candidates
                .iter()
                .map(|capability| capability.as_str().to_owned())
                .collect(),
        }),
    }
}
