//! Plans: dependency-aware sequences of capability invocations.

use super::{InputBinder, PlanError};
use crate::registry::domain::{AgentId, CapabilityName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Position of a step within its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(usize);

impl StepId {
    /// Creates a step identifier for a zero-based position.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the zero-based position.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One capability invocation within a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    id: StepId,
    capability: CapabilityName,
    depends_on: BTreeSet<StepId>,
    parallel_with: BTreeSet<StepId>,
    binder: InputBinder,
    agent: Option<AgentId>,
}

impl PlanStep {
    /// Creates an independent step that forwards intent parameters.
    ///
    /// The step's identifier is assigned when the plan is assembled.
    #[must_use]
    pub fn new(capability: CapabilityName) -> Self {
        Self {
            id: StepId::new(0),
            capability,
            depends_on: BTreeSet::new(),
            parallel_with: BTreeSet::new(),
            binder: InputBinder::forward_intent(),
            agent: None,
        }
    }

    /// Declares the steps whose output this step needs.
    #[must_use]
    pub fn with_dependencies(mut self, depends_on: impl IntoIterator<Item = StepId>) -> Self {
        self.depends_on.extend(depends_on);
        self
    }

    /// Replaces the step's input binder.
    #[must_use]
    pub fn with_binder(mut self, binder: InputBinder) -> Self {
        self.binder = binder;
        self
    }

    /// Pins the agent selected at plan time.
    #[must_use]
    pub fn with_agent(mut self, agent: AgentId) -> Self {
        self.agent = Some(agent);
        self
    }

    /// Returns the step identifier.
    #[must_use]
    pub const fn id(&self) -> StepId {
        self.id
    }

    /// Returns the capability to invoke.
    #[must_use]
    pub const fn capability(&self) -> &CapabilityName {
        &self.capability
    }

    /// Returns the steps this step waits for.
    #[must_use]
    pub const fn depends_on(&self) -> &BTreeSet<StepId> {
        &self.depends_on
    }

    /// Returns the steps that may run concurrently with this one.
    #[must_use]
    pub const fn parallel_with(&self) -> &BTreeSet<StepId> {
        &self.parallel_with
    }

    /// Returns the step's input binder.
    #[must_use]
    pub const fn binder(&self) -> &InputBinder {
        &self.binder
    }

    /// Returns the agent selected at plan time, if one was.
    ///
    /// Dependent steps are resolved at dispatch time and carry no agent.
    #[must_use]
    pub const fn agent(&self) -> Option<&AgentId> {
        self.agent.as_ref()
    }

    /// Returns `true` when the step has no dependencies.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.depends_on.is_empty()
    }
}

/// An ordered, dependency-aware set of steps for one intent.
///
/// Dependencies always point at earlier steps, so step order is a valid
/// topological order and doubles as the merge order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    rule: Option<String>,
    steps: Vec<PlanStep>,
}

impl Plan {
    /// Assembles a plan, numbering steps by position.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] when the plan is empty, a step depends on
    /// itself or a later step, or a binder reads a step that is not a
    /// dependency.
    pub fn new(rule: Option<String>, steps: Vec<PlanStep>) -> Result<Self, PlanError> {
        if steps.is_empty() {
            return Err(PlanError::Empty);
        }

        let mut numbered = Vec::with_capacity(steps.len());
        for (index, mut step) in steps.into_iter().enumerate() {
            step.id = StepId::new(index);
            if let Some(dependency) = step.depends_on.iter().find(|dep| dep.index() >= index) {
                return Err(PlanError::ForwardDependency {
                    step: step.id,
                    dependency: *dependency,
                });
            }
            if let Some(referenced) = step
                .binder
                .referenced_steps()
                .find(|referenced| !step.depends_on.contains(referenced))
            {
                return Err(PlanError::UnboundDependency {
                    step: step.id,
                    referenced,
                });
            }
            numbered.push(step);
        }

        let ancestors = ancestor_sets(&numbered);
        let ids: Vec<StepId> = numbered.iter().map(PlanStep::id).collect();
        for (step, own_ancestors) in numbered.iter_mut().zip(&ancestors) {
            let own_id = step.id;
            step.parallel_with = ids
                .iter()
                .zip(&ancestors)
                .filter(|(other, other_ancestors)| {
                    **other != own_id
                        && !own_ancestors.contains(*other)
                        && !other_ancestors.contains(&own_id)
                })
                .map(|(other, _)| *other)
                .collect();
        }

        Ok(Self {
            rule,
            steps: numbered,
        })
    }

    /// Creates a one-step plan.
    #[must_use]
    pub fn single(step: PlanStep) -> Self {
        let mut only = step;
        only.id = StepId::new(0);
        only.depends_on.clear();
        Self {
            rule: None,
            steps: vec![only],
        }
    }

    /// Returns the decomposition rule that produced the plan, if any.
    #[must_use]
    pub fn rule(&self) -> Option<&str> {
        self.rule.as_deref()
    }

    /// Returns the steps in merge order.
    #[must_use]
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Returns one step.
    #[must_use]
    pub fn step(&self, id: StepId) -> Option<&PlanStep> {
        self.steps.get(id.index())
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` when the plan has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the steps that directly depend on `id`.
    pub fn dependents_of(&self, id: StepId) -> impl Iterator<Item = &PlanStep> + '_ {
        self.steps
            .iter()
            .filter(move |step| step.depends_on.contains(&id))
    }

    /// Pins an agent on every step for which `select` returns one.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `select`.
    pub fn assign_agents<E>(
        mut self,
        mut select: impl FnMut(&PlanStep) -> Result<Option<AgentId>, E>,
    ) -> Result<Self, E> {
        for step in &mut self.steps {
            step.agent = select(step)?;
        }
        Ok(self)
    }

    /// Returns every capability the plan invokes, in step order.
    #[must_use]
    pub fn capabilities(&self) -> Vec<&CapabilityName> {
        self.steps.iter().map(PlanStep::capability).collect()
    }
}

fn ancestor_sets(steps: &[PlanStep]) -> Vec<BTreeSet<StepId>> {
    let mut ancestors: Vec<BTreeSet<StepId>> = Vec::with_capacity(steps.len());
    for step in steps {
        let mut own = BTreeSet::new();
        for dependency in &step.depends_on {
            own.insert(*dependency);
            if let Some(inherited) = ancestors.get(dependency.index()) {
                own.extend(inherited.iter().copied());
            }
        }
        ancestors.push(own);
    }
    ancestors
}
