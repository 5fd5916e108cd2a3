//! Configured routing rules: synonyms and multi-step decompositions.

use super::intent::{contains_phrase, tokenize};
use super::{FieldBinding, InputBinder, Plan, PlanError, PlanStep, RoutingError, StepId};
use crate::registry::domain::CapabilityName;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Phrase to capability mapping used when no capability is named exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SynonymTable(BTreeMap<String, CapabilityName>);

impl SynonymTable {
    /// Creates a table from phrase/capability pairs.
    ///
    /// Phrases are stored lowercase and trimmed.
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = (String, CapabilityName)>) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(phrase, capability)| (phrase.trim().to_lowercase(), capability))
                .collect(),
        )
    }

    /// Returns the capabilities reached by the longest matching phrase.
    ///
    /// More than one entry means equally long phrases point at different
    /// capabilities.
    #[must_use]
    pub fn resolve(&self, tokens: &[String]) -> Vec<CapabilityName> {
        let mut best_len = 0;
        let mut best: BTreeSet<&CapabilityName> = BTreeSet::new();
        for (phrase, capability) in &self.0 {
            let phrase_tokens = tokenize(phrase);
            if !contains_phrase(tokens, &phrase_tokens) {
                continue;
            }
            if phrase_tokens.len() > best_len {
                best_len = phrase_tokens.len();
                best.clear();
            }
            if phrase_tokens.len() == best_len {
                best.insert(capability);
            }
        }
        best.into_iter().cloned().collect()
    }

    /// Returns every capability the table can produce.
    pub fn capabilities(&self) -> impl Iterator<Item = &CapabilityName> {
        self.0.values()
    }

    /// Returns the number of phrases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when the table has no phrases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One step of a decomposition rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepTemplate {
    /// Capability the step invokes.
    pub capability: CapabilityName,
    /// Earlier steps whose output this step needs.
    #[serde(default)]
    pub depends_on: Vec<StepId>,
    /// Whether intent parameters are forwarded into the payload.
    #[serde(default)]
    pub include_intent_parameters: bool,
    /// Explicit payload field bindings.
    #[serde(default)]
    pub bindings: Vec<FieldBinding>,
}

/// A rule that expands an intent into several dependent steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecompositionRule {
    /// Rule name, reported when rules compete.
    pub name: String,
    /// Higher priority wins when several rules match.
    #[serde(default)]
    pub priority: u32,
    /// Keywords or phrases that must all occur in the intent.
    pub all_of: Vec<String>,
    /// Ordered step templates.
    pub steps: Vec<StepTemplate>,
}

impl DecompositionRule {
    /// Returns `true` when every keyword occurs in `tokens`.
    #[must_use]
    pub fn matches(&self, tokens: &[String]) -> bool {
        !self.all_of.is_empty()
            && self
                .all_of
                .iter()
                .all(|keyword| contains_phrase(tokens, &tokenize(keyword)))
    }

    /// Returns the distinct capabilities the rule invokes.
    #[must_use]
    pub fn capability_set(&self) -> BTreeSet<&CapabilityName> {
        self.steps.iter().map(|step| &step.capability).collect()
    }

    /// Builds a fresh plan from the templates.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] when the templates form an invalid graph.
    pub fn instantiate(&self) -> Result<Plan, PlanError> {
        let steps = self
            .steps
            .iter()
            .map(|template| {
                PlanStep::new(template.capability.clone())
                    .with_dependencies(template.depends_on.iter().copied())
                    .with_binder(InputBinder::new(
                        template.include_intent_parameters,
                        template.bindings.clone(),
                    ))
            })
            .collect();
        Plan::new(Some(self.name.clone()), steps)
    }
}

/// Synonyms and decompositions, immutable after startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingRules {
    synonyms: SynonymTable,
    decompositions: Vec<DecompositionRule>,
}

impl RoutingRules {
    /// Creates a rule set.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] when a decomposition rule's steps do not form
    /// a valid plan.
    pub fn new(
        synonyms: SynonymTable,
        decompositions: Vec<DecompositionRule>,
    ) -> Result<Self, PlanError> {
        for rule in &decompositions {
            rule.instantiate()?;
        }
        Ok(Self {
            synonyms,
            decompositions,
        })
    }

    /// Returns the synonym table.
    #[must_use]
    pub const fn synonyms(&self) -> &SynonymTable {
        &self.synonyms
    }

    /// Returns the decomposition rules in declaration order.
    #[must_use]
    pub fn decompositions(&self) -> &[DecompositionRule] {
        &self.decompositions
    }

    /// Returns every capability named by a synonym or decomposition.
    #[must_use]
    pub fn known_capabilities(&self) -> BTreeSet<CapabilityName> {
        self.synonyms
            .capabilities()
            .chain(
                self.decompositions
                    .iter()
                    .flat_map(|rule| rule.steps.iter().map(|step| &step.capability)),
            )
            .cloned()
            .collect()
    }

    /// Selects the decomposition rule for `tokens`.
    ///
    /// Among matching rules the highest priority wins. Remaining ties go
    /// to a rule whose capability set contains every other candidate's.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::AmbiguousIntent`] when no rule dominates.
    pub fn select_decomposition(
        &self,
        tokens: &[String],
    ) -> Result<Option<&DecompositionRule>, RoutingError> {
        let matching: Vec<&DecompositionRule> = self
            .decompositions
            .iter()
            .filter(|rule| rule.matches(tokens))
            .collect();
        let Some(top_priority) = matching.iter().map(|rule| rule.priority).max() else {
            return Ok(None);
        };
        let top: Vec<&DecompositionRule> = matching
            .into_iter()
            .filter(|rule| rule.priority == top_priority)
            .collect();

        let sets: Vec<BTreeSet<&CapabilityName>> =
            top.iter().map(|rule| rule.capability_set()).collect();
        let dominant = top.iter().zip(&sets).find(|(_, candidate)| {
            sets.iter().all(|other| other.is_subset(candidate))
        });

        dominant
            .map(|(rule, _)| Some(*rule))
            .ok_or_else(|| RoutingError::AmbiguousIntent {
                candidates: top.iter().map(|rule| rule.name.clone()).collect(),
            })
    }
}
