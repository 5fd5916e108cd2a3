//! Capability declaration value object.

use super::CapabilityName;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether serving a capability changes state outside the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityEffect {
    /// Reads data only; repeating the call is harmless.
    #[default]
    ReadOnly,
    /// Sends, creates, updates or deletes something.
    Mutating,
}

/// A named, schema-typed operation an agent can perform.
///
/// Capabilities are immutable once declared. Two declarations of the same
/// name are compatible only when their schemas and effect agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    name: CapabilityName,
    #[serde(default)]
    description: String,
    #[serde(default)]
    effect: CapabilityEffect,
    #[serde(default)]
    input_schema: Value,
    #[serde(default)]
    output_schema: Value,
}

impl Capability {
    /// Creates a read-only capability without schema hints.
    #[must_use]
    pub const fn new(name: CapabilityName) -> Self {
        Self {
            name,
            description: String::new(),
            effect: CapabilityEffect::ReadOnly,
            input_schema: Value::Null,
            output_schema: Value::Null,
        }
    }

    /// Sets a human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into().trim().to_owned();
        self
    }

    /// Sets the side-effect classification.
    #[must_use]
    pub const fn with_effect(mut self, effect: CapabilityEffect) -> Self {
        self.effect = effect;
        self
    }

    /// Sets the input schema hint.
    #[must_use]
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Sets the output schema hint.
    #[must_use]
    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = schema;
        self
    }

    /// Returns the capability name.
    #[must_use]
    pub const fn name(&self) -> &CapabilityName {
        &self.name
    }

    /// Returns the description, empty when none was declared.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the side-effect classification.
    #[must_use]
    pub const fn effect(&self) -> CapabilityEffect {
        self.effect
    }

    /// Returns the input schema hint (`null` when undeclared).
    #[must_use]
    pub const fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    /// Returns the output schema hint (`null` when undeclared).
    #[must_use]
    pub const fn output_schema(&self) -> &Value {
        &self.output_schema
    }

    /// Returns `true` when `other` declares the same contract.
    ///
    /// Descriptions are free text and do not take part in the comparison.
    #[must_use]
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        self.name == other.name
            && self.effect == other.effect
            && self.input_schema == other.input_schema
            && self.output_schema == other.output_schema
    }
}
