//! Parsed caller intent.

use crate::registry::domain::CapabilityName;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The caller's goal for one turn, before routing.
///
/// An intent carries free text, optionally an explicit capability and any
/// structured parameters the caller already extracted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    #[serde(default)]
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    capability: Option<CapabilityName>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    parameters: Map<String, Value>,
}

impl Intent {
    /// Creates a free-text intent.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Creates an intent addressed to an explicit capability.
    #[must_use]
    pub fn for_capability(capability: CapabilityName) -> Self {
        Self {
            text: capability.as_str().to_owned(),
            capability: Some(capability),
            parameters: Map::new(),
        }
    }

    /// Adds one structured parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Returns the free text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the explicit capability, if any.
    #[must_use]
    pub const fn capability(&self) -> Option<&CapabilityName> {
        self.capability.as_ref()
    }

    /// Returns the structured parameters.
    #[must_use]
    pub const fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    /// Returns the lowercase word tokens of the text.
    ///
    /// Underscores are word characters so capability names survive as
    /// single tokens.
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        tokenize(&self.text)
    }
}

/// Splits text into lowercase word tokens.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Returns `true` when `needle` occurs as a contiguous run in `haystack`.
pub(crate) fn contains_phrase(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}
