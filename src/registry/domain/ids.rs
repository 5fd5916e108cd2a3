//! Validated identifier types for the registry domain.

use super::RegistryDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for agent ids and capability names.
const MAX_IDENTIFIER_LENGTH: usize = 100;

fn normalize_identifier(
    raw: &str,
    empty: RegistryDomainError,
    invalid: fn(String) -> RegistryDomainError,
) -> Result<String, RegistryDomainError> {
    let normalized = raw.trim().to_ascii_lowercase();

    if normalized.is_empty() {
        return Err(empty);
    }

    if normalized.len() > MAX_IDENTIFIER_LENGTH {
        return Err(RegistryDomainError::IdentifierTooLong(raw.to_owned()));
    }

    let is_valid = normalized
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if !is_valid {
        return Err(invalid(raw.to_owned()));
    }

    Ok(normalized)
}

/// Stable, unique identifier of a registered agent (e.g. `gmail`).
///
/// Agent ids are trimmed and lowercased; only `[a-z0-9_]` is accepted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId(String);

impl AgentId {
    /// Creates a validated agent id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError::EmptyAgentId`] when the value is empty
    /// after trimming, [`RegistryDomainError::InvalidAgentId`] when it
    /// contains characters outside `[a-z0-9_]`, or
    /// [`RegistryDomainError::IdentifierTooLong`] when it exceeds 100
    /// characters.
    pub fn new(value: impl Into<String>) -> Result<Self, RegistryDomainError> {
        let raw = value.into();
        normalize_identifier(
            &raw,
            RegistryDomainError::EmptyAgentId,
            RegistryDomainError::InvalidAgentId,
        )
        .map(Self)
    }

    /// Returns the agent id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AgentId {
    type Error = RegistryDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AgentId> for String {
    fn from(value: AgentId) -> Self {
        value.0
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a capability an agent can serve (e.g. `send_email`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CapabilityName(String);

impl CapabilityName {
    /// Creates a validated capability name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError::EmptyCapabilityName`],
    /// [`RegistryDomainError::InvalidCapabilityName`] or
    /// [`RegistryDomainError::IdentifierTooLong`] for malformed input.
    pub fn new(value: impl Into<String>) -> Result<Self, RegistryDomainError> {
        let raw = value.into();
        normalize_identifier(
            &raw,
            RegistryDomainError::EmptyCapabilityName,
            RegistryDomainError::InvalidCapabilityName,
        )
        .map(Self)
    }

    /// Returns the capability name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CapabilityName {
    type Error = RegistryDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CapabilityName> for String {
    fn from(value: CapabilityName) -> Self {
        value.0
    }
}

impl AsRef<str> for CapabilityName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
