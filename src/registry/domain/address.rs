//! Agent network address value object.

use super::RegistryDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Base URL at which an agent accepts protocol requests.
///
/// Trailing slashes are stripped so endpoint paths can be appended
/// uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentAddress(String);

impl AgentAddress {
    /// Creates a validated agent address.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError::EmptyAddress`] when the value is empty
    /// or [`RegistryDomainError::InvalidAddress`] when it does not start
    /// with `http://` or `https://`.
    pub fn new(value: impl Into<String>) -> Result<Self, RegistryDomainError> {
        let trimmed = value.into().trim().trim_end_matches('/').to_owned();
        if trimmed.is_empty() {
            return Err(RegistryDomainError::EmptyAddress);
        }

        let has_valid_prefix = trimmed.starts_with("http://") || trimmed.starts_with("https://");
        if !has_valid_prefix {
            return Err(RegistryDomainError::InvalidAddress(trimmed));
        }

        Ok(Self(trimmed))
    }

    /// Returns the address without a trailing slash.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Joins an endpoint path onto the address.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }
}

impl TryFrom<String> for AgentAddress {
    type Error = RegistryDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AgentAddress> for String {
    fn from(value: AgentAddress) -> Self {
        value.0
    }
}

impl fmt::Display for AgentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
