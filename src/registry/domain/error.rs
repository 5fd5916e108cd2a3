//! Error types for registry domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing registry domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryDomainError {
    /// The agent identifier is empty after trimming.
    #[error("agent id must not be empty")]
    EmptyAgentId,

    /// The agent identifier contains characters outside `[a-z0-9_]`.
    #[error(
        "agent id '{0}' contains invalid characters (only lowercase alphanumeric and underscores allowed)"
    )]
    InvalidAgentId(String),

    /// The capability name is empty after trimming.
    #[error("capability name must not be empty")]
    EmptyCapabilityName,

    /// The capability name contains characters outside `[a-z0-9_]`.
    #[error(
        "capability name '{0}' contains invalid characters (only lowercase alphanumeric and underscores allowed)"
    )]
    InvalidCapabilityName(String),

    /// An identifier exceeds the 100-character limit.
    #[error("identifier exceeds 100 character limit: {0}")]
    IdentifierTooLong(String),

    /// The agent address is empty.
    #[error("agent address must not be empty")]
    EmptyAddress,

    /// The agent address does not have an `http://` or `https://` prefix.
    #[error("agent address '{0}' must start with 'http://' or 'https://'")]
    InvalidAddress(String),

    /// The same capability is declared twice by one agent.
    #[error("capability '{0}' declared more than once")]
    DuplicateCapability(String),
}

/// Error returned while parsing a health status string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown agent health status: {0}")]
pub struct ParseHealthStatusError(pub String);
