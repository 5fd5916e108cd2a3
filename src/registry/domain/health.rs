//! Agent health status domain types.

use super::ParseHealthStatusError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Liveness of an agent as last observed by the agent client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Health has not been observed yet.
    #[default]
    Unknown,
    /// The agent answered its most recent contact.
    Up,
    /// The agent failed enough consecutive contacts to be considered down.
    Down,
}

impl HealthStatus {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for HealthStatus {
    type Error = ParseHealthStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "unknown" => Ok(Self::Unknown),
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            _ => Err(ParseHealthStatusError(value.to_owned())),
        }
    }
}

/// Timestamped health record kept on every agent descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    status: HealthStatus,
    observed_at: DateTime<Utc>,
    last_success_at: Option<DateTime<Utc>>,
    down_since: Option<DateTime<Utc>>,
}

impl HealthSnapshot {
    /// Creates a snapshot with the given initial status.
    #[must_use]
    pub const fn new(status: HealthStatus, observed_at: DateTime<Utc>) -> Self {
        let last_success_at = match status {
            HealthStatus::Up => Some(observed_at),
            HealthStatus::Unknown | HealthStatus::Down => None,
        };
        let down_since = match status {
            HealthStatus::Down => Some(observed_at),
            HealthStatus::Unknown | HealthStatus::Up => None,
        };
        Self {
            status,
            observed_at,
            last_success_at,
            down_since,
        }
    }

    /// Applies a new observation.
    ///
    /// `down_since` keeps the start of an outage across repeated DOWN
    /// observations so eviction can measure sustained unreachability.
    pub fn observe(&mut self, status: HealthStatus, observed_at: DateTime<Utc>) {
        match status {
            HealthStatus::Up => {
                self.last_success_at = Some(observed_at);
                self.down_since = None;
            }
            HealthStatus::Down => {
                if self.down_since.is_none() {
                    self.down_since = Some(observed_at);
                }
            }
            HealthStatus::Unknown => self.down_since = None,
        }
        self.status = status;
        self.observed_at = observed_at;
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> HealthStatus {
        self.status
    }

    /// Returns when the status was last observed.
    #[must_use]
    pub const fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    /// Returns the time of the most recent successful contact.
    #[must_use]
    pub const fn last_success_at(&self) -> Option<DateTime<Utc>> {
        self.last_success_at
    }

    /// Returns when the current outage began, if the agent is down.
    #[must_use]
    pub const fn down_since(&self) -> Option<DateTime<Utc>> {
        self.down_since
    }
}
