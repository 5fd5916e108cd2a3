//! Host configuration loaded once at startup.
//!
//! The configuration is a TOML document with optional sections; every
//! field has a default so an empty file yields a usable (if agentless)
//! host. Unknown keys are rejected to catch typos early.
//!
//! ```toml
//! [dispatch]
//! step_timeout_ms = 10000
//!
//! [[agents]]
//! agent_id = "gmail"
//! address = "http://localhost:10002"
//! capabilities = [{ name = "send_email", effect = "mutating" }]
//!
//! [synonyms]
//! "mail" = "send_email"
//! ```

use crate::dispatch::domain::{HealthPolicy, RetryPolicy};
use crate::orchestrator::services::{HousekeepingPolicy, TurnBudget};
use crate::registry::domain::{
    AgentAddress, AgentDescriptor, AgentId, Capability, CapabilityName, RegistryDomainError,
};
use crate::routing::domain::{DecompositionRule, PlanError, RoutingRules, SynonymTable};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_STEP_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_TURN_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 100;
const DEFAULT_MAX_BACKOFF_MS: u64 = 2_000;
const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
const DEFAULT_IDLE_THRESHOLD_SECS: u64 = 30 * 60;
const DEFAULT_HOUSEKEEPING_INTERVAL_SECS: u64 = 30;
const DEFAULT_AGENT_EVICTION_SECS: u64 = 10 * 60;

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid TOML for [`HostConfig`].
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Two `[[agents]]` entries share an id.
    #[error("agent '{0}' is declared more than once")]
    DuplicateAgent(AgentId),

    /// An agent lists the same capability twice.
    #[error("agent '{agent_id}' declares invalid capabilities: {source}")]
    InvalidAgent {
        /// Offending agent.
        agent_id: AgentId,
        /// Domain validation failure.
        #[source]
        source: RegistryDomainError,
    },

    /// A decomposition rule does not form a valid plan.
    #[error("invalid decomposition rule: {0}")]
    InvalidRule(#[from] PlanError),
}

/// Timeout, retry, and health settings for agent dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchSettings {
    /// Upper bound for one plan step, in milliseconds.
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,
    /// Upper bound for a whole turn, in milliseconds.
    #[serde(default = "default_turn_timeout_ms")]
    pub turn_timeout_ms: u64,
    /// Attempts per call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay after the first failed attempt, in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Cap on the retry delay, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Consecutive failures that mark an agent DOWN.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            step_timeout_ms: DEFAULT_STEP_TIMEOUT_MS,
            turn_timeout_ms: DEFAULT_TURN_TIMEOUT_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

impl DispatchSettings {
    /// Returns the retry policy these settings describe.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }

    /// Returns the health policy these settings describe.
    #[must_use]
    pub fn health_policy(&self) -> HealthPolicy {
        HealthPolicy::new(self.failure_threshold)
    }

    /// Returns the per-step and per-turn deadlines.
    #[must_use]
    pub fn turn_budget(&self) -> TurnBudget {
        TurnBudget::new(
            Duration::from_millis(self.step_timeout_ms),
            Duration::from_millis(self.turn_timeout_ms),
        )
    }
}

/// Session retention and housekeeping cadence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSettings {
    /// Sessions idle for longer than this are evicted, in seconds.
    #[serde(default = "default_idle_threshold_secs")]
    pub idle_threshold_secs: u64,
    /// Pause between housekeeping passes, in seconds.
    #[serde(default = "default_housekeeping_interval_secs")]
    pub housekeeping_interval_secs: u64,
    /// Agents DOWN for longer than this are evicted, in seconds.
    #[serde(default = "default_agent_eviction_secs")]
    pub agent_eviction_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_threshold_secs: DEFAULT_IDLE_THRESHOLD_SECS,
            housekeeping_interval_secs: DEFAULT_HOUSEKEEPING_INTERVAL_SECS,
            agent_eviction_secs: DEFAULT_AGENT_EVICTION_SECS,
        }
    }
}

impl SessionSettings {
    /// Returns the housekeeping policy these settings describe.
    #[must_use]
    pub const fn housekeeping_policy(&self) -> HousekeepingPolicy {
        HousekeepingPolicy {
            session_idle: Duration::from_secs(self.idle_threshold_secs),
            agent_eviction: Duration::from_secs(self.agent_eviction_secs),
            interval: Duration::from_secs(self.housekeeping_interval_secs),
        }
    }
}

/// A statically configured agent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentSettings {
    /// Stable agent identifier.
    pub agent_id: AgentId,
    /// Base address requests are sent to.
    pub address: AgentAddress,
    /// Declared capabilities.
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

impl AgentSettings {
    /// Builds a descriptor with UNKNOWN health registered at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError::DuplicateCapability`] when a
    /// capability is listed twice.
    pub fn descriptor(&self, at: DateTime<Utc>) -> Result<AgentDescriptor, RegistryDomainError> {
        AgentDescriptor::new(
            self.agent_id.clone(),
            self.address.clone(),
            self.capabilities.iter().cloned(),
            at,
        )
    }
}

/// Complete host configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Dispatch timeouts, retries and health threshold.
    #[serde(default)]
    pub dispatch: DispatchSettings,
    /// Session retention and housekeeping.
    #[serde(default)]
    pub sessions: SessionSettings,
    /// Agents registered at startup.
    #[serde(default)]
    pub agents: Vec<AgentSettings>,
    /// Phrase to capability mapping.
    #[serde(default)]
    pub synonyms: BTreeMap<String, CapabilityName>,
    /// Multi-step decomposition rules.
    #[serde(default)]
    pub decompositions: Vec<DecompositionRule>,
}

impl HostConfig {
    /// Reads and validates the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, and any
    /// error [`HostConfig::from_toml_str`] returns.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed documents (including
    /// invalid agent ids, capability names and addresses), and the
    /// validation errors of [`HostConfig::validate`].
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-entry constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateAgent`],
    /// [`ConfigError::InvalidAgent`] or [`ConfigError::InvalidRule`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for agent in &self.agents {
            if !seen.insert(&agent.agent_id) {
                return Err(ConfigError::DuplicateAgent(agent.agent_id.clone()));
            }
            agent
                .descriptor(DateTime::<Utc>::UNIX_EPOCH)
                .map_err(|source| ConfigError::InvalidAgent {
                    agent_id: agent.agent_id.clone(),
                    source,
                })?;
        }
        self.routing_rules()?;
        Ok(())
    }

    /// Builds the router's synonym and decomposition rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRule`] when a decomposition's steps
    /// reference later or undeclared steps.
    pub fn routing_rules(&self) -> Result<RoutingRules, ConfigError> {
        let synonyms = SynonymTable::new(
            self.synonyms
                .iter()
                .map(|(phrase, capability)| (phrase.clone(), capability.clone())),
        );
        Ok(RoutingRules::new(synonyms, self.decompositions.clone())?)
    }
}

const fn default_step_timeout_ms() -> u64 {
    DEFAULT_STEP_TIMEOUT_MS
}

const fn default_turn_timeout_ms() -> u64 {
    DEFAULT_TURN_TIMEOUT_MS
}

const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

const fn default_initial_backoff_ms() -> u64 {
    DEFAULT_INITIAL_BACKOFF_MS
}

const fn default_max_backoff_ms() -> u64 {
    DEFAULT_MAX_BACKOFF_MS
}

const fn default_failure_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}

const fn default_idle_threshold_secs() -> u64 {
    DEFAULT_IDLE_THRESHOLD_SECS
}

const fn default_housekeeping_interval_secs() -> u64 {
    DEFAULT_HOUSEKEEPING_INTERVAL_SECS
}

const fn default_agent_eviction_secs() -> u64 {
    DEFAULT_AGENT_EVICTION_SECS
}
