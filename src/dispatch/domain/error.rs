//! Typed dispatch failures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a dispatch did not produce a payload.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum DispatchError {
    /// No response arrived before the envelope deadline.
    #[error("no response before the deadline")]
    Timeout,

    /// The agent could not be reached or answered with garbage, after
    /// retries were exhausted.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The agent refused the request. Never retried.
    #[error("rejected by agent: {0}")]
    Rejected(String),
}
