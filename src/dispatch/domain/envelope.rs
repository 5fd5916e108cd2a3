//! Request and response envelopes exchanged with agents.

use super::DispatchError;
use crate::registry::domain::{AgentId, CapabilityName};
use crate::session::domain::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Identifier of one dispatch attempt. Retries always get a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new random request identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One request to one agent, immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    request_id: RequestId,
    session_id: SessionId,
    capability_name: CapabilityName,
    payload: Value,
    deadline: DateTime<Utc>,
    attempt: u32,
}

impl RequestEnvelope {
    /// Creates the first-attempt envelope for a capability call.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        capability_name: CapabilityName,
        payload: Value,
        deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            request_id: RequestId::new(),
            session_id,
            capability_name,
            payload,
            deadline,
            attempt: 1,
        }
    }

    /// Builds the envelope for the next retry attempt.
    ///
    /// Everything is carried over except the request id, which is fresh.
    #[must_use]
    pub fn next_attempt(&self) -> Self {
        Self {
            request_id: RequestId::new(),
            attempt: self.attempt.saturating_add(1),
            ..self.clone()
        }
    }

    /// Returns the attempt's request id.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the owning session.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns the requested capability.
    #[must_use]
    pub const fn capability_name(&self) -> &CapabilityName {
        &self.capability_name
    }

    /// Returns the request payload.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the deadline by which a response must arrive.
    #[must_use]
    pub const fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// Returns the 1-based attempt number.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Terminal status of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    /// The agent produced a payload.
    Ok,
    /// The agent rejected the request or could not be reached.
    Failed,
    /// No response arrived before the deadline.
    Timeout,
}

/// Payload or error carried by a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseBody {
    /// Successful result.
    Payload(Value),
    /// Failure detail.
    Error(DispatchError),
}

/// Outcome of a dispatch, consumed once by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    request_id: RequestId,
    agent_id: AgentId,
    attempts: u32,
    status: ResponseStatus,
    body: ResponseBody,
}

impl ResponseEnvelope {
    /// Creates a successful response.
    #[must_use]
    pub const fn ok(request_id: RequestId, agent_id: AgentId, attempts: u32, payload: Value) -> Self {
        Self {
            request_id,
            agent_id,
            attempts,
            status: ResponseStatus::Ok,
            body: ResponseBody::Payload(payload),
        }
    }

    /// Creates a failed or timed-out response from a dispatch error.
    ///
    /// [`DispatchError::Timeout`] maps to [`ResponseStatus::Timeout`]; every
    /// other error maps to [`ResponseStatus::Failed`].
    #[must_use]
    pub fn from_error(
        request_id: RequestId,
        agent_id: AgentId,
        attempts: u32,
        error: DispatchError,
    ) -> Self {
        let status = match error {
            DispatchError::Timeout => ResponseStatus::Timeout,
            DispatchError::Transport(_) | DispatchError::Rejected(_) => ResponseStatus::Failed,
        };
        Self {
            request_id,
            agent_id,
            attempts,
            status,
            body: ResponseBody::Error(error),
        }
    }

    /// Returns the request id of the final attempt.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the agent that served (or failed to serve) the request.
    #[must_use]
    pub const fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// Returns how many attempts were made.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns the terminal status.
    #[must_use]
    pub const fn status(&self) -> ResponseStatus {
        self.status
    }

    /// Returns the payload for OK responses.
    #[must_use]
    pub const fn payload(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Payload(payload) => Some(payload),
            ResponseBody::Error(_) => None,
        }
    }

    /// Returns the error for FAILED and TIMEOUT responses.
    #[must_use]
    pub const fn error(&self) -> Option<&DispatchError> {
        match &self.body {
            ResponseBody::Payload(_) => None,
            ResponseBody::Error(error) => Some(error),
        }
    }

    /// Consumes the envelope, yielding the payload or the error.
    ///
    /// # Errors
    ///
    /// Returns the carried [`DispatchError`] for non-OK responses.
    pub fn into_result(self) -> Result<Value, DispatchError> {
        match self.body {
            ResponseBody::Payload(payload) => Ok(payload),
            ResponseBody::Error(error) => Err(error),
        }
    }
}
