//! HTTP adapter for the agent protocol.
//!
//! Requests are posted as JSON to `{address}/invoke`; agent cards are read
//! from `{address}/.well-known/agent.json`. The agent answers `2xx` with a
//! body tagged by `status` (`ok` with a `payload`, or `rejected` with an
//! `error`). A `4xx` answer is an application-level rejection; `5xx` and
//! connection failures are transient.

use crate::dispatch::{
    domain::RequestEnvelope,
    ports::{AgentCard, AgentTransport, TransportError, TransportResult},
};
use crate::registry::domain::AgentAddress;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const INVOKE_PATH: &str = "invoke";
const CARD_PATH: &str = ".well-known/agent.json";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
enum WireResponse {
    Ok {
        #[serde(default)]
        payload: Value,
    },
    Rejected {
        error: String,
    },
}

/// Agent transport speaking JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAgentTransport {
    client: reqwest::Client,
}

impl HttpAgentTransport {
    /// Creates a transport with the given connect timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Protocol`] when the HTTP client cannot be
    /// built (e.g. TLS backend initialisation fails).
    pub fn new(connect_timeout: Duration) -> TransportResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|err| TransportError::Protocol(err.to_string()))?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn map_request_error(err: &reqwest::Error) -> TransportError {
    if err.is_connect() || err.is_timeout() || err.is_request() {
        TransportError::Unreachable(err.to_string())
    } else {
        TransportError::Protocol(err.to_string())
    }
}

/// Maps an HTTP status and body onto the agent protocol outcome.
pub(crate) fn interpret_response(status: StatusCode, body: &str) -> TransportResult<Value> {
    if status.is_server_error() {
        return Err(TransportError::Unreachable(format!("agent answered {status}")));
    }
    if status.is_client_error() {
        let reason = if body.trim().is_empty() {
            status.to_string()
        } else {
            body.trim().to_owned()
        };
        return Err(TransportError::Rejected(reason));
    }
    if !status.is_success() {
        return Err(TransportError::Protocol(format!("unexpected status {status}")));
    }

    match serde_json::from_str::<WireResponse>(body) {
        Ok(WireResponse::Ok { payload }) => Ok(payload),
        Ok(WireResponse::Rejected { error }) => Err(TransportError::Rejected(error)),
        Err(err) => Err(TransportError::Protocol(format!(
            "undecodable agent response: {err}"
        ))),
    }
}

#[async_trait]
impl AgentTransport for HttpAgentTransport {
    async fn send(
        &self,
        address: &AgentAddress,
        envelope: &RequestEnvelope,
    ) -> TransportResult<Value> {
        let response = self
            .client
            .post(address.endpoint(INVOKE_PATH))
            .json(envelope)
            .send()
            .await
            .map_err(|err| map_request_error(&err))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| map_request_error(&err))?;
        interpret_response(status, &body)
    }

    async fn fetch_card(&self, address: &AgentAddress) -> TransportResult<AgentCard> {
        let response = self
            .client
            .get(address.endpoint(CARD_PATH))
            .send()
            .await
            .map_err(|err| map_request_error(&err))?;
        let status = response.status();
        if status.is_server_error() {
            return Err(TransportError::Unreachable(format!("agent answered {status}")));
        }
        if !status.is_success() {
            return Err(TransportError::Protocol(format!(
                "agent card unavailable: {status}"
            )));
        }
        response
            .json::<AgentCard>()
            .await
            .map_err(|err| TransportError::Protocol(format!("undecodable agent card: {err}")))
    }
}
