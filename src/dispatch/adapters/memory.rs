//! In-memory scripted transport for tests and local simulation.

use crate::dispatch::{
    domain::{RequestEnvelope, RequestId},
    ports::{AgentCard, AgentTransport, TransportError, TransportResult},
};
use crate::registry::domain::{AgentAddress, CapabilityName};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// What a scripted agent does when it receives a request.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedBehaviour {
    /// Answers with a fixed payload.
    Respond(Value),
    /// Answers with the capability name and the request payload.
    Echo,
    /// Refuses the request with a reason.
    Reject(String),
    /// Fails as if the connection were refused.
    Unreachable,
    /// Never answers.
    Hang,
    /// Waits, then behaves as the inner behaviour.
    Delay(Duration, Box<ScriptedBehaviour>),
}

/// A request observed by the scripted transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Address the request was sent to.
    pub address: AgentAddress,
    /// Request id of the attempt.
    pub request_id: RequestId,
    /// Requested capability.
    pub capability: CapabilityName,
    /// 1-based attempt number.
    pub attempt: u32,
}

/// Agent transport that plays back scripted behaviours.
///
/// This adapter models agent behaviour without any network traffic. Served
/// agents echo requests unless a behaviour is scripted for the capability.
/// Addresses that were never served behave as unreachable.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAgentTransport {
    state: Arc<RwLock<ScriptedState>>,
}

#[derive(Debug, Default)]
struct ScriptedState {
    cards: HashMap<AgentAddress, AgentCard>,
    offline: HashSet<AgentAddress>,
    behaviours: HashMap<(AgentAddress, CapabilityName), ScriptedBehaviour>,
    transient_failures: HashMap<AgentAddress, u32>,
    calls: Vec<RecordedCall>,
    seen_request_ids: HashSet<RequestId>,
    reject_duplicate_request_ids: bool,
}

fn poisoned(err: impl std::fmt::Display) -> TransportError {
    TransportError::Unreachable(format!("scripted transport unavailable: {err}"))
}

impl ScriptedAgentTransport {
    /// Creates a transport with no agents.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> TransportResult<std::sync::RwLockWriteGuard<'_, ScriptedState>> {
        self.state.write().map_err(poisoned)
    }

    /// Serves an agent card at the card's address and brings it online.
    ///
    /// # Errors
    ///
    /// Returns a transport error when lock acquisition fails.
    pub fn serve(&self, card: AgentCard) -> TransportResult<()> {
        let mut state = self.write()?;
        state.offline.remove(&card.address);
        state.cards.insert(card.address.clone(), card);
        Ok(())
    }

    /// Scripts the behaviour for one capability at one address.
    ///
    /// # Errors
    ///
    /// Returns a transport error when lock acquisition fails.
    pub fn set_behaviour(
        &self,
        address: &AgentAddress,
        capability: &CapabilityName,
        behaviour: ScriptedBehaviour,
    ) -> TransportResult<()> {
        self.write()?
            .behaviours
            .insert((address.clone(), capability.clone()), behaviour);
        Ok(())
    }

    /// Makes the next `count` requests to `address` fail as unreachable.
    ///
    /// # Errors
    ///
    /// Returns a transport error when lock acquisition fails.
    pub fn fail_next(&self, address: &AgentAddress, count: u32) -> TransportResult<()> {
        self.write()?
            .transient_failures
            .insert(address.clone(), count);
        Ok(())
    }

    /// Takes an address offline; requests and card fetches fail.
    ///
    /// # Errors
    ///
    /// Returns a transport error when lock acquisition fails.
    pub fn take_offline(&self, address: &AgentAddress) -> TransportResult<()> {
        self.write()?.offline.insert(address.clone());
        Ok(())
    }

    /// Brings an address back online.
    ///
    /// # Errors
    ///
    /// Returns a transport error when lock acquisition fails.
    pub fn bring_online(&self, address: &AgentAddress) -> TransportResult<()> {
        self.write()?.offline.remove(address);
        Ok(())
    }

    /// Rejects any request whose id was already seen, like an agent that
    /// deduplicates by request id.
    ///
    /// # Errors
    ///
    /// Returns a transport error when lock acquisition fails.
    pub fn reject_duplicate_request_ids(&self) -> TransportResult<()> {
        self.write()?.reject_duplicate_request_ids = true;
        Ok(())
    }

    /// Returns every request received so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state
            .read()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    /// Returns the number of requests received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.read().map(|state| state.calls.len()).unwrap_or(0)
    }

    fn admit(
        &self,
        address: &AgentAddress,
        envelope: &RequestEnvelope,
    ) -> TransportResult<ScriptedBehaviour> {
        let mut state = self.write()?;
        state.calls.push(RecordedCall {
            address: address.clone(),
            request_id: envelope.request_id(),
            capability: envelope.capability_name().clone(),
            attempt: envelope.attempt(),
        });

        let first_sighting = state.seen_request_ids.insert(envelope.request_id());
        if state.reject_duplicate_request_ids && !first_sighting {
            return Err(TransportError::Rejected(format!(
                "duplicate request id {}",
                envelope.request_id()
            )));
        }

        if state.offline.contains(address) {
            return Err(TransportError::Unreachable(format!("{address} is offline")));
        }

        if let Some(remaining) = state.transient_failures.get_mut(address)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(TransportError::Unreachable(format!(
                "{address} refused the connection"
            )));
        }

        let key = (address.clone(), envelope.capability_name().clone());
        if let Some(behaviour) = state.behaviours.get(&key) {
            return Ok(behaviour.clone());
        }

        if state.cards.contains_key(address) {
            Ok(ScriptedBehaviour::Echo)
        } else {
            Ok(ScriptedBehaviour::Unreachable)
        }
    }
}

#[async_trait]
impl AgentTransport for ScriptedAgentTransport {
    async fn send(
        &self,
        address: &AgentAddress,
        envelope: &RequestEnvelope,
    ) -> TransportResult<Value> {
        let mut behaviour = self.admit(address, envelope)?;
        loop {
            match behaviour {
                ScriptedBehaviour::Delay(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    behaviour = *inner;
                }
                ScriptedBehaviour::Respond(payload) => return Ok(payload),
                ScriptedBehaviour::Echo => {
                    return Ok(json!({
                        "capability": envelope.capability_name().as_str(),
                        "request": envelope.payload(),
                    }));
                }
                ScriptedBehaviour::Reject(reason) => return Err(TransportError::Rejected(reason)),
                ScriptedBehaviour::Unreachable => {
                    return Err(TransportError::Unreachable(format!(
                        "no agent listening at {address}"
                    )));
                }
                ScriptedBehaviour::Hang => std::future::pending::<()>().await,
            }
        }
    }

    async fn fetch_card(&self, address: &AgentAddress) -> TransportResult<AgentCard> {
        let state = self.state.read().map_err(poisoned)?;
        if state.offline.contains(address) {
            return Err(TransportError::Unreachable(format!("{address} is offline")));
        }
        state
            .cards
            .get(address)
            .cloned()
            .ok_or_else(|| TransportError::Unreachable(format!("no agent listening at {address}")))
    }
}
