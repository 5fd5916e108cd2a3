//! Session aggregate and turn history.

use super::{SessionError, SessionId, TurnId};
use crate::orchestrator::domain::ReplyStatus;
use crate::routing::domain::{Plan, StepId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// One completed turn as remembered by the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Turn identifier.
    pub turn_id: TurnId,
    /// The caller's utterance for the turn.
    pub utterance: String,
    /// Terminal status of the turn.
    pub status: ReplyStatus,
    /// Reply payload produced for the turn.
    pub payload: Value,
    /// When the reply was committed.
    pub completed_at: DateTime<Utc>,
}

/// State of one ongoing conversation.
///
/// History is append-only. Intermediate results only grow while a plan
/// runs and are cleared when the next plan begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    turn_history: Vec<TurnRecord>,
    pending_plan: Option<Plan>,
    intermediate_results: BTreeMap<StepId, Value>,
    active_turn: Option<TurnId>,
    created_at: DateTime<Utc>,
    last_active_at: DateTime<Utc>,
}

impl Session {
    /// Creates an empty session.
    #[must_use]
    pub const fn new(id: SessionId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            turn_history: Vec::new(),
            pending_plan: None,
            intermediate_results: BTreeMap::new(),
            active_turn: None,
            created_at,
            last_active_at: created_at,
        }
    }

    /// Returns the session identifier.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Returns completed turns, oldest first.
    #[must_use]
    pub fn turn_history(&self) -> &[TurnRecord] {
        &self.turn_history
    }

    /// Returns the payload of the most recent completed turn.
    #[must_use]
    pub fn last_reply(&self) -> Option<&Value> {
        self.turn_history.last().map(|record| &record.payload)
    }

    /// Returns the plan of the active turn, if any.
    #[must_use]
    pub const fn pending_plan(&self) -> Option<&Plan> {
        self.pending_plan.as_ref()
    }

    /// Returns results recorded for the current or most recent plan.
    #[must_use]
    pub const fn intermediate_results(&self) -> &BTreeMap<StepId, Value> {
        &self.intermediate_results
    }

    /// Returns the recorded result of one step.
    #[must_use]
    pub fn result(&self, step: StepId) -> Option<&Value> {
        self.intermediate_results.get(&step)
    }

    /// Returns the turn currently holding the session.
    #[must_use]
    pub const fn active_turn(&self) -> Option<TurnId> {
        self.active_turn
    }

    /// Returns when the session was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the session was last touched.
    #[must_use]
    pub const fn last_active_at(&self) -> DateTime<Utc> {
        self.last_active_at
    }

    /// Returns `true` when the session has been inactive longer than
    /// `threshold` and no turn is running.
    #[must_use]
    pub fn is_idle(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        if self.active_turn.is_some() {
            return false;
        }
        now.signed_duration_since(self.last_active_at)
            .to_std()
            .is_ok_and(|inactive| inactive > threshold)
    }

    /// Marks the session as active at `at`.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_active_at {
            self.last_active_at = at;
        }
    }

    /// Starts a turn.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ConcurrentMutationDenied`] when another turn
    /// is still active.
    pub fn begin_turn(&mut self, turn_id: TurnId, at: DateTime<Utc>) -> Result<(), SessionError> {
        if let Some(active_turn) = self.active_turn {
            return Err(SessionError::ConcurrentMutationDenied {
                session_id: self.id,
                active_turn,
            });
        }
        self.active_turn = Some(turn_id);
        self.touch(at);
        Ok(())
    }

    /// Installs a new top-level plan and clears the previous plan's results.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TurnNotActive`] when `turn_id` does not hold
    /// the session.
    pub fn begin_plan(&mut self, turn_id: TurnId, plan: Plan) -> Result<(), SessionError> {
        self.ensure_active(turn_id)?;
        self.intermediate_results.clear();
        self.pending_plan = Some(plan);
        Ok(())
    }

    /// Records the result of one plan step.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TurnNotActive`] when `turn_id` does not hold
    /// the session, or [`SessionError::ResultAlreadyRecorded`] when the step
    /// already has a result.
    pub fn record_result(
        &mut self,
        turn_id: TurnId,
        step: StepId,
        result: Value,
    ) -> Result<(), SessionError> {
        self.ensure_active(turn_id)?;
        if self.intermediate_results.contains_key(&step) {
            return Err(SessionError::ResultAlreadyRecorded { step });
        }
        self.intermediate_results.insert(step, result);
        Ok(())
    }

    /// Appends the turn to history and releases the session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TurnNotActive`] when the record's turn does
    /// not hold the session.
    pub fn complete_turn(&mut self, record: TurnRecord) -> Result<(), SessionError> {
        self.ensure_active(record.turn_id)?;
        self.touch(record.completed_at);
        self.turn_history.push(record);
        self.pending_plan = None;
        self.active_turn = None;
        Ok(())
    }

    /// Releases the session without recording the turn, discarding any
    /// results the turn gathered.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TurnNotActive`] when `turn_id` does not hold
    /// the session.
    pub fn abandon_turn(&mut self, turn_id: TurnId, at: DateTime<Utc>) -> Result<(), SessionError> {
        self.ensure_active(turn_id)?;
        self.touch(at);
        self.pending_plan = None;
        self.intermediate_results.clear();
        self.active_turn = None;
        Ok(())
    }

    fn ensure_active(&self, turn_id: TurnId) -> Result<(), SessionError> {
        if self.active_turn == Some(turn_id) {
            Ok(())
        } else {
            Err(SessionError::TurnNotActive {
                session_id: self.id,
                turn_id,
            })
        }
    }
}
