//! The per-turn control loop.

use super::scheduler::{ExecutionReport, Interruption, Scheduler, TurnBudget, TurnContext};
use crate::dispatch::{ports::AgentTransport, services::AgentClient};
use crate::orchestrator::domain::{
    FailureReason, InboundTurn, ReplyStatus, StepFailureReport, TurnReply, TurnState,
};
use crate::routing::{domain::Intent, services::Router};
use crate::session::{
    domain::{Session, SessionError, SessionId, TurnId, TurnRecord},
    services::SessionManager,
};
use mockable::Clock;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Serves user turns against the registry, router, client and sessions.
///
/// One orchestrator serves any number of concurrent turns. Turns on the
/// same session run one at a time in arrival order; turns on different
/// sessions never wait for each other.
pub struct Orchestrator<T, C>
where
    T: AgentTransport + 'static,
    C: Clock + Send + Sync + 'static,
{
    client: Arc<AgentClient<T, C>>,
    router: Arc<Router<C>>,
    sessions: Arc<SessionManager<C>>,
    clock: Arc<C>,
    budget: TurnBudget,
}

struct TurnProgress {
    turn_id: TurnId,
    session_id: SessionId,
    state: TurnState,
}

impl TurnProgress {
    fn advance(&mut self, next: TurnState) {
        match self.state.transition(next) {
            Ok(state) => {
                debug!(
                    turn_id = %self.turn_id,
                    session_id = %self.session_id,
                    from = %self.state,
                    to = %state,
                    "turn state changed"
                );
                self.state = state;
            }
            Err(err) => {
                error!(turn_id = %self.turn_id, error = %err, "turn state machine violated");
            }
        }
    }
}

impl<T, C> Orchestrator<T, C>
where
    T: AgentTransport + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates an orchestrator from its collaborators.
    #[must_use]
    pub const fn new(
        client: Arc<AgentClient<T, C>>,
        router: Arc<Router<C>>,
        sessions: Arc<SessionManager<C>>,
        clock: Arc<C>,
        budget: TurnBudget,
    ) -> Self {
        Self {
            client,
            router,
            sessions,
            clock,
            budget,
        }
    }

    /// Returns the session manager.
    #[must_use]
    pub const fn sessions(&self) -> &Arc<SessionManager<C>> {
        &self.sessions
    }

    /// Returns the time budgets in force.
    #[must_use]
    pub const fn budget(&self) -> TurnBudget {
        self.budget
    }

    /// Handles one turn to completion.
    pub async fn handle_turn(&self, turn: InboundTurn) -> TurnReply {
        self.handle_turn_with_cancellation(turn, CancellationToken::new())
            .await
    }

    /// Handles one turn, stopping early when `cancel` fires.
    ///
    /// On cancellation, in-flight steps run to completion but their results
    /// are discarded and the turn is not added to the session history.
    pub async fn handle_turn_with_cancellation(
        &self,
        turn: InboundTurn,
        cancel: CancellationToken,
    ) -> TurnReply {
        let session_id = turn.session_id.unwrap_or_default();
        let mut progress = TurnProgress {
            turn_id: TurnId::new(),
            session_id,
            state: TurnState::Received,
        };

        let mut session = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return cancelled_reply(&progress, true);
            }
            guard = self.sessions.lock(session_id) => guard,
        };

        if let Err(err) = self.begin_turn(&mut session, progress.turn_id) {
            error!(session_id = %session_id, error = %err, "session refused a new turn");
            return failed_reply(&progress, vec![StepFailureReport::internal(err.to_string())]);
        }

        progress.advance(TurnState::Planned);
        let plan = match self.router.plan(&turn.intent, &session) {
            Ok(plan) => plan,
            Err(err) => {
                info!(session_id = %session_id, error = %err, "turn could not be routed");
                progress.advance(TurnState::Failed);
                let reply = failed_reply(&progress, vec![StepFailureReport::routing(&err)]);
                self.commit(&mut session, &turn.intent, &reply);
                return reply;
            }
        };

        if let Err(err) = session.begin_plan(progress.turn_id, plan.clone()) {
            error!(session_id = %session_id, error = %err, "plan not installed");
            progress.advance(TurnState::Failed);
            let reply = failed_reply(&progress, vec![StepFailureReport::internal(err.to_string())]);
            self.release(&mut session, progress.turn_id);
            return reply;
        }

        progress.advance(TurnState::Executing);
        let scheduler = Scheduler {
            client: &self.client,
            router: &self.router,
            clock: self.clock.as_ref(),
            budget: self.budget,
        };
        let context = TurnContext {
            turn_id: progress.turn_id,
            session_id,
            intent: &turn.intent,
        };
        let report = scheduler.run(context, &mut session, &plan, &cancel).await;

        if report.interruption == Some(Interruption::Cancelled) {
            info!(session_id = %session_id, turn_id = %progress.turn_id, "turn cancelled");
            self.release(&mut session, progress.turn_id);
            return cancelled_reply(&progress, !report.mutating_succeeded);
        }

        let reply = conclude(&mut progress, report);
        self.commit(&mut session, &turn.intent, &reply);
        reply
    }

    fn begin_turn(&self, session: &mut Session, turn_id: TurnId) -> Result<(), SessionError> {
        let now = self.clock.utc();
        match session.begin_turn(turn_id, now) {
            Err(SessionError::ConcurrentMutationDenied { active_turn, .. }) => {
                error!(
                    session_id = %session.id(),
                    stale_turn = %active_turn,
                    "recovering session from an abandoned turn"
                );
                session.abandon_turn(active_turn, now)?;
                session.begin_turn(turn_id, now)
            }
            other => other,
        }
    }

    fn commit(&self, session: &mut Session, intent: &Intent, reply: &TurnReply) {
        let record = TurnRecord {
            turn_id: reply.turn_id,
            utterance: intent.text().to_owned(),
            status: reply.status,
            payload: reply.payload.clone(),
            completed_at: self.clock.utc(),
        };
        if let Err(err) = session.complete_turn(record) {
            error!(session_id = %session.id(), error = %err, "turn not committed");
        }
    }

    fn release(&self, session: &mut Session, turn_id: TurnId) {
        if let Err(err) = session.abandon_turn(turn_id, self.clock.utc()) {
            error!(session_id = %session.id(), error = %err, "turn not released");
        }
    }
}

fn conclude(progress: &mut TurnProgress, report: ExecutionReport) -> TurnReply {
    let ExecutionReport {
        mut results,
        mut failures,
        mutating_succeeded,
        ..
    } = report;
    results.sort_by_key(|result| result.step);
    failures.sort_by_key(|failure| failure.step);
    let payload = TurnReply::merge_payload(&results);
    let succeeded: Vec<String> = results
        .iter()
        .map(|result| result.capability.as_str().to_owned())
        .collect();

    let status = if failures.is_empty() {
        progress.advance(TurnState::Merging);
        progress.advance(TurnState::Replied);
        ReplyStatus::Completed
    } else {
        progress.advance(TurnState::Failed);
        let timed_out = failures
            .iter()
            .any(|failure| failure.reason == FailureReason::Timeout);
        match (results.is_empty(), timed_out) {
            (false, _) => ReplyStatus::PartiallyCompleted,
            (true, true) => ReplyStatus::TimedOut,
            (true, false) => ReplyStatus::Failed,
        }
    };

    let summary = summarise(status, &succeeded, &failures);
    info!(
        session_id = %progress.session_id,
        turn_id = %progress.turn_id,
        status = status.as_str(),
        steps_ok = results.len(),
        steps_failed = failures.len(),
        "turn finished"
    );
    TurnReply {
        turn_id: progress.turn_id,
        session_id: progress.session_id,
        status,
        state: progress.state,
        payload,
        summary,
        failures,
        retry_safe: !mutating_succeeded,
    }
}

fn failed_reply(progress: &TurnProgress, failures: Vec<StepFailureReport>) -> TurnReply {
    let summary = failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    TurnReply {
        turn_id: progress.turn_id,
        session_id: progress.session_id,
        status: ReplyStatus::Failed,
        state: progress.state,
        payload: TurnReply::merge_payload(&[]),
        summary,
        failures,
        retry_safe: true,
    }
}

fn cancelled_reply(progress: &TurnProgress, retry_safe: bool) -> TurnReply {
    TurnReply {
        turn_id: progress.turn_id,
        session_id: progress.session_id,
        status: ReplyStatus::Cancelled,
        state: progress.state,
        payload: Value::Null,
        summary: "turn cancelled; in-flight results discarded".to_owned(),
        failures: Vec::new(),
        retry_safe,
    }
}

fn summarise(status: ReplyStatus, succeeded: &[String], failures: &[StepFailureReport]) -> String {
    let failed = failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    match status {
        ReplyStatus::Completed => format!("completed {}", succeeded.join(", ")),
        ReplyStatus::PartiallyCompleted => format!(
            "partially completed: {} succeeded; failed: {failed}",
            succeeded.join(", ")
        ),
        ReplyStatus::TimedOut => format!("timed out: {failed}"),
        ReplyStatus::Failed | ReplyStatus::Cancelled => format!("failed: {failed}"),
    }
}
