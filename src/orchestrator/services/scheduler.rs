//! Dependency-graph execution of one plan.

use crate::dispatch::{
    domain::{RequestEnvelope, ResponseEnvelope, ResponseStatus},
    ports::AgentTransport,
    services::AgentClient,
};
use crate::orchestrator::domain::{FailureReason, StepFailureReport, StepResult};
use crate::registry::domain::{AgentId, CapabilityEffect};
use crate::routing::{
    domain::{BindingContext, Intent, Plan, PlanStep, StepId},
    services::Router,
};
use crate::session::domain::{Session, SessionId, TurnId};
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Time budgets applied to every turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnBudget {
    step_timeout: Duration,
    turn_timeout: Duration,
}

impl TurnBudget {
    /// Creates a budget. The turn timeout is raised to at least the step
    /// timeout.
    #[must_use]
    pub fn new(step_timeout: Duration, turn_timeout: Duration) -> Self {
        Self {
            step_timeout,
            turn_timeout: turn_timeout.max(step_timeout),
        }
    }

    /// Returns the deadline budget of a single dispatch.
    #[must_use]
    pub const fn step_timeout(&self) -> Duration {
        self.step_timeout
    }

    /// Returns the deadline budget of a whole turn.
    #[must_use]
    pub const fn turn_timeout(&self) -> Duration {
        self.turn_timeout
    }
}

impl Default for TurnBudget {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(30))
    }
}

/// Why execution stopped before every step finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Interruption {
    Cancelled,
    DeadlineReached,
}

/// Everything execution produced, in plan order where it matters.
#[derive(Debug, Default)]
pub(super) struct ExecutionReport {
    pub(super) results: Vec<StepResult>,
    pub(super) failures: Vec<StepFailureReport>,
    pub(super) mutating_succeeded: bool,
    pub(super) interruption: Option<Interruption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum StepStatus {
    Waiting,
    Running {
        agent_id: AgentId,
        effect: CapabilityEffect,
    },
    Succeeded,
    Failed,
}

/// Identity of the turn being executed.
#[derive(Debug, Clone, Copy)]
pub(super) struct TurnContext<'a> {
    pub(super) turn_id: TurnId,
    pub(super) session_id: SessionId,
    pub(super) intent: &'a Intent,
}

type Completion = (StepId, ResponseEnvelope);

/// Runs ready steps concurrently and dependants once their inputs exist.
///
/// Step calls run on detached tasks: a failure never cancels unrelated
/// work, and calls still in flight when the turn is cancelled run to
/// completion with their results dropped.
pub(super) struct Scheduler<'a, T, C>
where
    T: AgentTransport + 'static,
    C: Clock + Send + Sync + 'static,
{
    pub(super) client: &'a Arc<AgentClient<T, C>>,
    pub(super) router: &'a Router<C>,
    pub(super) clock: &'a C,
    pub(super) budget: TurnBudget,
}

struct Execution<'p> {
    plan: &'p Plan,
    statuses: Vec<StepStatus>,
    report: ExecutionReport,
    running: usize,
    deadline: Instant,
}

impl<T, C> Scheduler<'_, T, C>
where
    T: AgentTransport + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Executes `plan`, recording step results into `session`.
    pub(super) async fn run(
        &self,
        turn: TurnContext<'_>,
        session: &mut Session,
        plan: &Plan,
        cancel: &CancellationToken,
    ) -> ExecutionReport {
        let (completions, mut inbox) = mpsc::unbounded_channel::<Completion>();
        let mut execution = Execution {
            plan,
            statuses: vec![StepStatus::Waiting; plan.len()],
            report: ExecutionReport::default(),
            running: 0,
            deadline: Instant::now() + self.budget.turn_timeout(),
        };
        let turn_deadline = tokio::time::sleep_until(execution.deadline);
        tokio::pin!(turn_deadline);

        loop {
            self.launch_ready(turn, session, &mut execution, &completions);
            if execution.running == 0 {
                break;
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    execution.report.interruption = Some(Interruption::Cancelled);
                    break;
                }
                Some((step, response)) = inbox.recv() => {
                    execution.running = execution.running.saturating_sub(1);
                    absorb(turn, session, &mut execution, step, response);
                }
                () = &mut turn_deadline => {
                    execution.report.interruption = Some(Interruption::DeadlineReached);
                    break;
                }
            }
        }

        if let Some(interruption) = execution.report.interruption {
            close_unfinished(&mut execution, interruption);
        }
        execution.report
    }

    fn launch_ready(
        &self,
        turn: TurnContext<'_>,
        session: &Session,
        execution: &mut Execution<'_>,
        completions: &mpsc::UnboundedSender<Completion>,
    ) {
        let plan = execution.plan;
        for step in plan.steps() {
            if !matches!(status_of(execution, step.id()), Some(StepStatus::Waiting)) {
                continue;
            }
            let blocked_by = step.depends_on().iter().copied().find(|dependency| {
                matches!(status_of(execution, *dependency), Some(StepStatus::Failed))
            });
            if let Some(dependency) = blocked_by {
                fail(
                    execution,
                    StepFailureReport::step(
                        step.id(),
                        step.capability().clone(),
                        FailureReason::Skipped,
                        format!("dependency step {dependency} did not complete"),
                    ),
                );
                continue;
            }
            let ready = step.depends_on().iter().all(|dependency| {
                matches!(status_of(execution, *dependency), Some(StepStatus::Succeeded))
            });
            if ready {
                self.dispatch(turn, session, execution, step, completions);
            }
        }
    }

    fn dispatch(
        &self,
        turn: TurnContext<'_>,
        session: &Session,
        execution: &mut Execution<'_>,
        step: &PlanStep,
        completions: &mpsc::UnboundedSender<Completion>,
    ) {
        let capability = step.capability().clone();
        let remaining = execution.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            fail(
                execution,
                StepFailureReport::step(
                    step.id(),
                    capability,
                    FailureReason::Timeout,
                    "turn deadline passed before dispatch",
                ),
            );
            return;
        }

        let context = BindingContext {
            intent_parameters: turn.intent.parameters(),
            results: session.intermediate_results(),
            previous_reply: session.last_reply(),
        };
        let payload = match step.binder().bind(&context) {
            Ok(payload) => payload,
            Err(err) => {
                fail(
                    execution,
                    StepFailureReport::step(step.id(), capability, FailureReason::Binding, err.to_string()),
                );
                return;
            }
        };

        let Some(agent) = self.router.resolve_agent(&capability, step.agent()) else {
            warn!(
                session_id = %turn.session_id,
                capability = %capability,
                "no UP agent at dispatch time"
            );
            let detail = format!("no UP agent serves {capability} at dispatch time");
            fail(
                execution,
                StepFailureReport::step(step.id(), capability, FailureReason::NoCapableAgent, detail),
            );
            return;
        };

        let effect = agent
            .capability(&capability)
            .map_or(CapabilityEffect::ReadOnly, |declared| declared.effect());
        let deadline = deadline_after(self.clock.utc(), remaining.min(self.budget.step_timeout()));
        let envelope = RequestEnvelope::new(turn.session_id, capability, payload, deadline);
        debug!(
            session_id = %turn.session_id,
            step = %step.id(),
            agent_id = %agent.agent_id(),
            request_id = %envelope.request_id(),
            "step dispatched"
        );

        set_status(
            execution,
            step.id(),
            StepStatus::Running {
                agent_id: agent.agent_id().clone(),
                effect,
            },
        );
        execution.running = execution.running.saturating_add(1);

        let client = Arc::clone(self.client);
        let sender = completions.clone();
        let step_id = step.id();
        tokio::spawn(async move {
            let response = client.call(&agent, envelope).await;
            if sender.send((step_id, response)).is_err() {
                debug!(step = %step_id, "turn finished first; step result discarded");
            }
        });
    }
}

fn deadline_after(now: DateTime<Utc>, budget: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(budget)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn status_of<'e>(execution: &'e Execution<'_>, step: StepId) -> Option<&'e StepStatus> {
    execution.statuses.get(step.index())
}

fn set_status(execution: &mut Execution<'_>, step: StepId, status: StepStatus) {
    if let Some(slot) = execution.statuses.get_mut(step.index()) {
        *slot = status;
    }
}

fn fail(execution: &mut Execution<'_>, report: StepFailureReport) {
    if let Some(step) = report.step {
        set_status(execution, step, StepStatus::Failed);
    }
    execution.report.failures.push(report);
}

fn absorb(
    turn: TurnContext<'_>,
    session: &mut Session,
    execution: &mut Execution<'_>,
    step: StepId,
    response: ResponseEnvelope,
) {
    let Some(StepStatus::Running { agent_id, effect }) = status_of(execution, step).cloned() else {
        error!(step = %step, "completion for a step that is not running");
        return;
    };
    let Some(capability) = execution.plan.step(step).map(|s| s.capability().clone()) else {
        error!(step = %step, "completion for a step outside the plan");
        return;
    };

    match response.status() {
        ResponseStatus::Ok => {
            let payload = response.into_result().unwrap_or_default();
            if let Err(err) = session.record_result(turn.turn_id, step, payload.clone()) {
                error!(session_id = %turn.session_id, error = %err, "step result not recorded");
                fail(
                    execution,
                    StepFailureReport::step(step, capability, FailureReason::Internal, err.to_string())
                        .on_agent(agent_id),
                );
                return;
            }
            if effect == CapabilityEffect::Mutating {
                execution.report.mutating_succeeded = true;
            }
            set_status(execution, step, StepStatus::Succeeded);
            execution.report.results.push(StepResult {
                step,
                capability,
                agent_id,
                result: payload,
            });
        }
        ResponseStatus::Failed | ResponseStatus::Timeout => {
            let (reason, detail) = response.error().map_or_else(
                || (FailureReason::Internal, "response carried no error".to_owned()),
                |err| (FailureReason::from(err), err.to_string()),
            );
            fail(
                execution,
                StepFailureReport::step(step, capability, reason, detail).on_agent(agent_id),
            );
        }
    }
}

fn close_unfinished(execution: &mut Execution<'_>, interruption: Interruption) {
    let plan = execution.plan;
    for step in plan.steps() {
        let report = match (status_of(execution, step.id()).cloned(), interruption) {
            (Some(StepStatus::Running { agent_id, .. }), Interruption::DeadlineReached) => {
                StepFailureReport::step(
                    step.id(),
                    step.capability().clone(),
                    FailureReason::Timeout,
                    "turn deadline reached while the step was in flight",
                )
                .on_agent(agent_id)
            }
            (Some(StepStatus::Running { agent_id, .. }), Interruption::Cancelled) => {
                StepFailureReport::step(
                    step.id(),
                    step.capability().clone(),
                    FailureReason::Skipped,
                    "turn cancelled; in-flight result discarded",
                )
                .on_agent(agent_id)
            }
            (Some(StepStatus::Waiting), _) => StepFailureReport::step(
                step.id(),
                step.capability().clone(),
                FailureReason::Skipped,
                "turn ended before the step was dispatched",
            ),
            _ => continue,
        };
        fail(execution, report);
    }
}
