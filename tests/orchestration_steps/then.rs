//! Then steps for orchestration BDD scenarios.

use super::world::{OrchestrationWorld, run_async};
use concierge::orchestrator::domain::ReplyStatus;
use eyre::eyre;
use rstest_bdd_macros::then;
use serde_json::Value;

fn expect_status(world: &OrchestrationWorld, expected: ReplyStatus) -> Result<(), eyre::Report> {
    let reply = world.reply()?;
    if reply.status != expected {
        return Err(eyre!(
            "expected status {expected:?}, got {:?} ({})",
            reply.status,
            reply.summary
        ));
    }
    Ok(())
}

#[then("the turn completes")]
fn turn_completes(world: &OrchestrationWorld) -> Result<(), eyre::Report> {
    expect_status(world, ReplyStatus::Completed)
}

#[then("the turn partially completes")]
fn turn_partially_completes(world: &OrchestrationWorld) -> Result<(), eyre::Report> {
    expect_status(world, ReplyStatus::PartiallyCompleted)
}

#[then(r#"the turn fails with reason "{reason}""#)]
fn turn_fails_with(world: &OrchestrationWorld, reason: String) -> Result<(), eyre::Report> {
    expect_status(world, ReplyStatus::Failed)?;
    let reply = world.reply()?;
    if !reply
        .failures
        .iter()
        .any(|failure| failure.reason.as_str() == reason)
    {
        return Err(eyre!("no failure with reason '{reason}': {:?}", reply.failures));
    }
    Ok(())
}

#[then(r#"the email body contains the event "{summary}""#)]
fn email_contains_event(world: &OrchestrationWorld, summary: String) -> Result<(), eyre::Report> {
    let sent = world
        .reply()?
        .result_for("send_email")
        .ok_or_else(|| eyre!("no email was sent"))?;
    let listed = sent
        .pointer("/request/body")
        .and_then(Value::as_array)
        .ok_or_else(|| eyre!("email body is not an event list: {sent}"))?;
    if !listed
        .iter()
        .any(|event| event.get("summary").and_then(Value::as_str) == Some(summary.as_str()))
    {
        return Err(eyre!("event '{summary}' missing from email body"));
    }
    Ok(())
}

#[then(r#"the failure names capability "{capability}" on agent "{agent}""#)]
fn failure_names_step(
    world: &OrchestrationWorld,
    capability: String,
    agent: String,
) -> Result<(), eyre::Report> {
    let reply = world.reply()?;
    let named = reply.failures.iter().any(|failure| {
        failure
            .capability
            .as_ref()
            .is_some_and(|name| name.as_str() == capability)
            && failure
                .agent_id
                .as_ref()
                .is_some_and(|id| id.as_str() == agent)
    });
    if !named {
        return Err(eyre!(
            "no failure names {capability} on {agent}: {:?}",
            reply.failures
        ));
    }
    Ok(())
}

#[then("the turn is safe to retry")]
fn turn_is_retry_safe(world: &OrchestrationWorld) -> Result<(), eyre::Report> {
    if !world.reply()?.retry_safe {
        return Err(eyre!("expected the turn to be safe to retry"));
    }
    Ok(())
}

#[then("the session history grows by {count:usize}")]
fn history_grows_by(world: &OrchestrationWorld, count: usize) -> Result<(), eyre::Report> {
    let host = world.host()?;
    let session = run_async(host.sessions().snapshot(world.session_id))
        .ok_or_else(|| eyre!("session {} does not exist", world.session_id))?;
    let grown = session.turn_history().len().saturating_sub(world.history_before);
    if grown != count {
        return Err(eyre!("history grew by {grown}, expected {count}"));
    }
    Ok(())
}

#[then("no agent was called")]
fn no_agent_called(world: &OrchestrationWorld) -> Result<(), eyre::Report> {
    let calls = world.transport.call_count();
    if calls != 0 {
        return Err(eyre!("expected no agent calls, saw {calls}"));
    }
    Ok(())
}
