//! End-to-end turn tests against the bundled configuration.

use crate::in_memory::helpers::{agent_id, capability_name, deploy};
use concierge::dispatch::adapters::ScriptedBehaviour;
use concierge::orchestrator::domain::{FailureReason, ReplyStatus, TurnState};
use concierge::routing::domain::Intent;
use concierge::session::domain::SessionId;
use rstest::rstest;
use serde_json::json;
use std::time::Duration;

const DIGEST: &str = "email me a summary of tomorrow's meetings";

fn digest_intent() -> Intent {
    Intent::from_text(DIGEST).with_parameter("user_email", json!("me@example.com"))
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn digest_email_carries_calendar_events() {
    let deployment = deploy(1_000, &[]).await;
    let events = json!([{ "summary": "Standup", "start": "09:00" }]);
    deployment.script(
        "calendar",
        "list_events",
        ScriptedBehaviour::Respond(json!({ "events": events.clone() })),
    );
    let session_id = SessionId::new();

    let reply = deployment.say(session_id, digest_intent()).await;

    assert_eq!(reply.status, ReplyStatus::Completed);
    assert_eq!(reply.state, TurnState::Replied);
    assert!(reply.failures.is_empty());
    let sent = reply.result_for("send_email").expect("email was sent");
    assert_eq!(sent["request"]["body"], events);
    assert_eq!(sent["request"]["to"], json!("me@example.com"));
    assert_eq!(sent["request"]["subject"], json!("Your meetings"));
    assert!(!reply.retry_safe, "an email went out");

    let session = deployment
        .host
        .sessions()
        .snapshot(session_id)
        .await
        .expect("session exists");
    assert_eq!(session.turn_history().len(), 1);
    assert_eq!(session.last_reply(), Some(&reply.payload));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unreachable_mail_agent_yields_partial_success() {
    let deployment = deploy(1_000, &[]).await;
    deployment.script(
        "calendar",
        "list_events",
        ScriptedBehaviour::Respond(json!({ "events": [] })),
    );
    deployment.take_offline("gmail");

    let reply = deployment.say(SessionId::new(), digest_intent()).await;

    assert_eq!(reply.status, ReplyStatus::PartiallyCompleted);
    assert_eq!(reply.state, TurnState::Failed);
    assert_eq!(reply.result_for("list_events"), Some(&json!({ "events": [] })));
    assert!(reply.result_for("send_email").is_none());
    let [failure] = reply.failures.as_slice() else {
        panic!("expected one failure, got {:?}", reply.failures);
    };
    assert_eq!(failure.capability, Some(capability_name("send_email")));
    assert_eq!(failure.agent_id, Some(agent_id("gmail")));
    assert_eq!(failure.reason, FailureReason::Transport);
    assert!(reply.retry_safe, "only a read-only step succeeded");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_agent_fails_without_dispatching() {
    let deployment = deploy(1_000, &["gmail"]).await;

    let reply = deployment
        .say(SessionId::new(), Intent::from_text("check my inbox"))
        .await;

    assert_eq!(reply.status, ReplyStatus::Failed);
    let [failure] = reply.failures.as_slice() else {
        panic!("expected one failure, got {:?}", reply.failures);
    };
    assert_eq!(failure.reason, FailureReason::NoCapableAgent);
    assert_eq!(failure.capability, Some(capability_name("get_latest_emails")));
    assert_eq!(deployment.transport.call_count(), 0);
    assert!(reply.retry_safe);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unrecognised_text_is_reported() {
    let deployment = deploy(1_000, &[]).await;

    let reply = deployment
        .say(SessionId::new(), Intent::from_text("sing me a song"))
        .await;

    assert_eq!(reply.status, ReplyStatus::Failed);
    assert_eq!(
        reply.failures.first().map(|failure| failure.reason),
        Some(FailureReason::UnrecognizedIntent)
    );
    assert_eq!(deployment.transport.call_count(), 0);
}

#[rstest]
#[case::synonym(Intent::from_text("remind me to buy milk"), "create_task", "tasks")]
#[case::exact_name(Intent::from_text("please run search_events"), "search_events", "calendar")]
#[case::explicit(
    Intent::for_capability(capability_name("list_tasklists")),
    "list_tasklists",
    "tasks"
)]
#[tokio::test(flavor = "multi_thread")]
async fn single_capability_turns_reach_the_declaring_agent(
    #[case] intent: Intent,
    #[case] capability: &str,
    #[case] agent: &str,
) {
    let deployment = deploy(1_000, &[]).await;
    let intent = intent.with_parameter("title", json!("buy milk"));

    let reply = deployment.say(SessionId::new(), intent).await;

    assert_eq!(reply.status, ReplyStatus::Completed);
    let result = reply.result_for(capability).expect("step result");
    assert_eq!(result["request"]["title"], json!("buy milk"));
    let calls = deployment.transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls.first().map(|call| call.address.clone()),
        Some(deployment.address(agent))
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn briefing_steps_run_concurrently() {
    let deployment = deploy(2_000, &[]).await;
    let delay = Duration::from_millis(200);
    for (agent, capability) in [
        ("gmail", "get_latest_emails"),
        ("calendar", "list_events"),
        ("tasks", "list_tasks"),
    ] {
        deployment.script(
            agent,
            capability,
            ScriptedBehaviour::Delay(delay, Box::new(ScriptedBehaviour::Respond(json!(capability)))),
        );
    }

    let started = tokio::time::Instant::now();
    let reply = deployment
        .say(SessionId::new(), Intent::from_text("my morning briefing"))
        .await;

    assert!(started.elapsed() < delay * 3, "steps ran one after another");
    assert_eq!(reply.status, ReplyStatus::Completed);
    let order: Vec<&str> = reply.payload["results"]
        .as_array()
        .expect("results array")
        .iter()
        .filter_map(|entry| entry["capability"].as_str())
        .collect();
    assert_eq!(order, ["get_latest_emails", "list_events", "list_tasks"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn hanging_agent_times_the_turn_out() {
    let deployment = deploy(100, &[]).await;
    deployment.script("calendar", "list_events", ScriptedBehaviour::Hang);

    let reply = deployment
        .say(SessionId::new(), Intent::from_text("show my agenda"))
        .await;

    assert_eq!(reply.status, ReplyStatus::TimedOut);
    assert_eq!(
        reply.failures.first().map(|failure| failure.reason),
        Some(FailureReason::Timeout)
    );
    assert!(reply.retry_safe);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn follow_up_turns_extend_the_same_session() {
    let deployment = deploy(1_000, &[]).await;
    let session_id = SessionId::new();

    let first = deployment
        .say(session_id, Intent::from_text("show my agenda"))
        .await;
    let second = deployment
        .say(session_id, Intent::from_text("what is on my todo list"))
        .await;

    assert_eq!(first.session_id, session_id);
    assert_eq!(second.session_id, session_id);
    assert_ne!(first.turn_id, second.turn_id);
    let session = deployment
        .host
        .sessions()
        .snapshot(session_id)
        .await
        .expect("session exists");
    let history: Vec<_> = session
        .turn_history()
        .iter()
        .map(|record| record.turn_id)
        .collect();
    assert_eq!(history, [first.turn_id, second.turn_id]);
    assert!(session.active_turn().is_none());
}
