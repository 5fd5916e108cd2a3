//! Concurrent turns within one session and across sessions.

use crate::in_memory::helpers::deploy;
use concierge::dispatch::adapters::ScriptedBehaviour;
use concierge::orchestrator::domain::ReplyStatus;
use concierge::routing::domain::Intent;
use concierge::session::domain::SessionId;
use rstest::rstest;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_turns_in_one_session_are_all_recorded() {
    let deployment = Arc::new(deploy(1_000, &[]).await);
    deployment.script(
        "tasks",
        "list_tasks",
        ScriptedBehaviour::Delay(
            Duration::from_millis(5),
            Box::new(ScriptedBehaviour::Respond(json!({ "tasks": [] }))),
        ),
    );
    let session_id = SessionId::new();

    let mut turns = JoinSet::new();
    for _ in 0..8 {
        let deployment = Arc::clone(&deployment);
        turns.spawn(async move {
            deployment
                .say(session_id, Intent::from_text("show my todo items"))
                .await
        });
    }
    let mut turn_ids = HashSet::new();
    while let Some(joined) = turns.join_next().await {
        let reply = joined.expect("turn task completes");
        assert_eq!(reply.status, ReplyStatus::Completed);
        turn_ids.insert(reply.turn_id);
    }

    let session = deployment
        .host
        .sessions()
        .snapshot(session_id)
        .await
        .expect("session exists");
    let recorded: HashSet<_> = session
        .turn_history()
        .iter()
        .map(|record| record.turn_id)
        .collect();
    assert_eq!(turn_ids.len(), 8);
    assert_eq!(recorded, turn_ids);
    assert!(session.active_turn().is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_slow_session_does_not_hold_up_another() {
    let deployment = Arc::new(deploy(2_000, &[]).await);
    deployment.script(
        "calendar",
        "list_events",
        ScriptedBehaviour::Delay(
            Duration::from_millis(800),
            Box::new(ScriptedBehaviour::Respond(json!({ "events": [] }))),
        ),
    );
    let slow_session = SessionId::new();
    let quick_session = SessionId::new();

    let slow = {
        let deployment = Arc::clone(&deployment);
        tokio::spawn(async move {
            deployment
                .say(slow_session, Intent::from_text("show my agenda"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let quick = tokio::time::timeout(
        Duration::from_millis(400),
        deployment.say(quick_session, Intent::from_text("remind me to call mum")),
    )
    .await
    .expect("quick session is not blocked by the slow one");
    assert_eq!(quick.status, ReplyStatus::Completed);
    assert!(!slow.is_finished());

    let slow_reply = slow.await.expect("slow turn completes");
    assert_eq!(slow_reply.status, ReplyStatus::Completed);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn turns_in_one_session_run_one_at_a_time() {
    let deployment = Arc::new(deploy(2_000, &[]).await);
    let step = Duration::from_millis(150);
    deployment.script(
        "calendar",
        "list_events",
        ScriptedBehaviour::Delay(step, Box::new(ScriptedBehaviour::Respond(json!([])))),
    );
    let session_id = SessionId::new();

    let started = tokio::time::Instant::now();
    let first = {
        let deployment = Arc::clone(&deployment);
        tokio::spawn(async move {
            deployment
                .say(session_id, Intent::from_text("show my agenda"))
                .await
        })
    };
    let second = deployment
        .say(session_id, Intent::from_text("show my agenda"))
        .await;
    let first_reply = first.await.expect("first turn completes");

    assert!(started.elapsed() >= step * 2, "turns overlapped");
    assert_eq!(first_reply.status, ReplyStatus::Completed);
    assert_eq!(second.status, ReplyStatus::Completed);
}
