//! When steps for orchestration BDD scenarios.

use super::world::{OrchestrationWorld, USER_EMAIL, run_async};
use concierge::orchestrator::domain::InboundTurn;
use concierge::routing::domain::Intent;
use rstest_bdd_macros::when;
use serde_json::json;

#[when(r#"the user asks "{text}""#)]
fn user_asks(world: &mut OrchestrationWorld, text: String) -> Result<(), eyre::Report> {
    let session_id = world.session_id;
    let host = world.host()?;
    let history_before = run_async(host.sessions().snapshot(session_id))
        .map_or(0, |session| session.turn_history().len());
    let intent = Intent::from_text(text).with_parameter("user_email", json!(USER_EMAIL));
    let reply = run_async(
        host.orchestrator()
            .handle_turn(InboundTurn::new(intent).in_session(session_id)),
    );
    world.history_before = history_before;
    world.last_reply = Some(reply);
    Ok(())
}
