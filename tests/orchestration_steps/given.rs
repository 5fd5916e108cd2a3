//! Given steps for orchestration BDD scenarios.

use super::world::{OrchestrationWorld, run_async, scenario_config, serve_cards};
use concierge::clock::ManualClock;
use concierge::dispatch::adapters::ScriptedBehaviour;
use concierge::host::Host;
use concierge::registry::domain::CapabilityName;
use eyre::WrapErr;
use rstest_bdd_macros::given;
use serde_json::json;
use std::sync::Arc;

#[given("a host configured with the mail, calendar and tasks agents")]
fn configured_host(world: &mut OrchestrationWorld) -> Result<(), eyre::Report> {
    let config = scenario_config().wrap_err("load bundled configuration")?;
    serve_cards(&world.transport, &config).wrap_err("serve agent cards")?;
    let host = Host::from_config(
        &config,
        Arc::clone(&world.transport),
        Arc::new(ManualClock::default()),
    )
    .wrap_err("assemble host")?;
    world.host = Some(host);
    Ok(())
}

#[given(r#"the calendar agent lists the event "{summary}""#)]
fn calendar_lists_event(world: &mut OrchestrationWorld, summary: String) -> Result<(), eyre::Report> {
    let address = world.address("calendar")?;
    world.transport.set_behaviour(
        &address,
        &CapabilityName::new("list_events")?,
        ScriptedBehaviour::Respond(json!({ "events": [{ "summary": summary }] })),
    )?;
    Ok(())
}

#[given("all reachable agents have been probed")]
fn agents_probed(world: &mut OrchestrationWorld) -> Result<(), eyre::Report> {
    let host = world.host()?;
    let report = run_async(host.housekeeper().run_once());
    if report.probed.is_empty() {
        return Err(eyre::eyre!("no agents were probed"));
    }
    Ok(())
}

#[given(r#"the "{agent}" agent goes offline"#)]
fn agent_goes_offline(world: &mut OrchestrationWorld, agent: String) -> Result<(), eyre::Report> {
    let address = world.address(&agent)?;
    world
        .transport
        .take_offline(&address)
        .wrap_err("take agent offline")?;
    Ok(())
}
