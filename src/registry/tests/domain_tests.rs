//! Unit tests for registry domain types.

use crate::registry::domain::{
    AgentAddress, AgentDescriptor, AgentId, Capability, CapabilityEffect, CapabilityName,
    HealthStatus, ParseHealthStatusError, RegistryDomainError,
};
use chrono::{TimeDelta, Utc};
use rstest::rstest;
use serde_json::json;

fn capability(name: &str) -> Capability {
    Capability::new(CapabilityName::new(name).expect("valid capability name"))
}

// ── Identifier validation ──────────────────────────────────────────

#[rstest]
#[case("gmail")]
#[case("calendar_agent")]
#[case("tasks2")]
fn valid_agent_ids_are_accepted(#[case] input: &str) {
    let id = AgentId::new(input).expect("valid agent id");
    assert_eq!(id.as_str(), input);
}

#[rstest]
fn capability_name_is_trimmed_and_lowercased() {
    let name = CapabilityName::new("  Send_Email ").expect("accepted after normalisation");
    assert_eq!(name.as_str(), "send_email");
}

#[rstest]
#[case("send-email")]
#[case("send email")]
#[case("send.email")]
fn invalid_capability_names_are_rejected(#[case] input: &str) {
    assert!(matches!(
        CapabilityName::new(input),
        Err(RegistryDomainError::InvalidCapabilityName(_))
    ));
}

#[rstest]
fn empty_agent_id_is_rejected() {
    assert_eq!(AgentId::new("  "), Err(RegistryDomainError::EmptyAgentId));
}

#[rstest]
fn overlong_identifier_is_rejected() {
    let long = "a".repeat(101);
    assert!(matches!(
        CapabilityName::new(long),
        Err(RegistryDomainError::IdentifierTooLong(_))
    ));
}

#[rstest]
fn agent_id_deserialization_validates() {
    let parsed: Result<AgentId, _> = serde_json::from_str("\"not valid\"");
    assert!(parsed.is_err());
}

// ── Addresses ──────────────────────────────────────────────────────

#[rstest]
fn address_strips_trailing_slash_and_joins_endpoints() {
    let address = AgentAddress::new("http://localhost:10002/").expect("valid address");
    assert_eq!(address.as_str(), "http://localhost:10002");
    assert_eq!(address.endpoint("/invoke"), "http://localhost:10002/invoke");
}

#[rstest]
#[case("localhost:10002")]
#[case("ftp://agents")]
fn address_without_http_prefix_is_rejected(#[case] input: &str) {
    assert!(matches!(
        AgentAddress::new(input),
        Err(RegistryDomainError::InvalidAddress(_))
    ));
}

// ── Capabilities and descriptors ───────────────────────────────────

#[rstest]
fn capabilities_with_same_contract_are_compatible() {
    let schema = json!({"type": "object"});
    let first = capability("send_email")
        .with_effect(CapabilityEffect::Mutating)
        .with_input_schema(schema.clone())
        .with_description("Sends mail");
    let second = capability("send_email")
        .with_effect(CapabilityEffect::Mutating)
        .with_input_schema(schema);

    assert!(first.is_compatible_with(&second));
}

#[rstest]
fn differing_effect_is_incompatible() {
    let read = capability("send_email");
    let write = capability("send_email").with_effect(CapabilityEffect::Mutating);
    assert!(!read.is_compatible_with(&write));
}

#[rstest]
fn descriptor_rejects_duplicate_capabilities() {
    let result = AgentDescriptor::new(
        AgentId::new("gmail").expect("valid id"),
        AgentAddress::new("http://gmail.test").expect("valid address"),
        [capability("send_email"), capability("send_email")],
        Utc::now(),
    );
    assert!(matches!(
        result,
        Err(RegistryDomainError::DuplicateCapability(_))
    ));
}

#[rstest]
fn descriptor_starts_unknown_and_tracks_outage_start() {
    let registered_at = Utc::now();
    let mut descriptor = AgentDescriptor::new(
        AgentId::new("calendar").expect("valid id"),
        AgentAddress::new("http://calendar.test").expect("valid address"),
        [capability("list_events")],
        registered_at,
    )
    .expect("valid descriptor");
    assert_eq!(descriptor.health_status(), HealthStatus::Unknown);

    let first_failure = registered_at + TimeDelta::seconds(10);
    descriptor.observe_health(HealthStatus::Down, first_failure);
    descriptor.observe_health(HealthStatus::Down, first_failure + TimeDelta::seconds(10));

    assert_eq!(descriptor.health().down_since(), Some(first_failure));

    descriptor.observe_health(HealthStatus::Up, first_failure + TimeDelta::seconds(20));
    assert_eq!(descriptor.health().down_since(), None);
    assert!(descriptor.health().last_success_at().is_some());
}

#[rstest]
#[case("up", HealthStatus::Up)]
#[case(" DOWN ", HealthStatus::Down)]
#[case("unknown", HealthStatus::Unknown)]
fn health_status_parses(#[case] input: &str, #[case] expected: HealthStatus) {
    assert_eq!(HealthStatus::try_from(input), Ok(expected));
}

#[rstest]
fn unknown_health_status_is_rejected() {
    assert_eq!(
        HealthStatus::try_from("flapping"),
        Err(ParseHealthStatusError("flapping".to_owned()))
    );
}
