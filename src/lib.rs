//! Concierge: host orchestration core for mail, calendar and task agents.
//!
//! A user turn arrives at the [`orchestrator`], which loads the
//! conversation from the [`session`] manager, asks the [`routing`] layer
//! for a plan over the capabilities held in the [`registry`], executes
//! the plan's steps through the [`dispatch`] client (independent steps
//! concurrently), merges the results and replies.
//!
//! # Architecture
//!
//! Each component follows hexagonal architecture principles:
//!
//! - **Domain**: Pure types and invariants with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (HTTP, in-memory)
//! - **Services**: Coordination of domain types over ports
//!
//! # Modules
//!
//! - [`registry`]: Agent descriptors, capabilities and health
//! - [`dispatch`]: Agent client with deadlines, retries and transports
//! - [`routing`]: Intents, plans, input binders and routing rules
//! - [`session`]: Per-conversation state under per-session exclusion
//! - [`orchestrator`]: Turn state machine, plan scheduling and housekeeping
//! - [`config`], [`telemetry`], [`host`]: Startup configuration and wiring

pub mod clock;
pub mod config;
pub mod dispatch;
pub mod host;
pub mod orchestrator;
pub mod registry;
pub mod routing;
pub mod session;
pub mod telemetry;
