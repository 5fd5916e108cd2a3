//! Domain model for agent registration and capability discovery.
//!
//! Agents declare named capabilities with schema hints. Health is tracked
//! per agent and only changes through explicit [`RegistryEvent`] values.

mod address;
mod capability;
mod descriptor;
mod error;
mod event;
mod health;
mod ids;

pub use address::AgentAddress;
pub use capability::{Capability, CapabilityEffect};
pub use descriptor::AgentDescriptor;
pub use error::{ParseHealthStatusError, RegistryDomainError};
pub use event::RegistryEvent;
pub use health::{HealthStatus, HealthSnapshot};
pub use ids::{AgentId, CapabilityName};
