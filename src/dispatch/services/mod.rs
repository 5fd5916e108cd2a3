//! Application services for agent dispatch.

mod client;

pub use client::{AgentClient, DiscoveryError};
