//! Port contracts for reaching agents.
//!
//! Ports define transport-agnostic interfaces used by the agent client.

pub mod transport;

pub use transport::{AgentCard, AgentTransport, TransportError, TransportResult};
