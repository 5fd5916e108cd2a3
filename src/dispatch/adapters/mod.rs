//! Adapter implementations for the agent transport port.

pub mod http;
pub mod memory;

pub use http::HttpAgentTransport;
pub use memory::{RecordedCall, ScriptedAgentTransport, ScriptedBehaviour};
