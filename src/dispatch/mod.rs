//! Agent client: the uniform transport adapter between host and agents.
//!
//! Requests travel as [`domain::RequestEnvelope`] values and come back as
//! [`domain::ResponseEnvelope`] values carrying an OK, FAILED or TIMEOUT
//! status. The client enforces deadlines, retries transient failures with
//! exponential backoff and reports liveness to the capability registry.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - The client service in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
