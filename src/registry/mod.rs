//! Capability registry for the concierge host.
//!
//! The registry records which specialised agents are known to the host,
//! where they live, what capabilities they declare and how healthy they
//! currently look. It is shared by every turn for the lifetime of the
//! process. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - The concurrent registry service in [`services`]

pub mod domain;
pub mod services;

#[cfg(test)]
mod tests;
