//! Orchestrator: the per-turn control loop.
//!
//! A turn moves through `Received`, `Planned`, `Executing`, `Merging` and
//! `Replied`, or ends in `Failed`. Plans execute as a dependency graph:
//! ready steps are dispatched concurrently, dependants wait for their
//! inputs, and merged results always follow plan order.
//!
//! - Domain types in [`domain`]
//! - The orchestrator and housekeeping services in [`services`]

pub mod domain;
pub mod services;

#[cfg(test)]
mod tests;
