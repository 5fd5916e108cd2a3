//! Router: turns a parsed intent into a dependency-aware plan.
//!
//! Matching tries configured decomposition rules first, then exact
//! capability names, then the synonym table. Every capability in a plan
//! is checked against the capability registry before the plan is
//! returned, so an unservable plan never reaches dispatch.
//!
//! - Domain types in [`domain`]
//! - The router service in [`services`]

pub mod domain;
pub mod services;

#[cfg(test)]
mod tests;
