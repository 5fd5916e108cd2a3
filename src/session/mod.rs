//! Session manager: per-conversation state with single-writer exclusion.
//!
//! Each session is guarded by its own asynchronous mutex, so unrelated
//! conversations never contend. Turns on one session are serialised in
//! arrival order by that mutex.
//!
//! - Domain types in [`domain`]
//! - The session table in [`services`]

pub mod domain;
pub mod services;

#[cfg(test)]
mod tests;
