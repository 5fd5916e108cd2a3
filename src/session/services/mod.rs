//! Application services for sessions.

mod manager;

pub use manager::{SessionGuard, SessionManager};
