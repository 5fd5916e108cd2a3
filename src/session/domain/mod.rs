//! Domain model for conversation sessions.

mod error;
mod ids;
mod session;

pub use error::SessionError;
pub use ids::{SessionId, TurnId};
pub use session::{Session, TurnRecord};
