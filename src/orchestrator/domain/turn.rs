//! Inbound turns.

use crate::routing::domain::Intent;
use crate::session::domain::SessionId;
use serde::{Deserialize, Serialize};

/// One user turn as received by the host.
///
/// A turn without a session starts a new conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundTurn {
    /// Session to continue, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// The caller's intent.
    pub intent: Intent,
}

impl InboundTurn {
    /// Creates a turn that starts a new session.
    #[must_use]
    pub const fn new(intent: Intent) -> Self {
        Self {
            session_id: None,
            intent,
        }
    }

    /// Continues an existing session.
    #[must_use]
    pub const fn in_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }
}
