//! Per-session exclusion over a sharded session table.

use crate::session::domain::{Session, SessionError, SessionId};
use dashmap::DashMap;
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

type SessionHandle = Arc<Mutex<Session>>;

/// Exclusive access to one session, held for the duration of a turn.
pub type SessionGuard = OwnedMutexGuard<Session>;

/// Holds every live session, each behind its own lock.
///
/// The table itself is sharded so lookups of different sessions never
/// serialise on one lock. Mutation of a session always happens through
/// that session's mutex, which grants waiters access in arrival order.
pub struct SessionManager<C: Clock + Send + Sync> {
    sessions: DashMap<SessionId, SessionHandle>,
    clock: Arc<C>,
}

impl<C: Clock + Send + Sync> SessionManager<C> {
    /// Creates an empty session table.
    #[must_use]
    pub fn new(clock: Arc<C>) -> Self {
        Self {
            sessions: DashMap::new(),
            clock,
        }
    }

    fn handle(&self, session_id: SessionId) -> SessionHandle {
        let entry = self.sessions.entry(session_id).or_insert_with(|| {
            info!(session_id = %session_id, "session created");
            Arc::new(Mutex::new(Session::new(session_id, self.clock.utc())))
        });
        Arc::clone(entry.value())
    }

    /// Returns a snapshot of the session, creating it when absent.
    pub async fn get_or_create(&self, session_id: SessionId) -> Session {
        let handle = self.handle(session_id);
        let session = handle.lock().await;
        session.clone()
    }

    /// Acquires exclusive access to the session, creating it when absent.
    ///
    /// Callers queue in arrival order. The guard keeps the session alive
    /// and protects it from idle eviction until dropped.
    pub async fn lock(&self, session_id: SessionId) -> SessionGuard {
        let handle = self.handle(session_id);
        let mut guard = handle.lock_owned().await;
        guard.touch(self.clock.utc());
        guard
    }

    /// Applies `mutator` to the session under single-writer exclusion.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] when the session does not exist.
    pub async fn with_session<R, F>(&self, session_id: SessionId, mutator: F) -> Result<R, SessionError>
    where
        F: FnOnce(&mut Session) -> R,
    {
        let handle = self
            .sessions
            .get(&session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(SessionError::NotFound(session_id))?;
        let mut session = handle.lock().await;
        let result = mutator(&mut *session);
        session.touch(self.clock.utc());
        Ok(result)
    }

    /// Returns a snapshot of the session without creating it.
    pub async fn snapshot(&self, session_id: SessionId) -> Option<Session> {
        let handle = self
            .sessions
            .get(&session_id)
            .map(|entry| Arc::clone(entry.value()))?;
        let session = handle.lock().await;
        Some(session.clone())
    }

    /// Removes sessions inactive for longer than `threshold`.
    ///
    /// Sessions that are locked or referenced by an in-flight turn are
    /// never evicted. Returns the evicted session identifiers.
    pub fn evict_idle(&self, threshold: Duration) -> Vec<SessionId> {
        let now = self.clock.utc();
        let mut evicted = Vec::new();
        self.sessions.retain(|session_id, handle| {
            if Arc::strong_count(handle) > 1 {
                return true;
            }
            let idle = handle
                .try_lock()
                .is_ok_and(|session| session.is_idle(now, threshold));
            if idle {
                evicted.push(*session_id);
            }
            !idle
        });
        for session_id in &evicted {
            debug!(session_id = %session_id, "evicted idle session");
        }
        evicted
    }

    /// Returns `true` when the session exists.
    #[must_use]
    pub fn contains(&self, session_id: SessionId) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// Returns the number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` when no sessions are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
