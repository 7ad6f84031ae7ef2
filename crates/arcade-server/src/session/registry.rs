//! Concurrent registry of live sessions.

use std::sync::Arc;

use arcade_core::ids::{SessionId, UserId};
use arcade_core::Envelope;
use dashmap::DashMap;

use super::{SendError, Session};

/// Every session currently connected, keyed by session id.
///
/// The transport inserts on connect; both the transport (on disconnect) and
/// the dispatcher (on logout) remove. Removal is atomic per key, so when
/// several paths race to remove the same session exactly one of them wins.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a session. Replaces any entry with the same id.
    pub fn add(&self, session: Arc<Session>) {
        let _ = self.sessions.insert(session.id().clone(), session);
    }

    /// Stop tracking a session. Returns `true` if this call removed it.
    pub fn remove(&self, session: &Session) -> bool {
        self.sessions.remove(session.id()).is_some()
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Number of live sessions.
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// All sessions belonging to one user.
    pub fn sessions_for_user(&self, user_id: &UserId) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .filter(|entry| entry.value().user_id() == user_id)
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Queue an envelope for one session by id.
    pub fn send_to(&self, id: &SessionId, envelope: Envelope) -> Result<(), SendError> {
        // Clone out of the map so no shard lock is held while sending.
        let session = self.get(id).ok_or(SendError::Closed)?;
        session.send(envelope)
    }
}
