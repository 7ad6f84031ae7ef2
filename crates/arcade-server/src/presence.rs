//! Presence tracking: which sessions are in which topic or match.

use std::collections::{BTreeMap, HashMap};

use arcade_core::ids::{MatchId, SessionId};
use arcade_core::messages::{TopicId, UserPresence};
use parking_lot::RwLock;

/// A stream that sessions can be present on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PresenceStream {
    Topic(TopicId),
    Match(MatchId),
}

/// Record of who is present where.
pub trait Tracker: Send + Sync {
    /// Add a presence. Returns `false` if the session was already tracked on
    /// the stream.
    fn track(&self, stream: PresenceStream, presence: UserPresence) -> bool;

    /// Remove one session from one stream. Returns the removed presence.
    fn untrack(&self, stream: &PresenceStream, session_id: &SessionId) -> Option<UserPresence>;

    /// Remove one session from every stream it is on.
    fn untrack_all(&self, session_id: &SessionId) -> Vec<(PresenceStream, UserPresence)>;

    /// Everyone on a stream, ordered by session id.
    fn list(&self, stream: &PresenceStream) -> Vec<UserPresence>;

    fn is_tracked(&self, stream: &PresenceStream, session_id: &SessionId) -> bool;
}

/// In-process tracker for a single node.
#[derive(Default)]
pub struct LocalTracker {
    streams: RwLock<HashMap<PresenceStream, BTreeMap<SessionId, UserPresence>>>,
}

impl LocalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of streams with at least one presence.
    pub fn stream_count(&self) -> usize {
        self.streams.read().len()
    }
}

impl Tracker for LocalTracker {
    fn track(&self, stream: PresenceStream, presence: UserPresence) -> bool {
        let session_id = SessionId::from_raw(presence.session_id.clone());
        let mut streams = self.streams.write();
        streams
            .entry(stream)
            .or_default()
            .insert(session_id, presence)
            .is_none()
    }

    fn untrack(&self, stream: &PresenceStream, session_id: &SessionId) -> Option<UserPresence> {
        let mut streams = self.streams.write();
        let members = streams.get_mut(stream)?;
        let removed = members.remove(session_id);
        if members.is_empty() {
            let _ = streams.remove(stream);
        }
        removed
    }

    fn untrack_all(&self, session_id: &SessionId) -> Vec<(PresenceStream, UserPresence)> {
        let mut streams = self.streams.write();
        let mut removed = Vec::new();
        streams.retain(|stream, members| {
            if let Some(presence) = members.remove(session_id) {
                removed.push((stream.clone(), presence));
            }
            !members.is_empty()
        });
        removed
    }

    fn list(&self, stream: &PresenceStream) -> Vec<UserPresence> {
        self.streams
            .read()
            .get(stream)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    fn is_tracked(&self, stream: &PresenceStream, session_id: &SessionId) -> bool {
        self.streams
            .read()
            .get(stream)
            .is_some_and(|members| members.contains_key(session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presence(user: &str, session: &str) -> UserPresence {
        UserPresence {
            user_id: user.into(),
            session_id: session.into(),
            handle: user.into(),
        }
    }

    fn lobby() -> PresenceStream {
        PresenceStream::Topic(TopicId::room("lobby"))
    }

    #[test]
    fn track_and_list() {
        let tracker = LocalTracker::new();
        assert!(tracker.track(lobby(), presence("a", "s2")));
        assert!(tracker.track(lobby(), presence("b", "s1")));
        let listed = tracker.list(&lobby());
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].session_id, "s1");
    }

    #[test]
    fn double_track_reports_false() {
        let tracker = LocalTracker::new();
        assert!(tracker.track(lobby(), presence("a", "s1")));
        assert!(!tracker.track(lobby(), presence("a", "s1")));
        assert_eq!(tracker.list(&lobby()).len(), 1);
    }

    #[test]
    fn untrack_drops_empty_streams() {
        let tracker = LocalTracker::new();
        let _ = tracker.track(lobby(), presence("a", "s1"));
        let removed = tracker.untrack(&lobby(), &SessionId::from_raw("s1"));
        assert_eq!(removed.unwrap().user_id, "a");
        assert_eq!(tracker.stream_count(), 0);
        assert!(tracker.untrack(&lobby(), &SessionId::from_raw("s1")).is_none());
    }

    #[test]
    fn untrack_all_reports_every_stream() {
        let tracker = LocalTracker::new();
        let m = PresenceStream::Match(MatchId::from_raw("m1"));
        let _ = tracker.track(lobby(), presence("a", "s1"));
        let _ = tracker.track(m.clone(), presence("a", "s1"));
        let _ = tracker.track(m.clone(), presence("b", "s2"));

        let removed = tracker.untrack_all(&SessionId::from_raw("s1"));
        assert_eq!(removed.len(), 2);
        assert!(!tracker.is_tracked(&lobby(), &SessionId::from_raw("s1")));
        assert!(tracker.is_tracked(&m, &SessionId::from_raw("s2")));
        assert_eq!(tracker.stream_count(), 1);
    }

    #[test]
    fn list_unknown_stream_is_empty() {
        let tracker = LocalTracker::new();
        assert!(tracker.list(&lobby()).is_empty());
    }
}
