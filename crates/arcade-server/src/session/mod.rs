//! Per-connection session handle.

pub mod registry;

pub use registry::SessionRegistry;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use arcade_core::ids::{SessionId, UserId};
use arcade_core::messages::UserPresence;
use arcade_core::Envelope;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Why an envelope could not be queued for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("session is closed")]
    Closed,
    #[error("session send queue is full")]
    QueueFull,
}

/// A connected client: the send half of its outbound queue plus the switch
/// that tears its transport down.
pub struct Session {
    id: SessionId,
    user_id: UserId,
    handle: String,
    tx: mpsc::Sender<Envelope>,
    closed: AtomicBool,
    shutdown: CancellationToken,
    connected_at: Instant,
    dropped_messages: AtomicU64,
}

impl Session {
    /// Create a session for `user_id`, writing into `tx`.
    pub fn new(user_id: UserId, handle: impl Into<String>, tx: mpsc::Sender<Envelope>) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            handle: handle.into(),
            tx,
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            connected_at: Instant::now(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// How other users see this session.
    pub fn presence(&self) -> UserPresence {
        UserPresence {
            user_id: self.user_id.to_string(),
            session_id: self.id.to_string(),
            handle: self.handle.clone(),
        }
    }

    /// Queue an envelope for delivery.
    ///
    /// Never blocks. A closed session reports [`SendError::Closed`]; a full
    /// queue drops the envelope and counts it.
    pub fn send(&self, envelope: Envelope) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Closed);
        }
        match self.tx.try_send(envelope) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                Err(SendError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendError::Closed),
        }
    }

    /// Close the transport. Returns `true` only for the call that actually
    /// closed it; later calls are no-ops.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.shutdown.cancel();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.shutdown.cancelled()
    }

    /// Total envelopes dropped because the queue was full.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("handle", &self.handle)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn make_session() -> (Session, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(32);
        (Session::new(UserId::from_raw("u1"), "alice", tx), rx)
    }

    #[test]
    fn create_session() {
        let (session, _rx) = make_session();
        assert!(session.id().as_str().starts_with("sess_"));
        assert_eq!(session.user_id().as_str(), "u1");
        assert_eq!(session.handle(), "alice");
        assert!(!session.is_closed());
    }

    #[test]
    fn presence_mirrors_session() {
        let (session, _rx) = make_session();
        let presence = session.presence();
        assert_eq!(presence.user_id, "u1");
        assert_eq!(presence.session_id, session.id().as_str());
        assert_eq!(presence.handle, "alice");
    }

    #[tokio::test]
    async fn send_message_success() {
        let (session, mut rx) = make_session();
        session.send(Envelope::ack("c1")).unwrap();
        let env = rx.recv().await.unwrap();
        assert_eq!(env.collation_id, "c1");
    }

    #[test]
    fn send_after_close_reports_closed() {
        let (session, mut rx) = make_session();
        assert!(session.close());
        assert_eq!(session.send(Envelope::ack("c2")), Err(SendError::Closed));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn send_to_dropped_receiver_reports_closed() {
        let (session, rx) = make_session();
        drop(rx);
        assert_eq!(session.send(Envelope::ack("c3")), Err(SendError::Closed));
    }

    #[test]
    fn send_to_full_queue_drops_and_counts() {
        let (tx, _rx) = mpsc::channel(1);
        let session = Session::new(UserId::from_raw("u2"), "bob", tx);
        session.send(Envelope::ack("1")).unwrap();
        assert_eq!(session.send(Envelope::ack("2")), Err(SendError::QueueFull));
        assert_eq!(session.drop_count(), 1);
    }

    #[test]
    fn close_is_idempotent() {
        let (session, _rx) = make_session();
        assert!(session.close());
        assert!(!session.close());
        assert!(!session.close());
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn closed_future_resolves_after_close() {
        let (session, _rx) = make_session();
        let session = Arc::new(session);
        let waiter = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.closed().await })
        };
        let _ = session.close();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_close_and_send_never_panic() {
        let (tx, _rx) = mpsc::channel(1024);
        let session = Arc::new(Session::new(UserId::from_raw("u3"), "carol", tx));
        let mut tasks = Vec::new();
        for i in 0..16 {
            let session = Arc::clone(&session);
            tasks.push(tokio::spawn(async move {
                if i % 4 == 0 {
                    session.close()
                } else {
                    let _ = session.send(Envelope::ack(i.to_string()));
                    false
                }
            }));
        }
        let mut closes = 0;
        for task in tasks {
            if task.await.unwrap() {
                closes += 1;
            }
        }
        assert_eq!(closes, 1);
        assert!(session.is_closed());
    }
}
