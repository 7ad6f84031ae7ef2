//! Delivery of envelopes to sets of presences.

use std::sync::Arc;

use arcade_core::ids::SessionId;
use arcade_core::messages::UserPresence;
use arcade_core::Envelope;
use tracing::{debug, warn};

use crate::session::{SendError, SessionRegistry};

/// Fan-out of one envelope to many presences.
pub trait MessageRouter: Send + Sync {
    /// Deliver `envelope` to every presence. Returns how many sessions
    /// accepted it.
    fn send(&self, presences: &[UserPresence], envelope: &Envelope) -> usize;
}

/// Router that delivers to sessions connected to this node.
pub struct LocalMessageRouter {
    registry: Arc<SessionRegistry>,
}

impl LocalMessageRouter {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }
}

impl MessageRouter for LocalMessageRouter {
    fn send(&self, presences: &[UserPresence], envelope: &Envelope) -> usize {
        let mut delivered = 0;
        for presence in presences {
            let session_id = SessionId::from_raw(presence.session_id.clone());
            match self.registry.send_to(&session_id, envelope.clone()) {
                Ok(()) => delivered += 1,
                Err(SendError::Closed) => {
                    debug!(session_id = %session_id, "skipping closed session");
                }
                Err(SendError::QueueFull) => {
                    warn!(session_id = %session_id, "send queue full, message dropped");
                }
            }
        }
        delivered
    }
}
