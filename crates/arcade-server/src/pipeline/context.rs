//! Shared collaborators handed to every payload handler.

use std::sync::Arc;
use std::time::Instant;

use secrecy::{ExposeSecret, SecretString};

use crate::config::Config;
use crate::matchmaker::{LocalMatchmaker, Matchmaker};
use crate::presence::{LocalTracker, Tracker};
use crate::router::{LocalMessageRouter, MessageRouter};
use crate::session::{Session, SessionRegistry};
use crate::storage::{MemoryStorage, StorageEngine};

/// Everything a handler may reach, fixed for the life of the process.
pub struct Services {
    pub config: Arc<Config>,
    /// Live sessions on this node.
    pub registry: Arc<SessionRegistry>,
    pub tracker: Arc<dyn Tracker>,
    pub matchmaker: Arc<dyn Matchmaker>,
    /// Fan-out to presences.
    pub router: Arc<dyn MessageRouter>,
    pub storage: Arc<dyn StorageEngine>,
    /// Key used to sign match tokens.
    hmac_secret: SecretString,
    pub started_at: Instant,
}

impl Services {
    /// Wire up the in-process collaborators.
    pub fn local(config: Arc<Config>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let router = Arc::new(LocalMessageRouter::new(Arc::clone(&registry)));
        Self {
            hmac_secret: SecretString::from(config.session.encryption_key.clone()),
            config,
            registry,
            tracker: Arc::new(LocalTracker::new()),
            matchmaker: Arc::new(LocalMatchmaker::new()),
            router,
            storage: Arc::new(MemoryStorage::new()),
            started_at: Instant::now(),
        }
    }

    pub fn hmac_secret(&self) -> &[u8] {
        self.hmac_secret.expose_secret().as_bytes()
    }
}

/// What a handler sees for one request.
pub struct HandlerContext<'a> {
    pub services: &'a Services,
    pub session: &'a Arc<Session>,
    pub collation_id: &'a str,
}
