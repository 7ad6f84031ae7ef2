//! Ticket-based matchmaking.

use std::collections::BTreeMap;

use arcade_core::ids::{SessionId, TicketId};
use arcade_core::messages::UserPresence;
use parking_lot::Mutex;

/// One waiting ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchmakerEntry {
    pub ticket: TicketId,
    pub presence: UserPresence,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchmakerError {
    #[error("ticket not found")]
    TicketNotFound,
}

/// Outcome of adding a ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchmakeOutcome {
    /// Ticket issued to the caller.
    pub ticket: TicketId,
    /// Every entry of the completed group, the caller's included, if this
    /// ticket completed one.
    pub matched: Option<Vec<MatchmakerEntry>>,
}

pub trait Matchmaker: Send + Sync {
    /// Queue a ticket for a group of `required_count` distinct sessions.
    fn add(&self, presence: UserPresence, required_count: u32) -> MatchmakeOutcome;

    /// Withdraw a ticket owned by `session_id`.
    fn remove(&self, session_id: &SessionId, ticket: &TicketId) -> Result<(), MatchmakerError>;

    /// Withdraw every ticket owned by `session_id`. Returns how many were removed.
    fn remove_all(&self, session_id: &SessionId) -> usize;
}

/// First-come matchmaker: tickets wait in one pool per required count.
#[derive(Default)]
pub struct LocalMatchmaker {
    pools: Mutex<BTreeMap<u32, Vec<MatchmakerEntry>>>,
}

impl LocalMatchmaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tickets currently waiting.
    pub fn waiting(&self) -> usize {
        self.pools.lock().values().map(Vec::len).sum()
    }
}

impl Matchmaker for LocalMatchmaker {
    fn add(&self, presence: UserPresence, required_count: u32) -> MatchmakeOutcome {
        let entry = MatchmakerEntry {
            ticket: TicketId::new(),
            presence,
        };
        let ticket = entry.ticket.clone();
        let needed = required_count.saturating_sub(1) as usize;

        let mut pools = self.pools.lock();
        let pool = pools.entry(required_count).or_default();

        // Pick the oldest waiting tickets, one per session, never the caller's.
        let mut picked: Vec<usize> = Vec::with_capacity(needed.min(pool.len()));
        for (idx, candidate) in pool.iter().enumerate() {
            if picked.len() == needed {
                break;
            }
            let session = &candidate.presence.session_id;
            if *session == entry.presence.session_id
                || picked.iter().any(|&i| pool[i].presence.session_id == *session)
            {
                continue;
            }
            picked.push(idx);
        }

        if picked.len() < needed {
            pool.push(entry);
            return MatchmakeOutcome {
                ticket,
                matched: None,
            };
        }

        let mut matched = Vec::with_capacity(picked.len() + 1);
        for idx in picked.into_iter().rev() {
            matched.push(pool.remove(idx));
        }
        matched.reverse();
        matched.push(entry);
        if pool.is_empty() {
            let _ = pools.remove(&required_count);
        }
        MatchmakeOutcome {
            ticket,
            matched: Some(matched),
        }
    }

    fn remove(&self, session_id: &SessionId, ticket: &TicketId) -> Result<(), MatchmakerError> {
        let mut pools = self.pools.lock();
        let found = pools.iter().find_map(|(count, pool)| {
            pool.iter()
                .position(|e| e.ticket == *ticket && e.presence.session_id == session_id.as_str())
                .map(|idx| (*count, idx))
        });
        let (count, idx) = found.ok_or(MatchmakerError::TicketNotFound)?;
        if let Some(pool) = pools.get_mut(&count) {
            let _ = pool.remove(idx);
            if pool.is_empty() {
                let _ = pools.remove(&count);
            }
        }
        Ok(())
    }

    fn remove_all(&self, session_id: &SessionId) -> usize {
        let mut pools = self.pools.lock();
        let mut removed = 0;
        pools.retain(|_, pool| {
            let before = pool.len();
            pool.retain(|e| e.presence.session_id != session_id.as_str());
            removed += before - pool.len();
            !pool.is_empty()
        });
        removed
    }
}
