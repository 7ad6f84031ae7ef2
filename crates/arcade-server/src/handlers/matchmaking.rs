//! Matchmaking tickets.

use arcade_core::ids::{MatchId, TicketId};
use arcade_core::messages::{MatchmakeMatched, MatchmakeTicket, UserPresence};
use arcade_core::{Envelope, Payload};
use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::matchmaker::MatchmakerEntry;
use crate::pipeline::{HandlerContext, HandlerError, PayloadHandler, Reply};
use crate::token::issue_match_token;

pub struct MatchmakeAddHandler;

impl MatchmakeAddHandler {
    /// Hand every member of a completed group the same signed match token.
    fn notify_matched(
        ctx: &HandlerContext<'_>,
        matched: &[MatchmakerEntry],
    ) -> Result<(), HandlerError> {
        let match_id = MatchId::new();
        let expiry_secs = ctx.services.config.matchmaker.token_expiry_ms.div_ceil(1000);
        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
        let expires_at = now.saturating_add(expiry_secs);
        let token = issue_match_token(ctx.services.hmac_secret(), &match_id, expires_at)
            .map_err(|e| HandlerError::runtime(format!("Could not issue match token: {e}")))?;

        let presences: Vec<UserPresence> = matched.iter().map(|e| e.presence.clone()).collect();
        for entry in matched {
            let event = Payload::MatchmakeMatched(MatchmakeMatched {
                ticket: entry.ticket.to_string(),
                token: token.clone(),
                presences: presences.clone(),
                self_presence: entry.presence.clone(),
            });
            if ctx
                .services
                .router
                .send(std::slice::from_ref(&entry.presence), &Envelope::push(event))
                == 0
            {
                warn!(session_id = %entry.presence.session_id, "matched session unreachable");
            }
        }
        info!(match_id = %match_id, size = matched.len(), "matchmaking group formed");
        Ok(())
    }
}

#[async_trait]
impl PayloadHandler for MatchmakeAddHandler {
    #[instrument(skip_all, fields(payload = "matchmake_add"))]
    async fn handle(
        &self,
        ctx: &HandlerContext<'_>,
        payload: &Payload,
    ) -> Result<Reply, HandlerError> {
        let Payload::MatchmakeAdd(add) = payload else {
            return Err(HandlerError::bad_input("Expected matchmake_add"));
        };
        if add.required_count < 2 {
            return Err(HandlerError::bad_input("Required count must be at least 2"));
        }
        let max_count = ctx.services.config.matchmaker.max_count;
        if add.required_count > max_count {
            return Err(HandlerError::bad_input(format!(
                "Required count must be at most {max_count}"
            )));
        }

        let outcome = ctx
            .services
            .matchmaker
            .add(ctx.session.presence(), add.required_count);

        // The ticket reply must reach the caller before any matched event.
        let ticket = Payload::MatchmakeTicket(MatchmakeTicket {
            ticket: outcome.ticket.to_string(),
        });
        if let Err(e) = ctx.session.send(Envelope::reply(ctx.collation_id, ticket)) {
            warn!(error = %e, "failed to send matchmake ticket");
        }

        if let Some(matched) = outcome.matched {
            Self::notify_matched(ctx, &matched)?;
        }
        Ok(Reply::Silent)
    }
}

pub struct MatchmakeRemoveHandler;

#[async_trait]
impl PayloadHandler for MatchmakeRemoveHandler {
    #[instrument(skip_all, fields(payload = "matchmake_remove"))]
    async fn handle(
        &self,
        ctx: &HandlerContext<'_>,
        payload: &Payload,
    ) -> Result<Reply, HandlerError> {
        let Payload::MatchmakeRemove(remove) = payload else {
            return Err(HandlerError::bad_input("Expected matchmake_remove"));
        };
        if remove.ticket.is_empty() {
            return Err(HandlerError::bad_input("Ticket is required"));
        }
        ctx.services
            .matchmaker
            .remove(ctx.session.id(), &TicketId::from_raw(remove.ticket.as_str()))
            .map_err(|_| HandlerError::bad_input("Ticket not found"))?;
        Ok(Reply::Ack)
    }
}
