//! Realtime matches: relayed, server-untrusted multiplayer sessions.

use arcade_core::ids::MatchId;
use arcade_core::messages::{MatchData, MatchInfo, MatchTarget, Matches, UserPresence};
use arcade_core::{Envelope, ErrorCode, Payload};
use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{announce_join, announce_leave};
use crate::pipeline::{HandlerContext, HandlerError, PayloadHandler, Reply};
use crate::presence::PresenceStream;
use crate::token::{verify_match_token, TokenError};

fn match_not_found() -> HandlerError {
    HandlerError::new(ErrorCode::MatchNotFound, "Match not found")
}

pub struct MatchCreateHandler;

#[async_trait]
impl PayloadHandler for MatchCreateHandler {
    #[instrument(skip_all, fields(payload = "match_create"))]
    async fn handle(
        &self,
        ctx: &HandlerContext<'_>,
        _payload: &Payload,
    ) -> Result<Reply, HandlerError> {
        let match_id = MatchId::new();
        let self_presence = ctx.session.presence();
        let _ = ctx.services.tracker.track(
            PresenceStream::Match(match_id.clone()),
            self_presence.clone(),
        );
        debug!(match_id = %match_id, "match created");
        Ok(Reply::Payload(Payload::Match(MatchInfo {
            match_id: match_id.to_string(),
            presences: vec![self_presence.clone()],
            self_presence,
        })))
    }
}

pub struct MatchJoinHandler;

impl MatchJoinHandler {
    fn resolve(ctx: &HandlerContext<'_>, target: &MatchTarget) -> Result<MatchId, HandlerError> {
        match target {
            MatchTarget::MatchId(id) if id.is_empty() => {
                Err(HandlerError::bad_input("Match ID is required"))
            }
            MatchTarget::MatchId(id) => Ok(MatchId::from_raw(id.as_str())),
            MatchTarget::Token(token) => verify_match_token(ctx.services.hmac_secret(), token)
                .map_err(|e| match e {
                    TokenError::Expired => HandlerError::bad_input("Match token expired"),
                    TokenError::Invalid => HandlerError::bad_input("Invalid match token"),
                }),
        }
    }
}

#[async_trait]
impl PayloadHandler for MatchJoinHandler {
    #[instrument(skip_all, fields(payload = "match_join"))]
    async fn handle(
        &self,
        ctx: &HandlerContext<'_>,
        payload: &Payload,
    ) -> Result<Reply, HandlerError> {
        let Payload::MatchJoin(join) = payload else {
            return Err(HandlerError::bad_input("Expected match_join"));
        };
        if join.matches.is_empty() {
            return Err(HandlerError::bad_input("At least one item must be present"));
        }

        let mut targets = Vec::with_capacity(join.matches.len());
        for target in &join.matches {
            let match_id = Self::resolve(ctx, target)?;
            // Tokens name matches that start empty; ids must already be live.
            let stream = PresenceStream::Match(match_id.clone());
            if matches!(target, MatchTarget::MatchId(_))
                && ctx.services.tracker.list(&stream).is_empty()
            {
                return Err(match_not_found());
            }
            targets.push(match_id);
        }

        let self_presence = ctx.session.presence();
        let mut infos = Vec::with_capacity(targets.len());
        for match_id in targets {
            let stream = PresenceStream::Match(match_id.clone());
            if ctx.services.tracker.track(stream.clone(), self_presence.clone()) {
                announce_join(ctx.services, &stream, &self_presence);
            }
            infos.push(MatchInfo {
                match_id: match_id.to_string(),
                presences: ctx.services.tracker.list(&stream),
                self_presence: self_presence.clone(),
            });
        }
        Ok(Reply::Payload(Payload::Matches(Matches { matches: infos })))
    }
}

pub struct MatchLeaveHandler;

#[async_trait]
impl PayloadHandler for MatchLeaveHandler {
    #[instrument(skip_all, fields(payload = "match_leave"))]
    async fn handle(
        &self,
        ctx: &HandlerContext<'_>,
        payload: &Payload,
    ) -> Result<Reply, HandlerError> {
        let Payload::MatchLeave(leave) = payload else {
            return Err(HandlerError::bad_input("Expected match_leave"));
        };
        if leave.match_ids.is_empty() {
            return Err(HandlerError::bad_input("At least one item must be present"));
        }

        let streams: Vec<PresenceStream> = leave
            .match_ids
            .iter()
            .map(|id| PresenceStream::Match(MatchId::from_raw(id.as_str())))
            .collect();
        if streams
            .iter()
            .any(|s| !ctx.services.tracker.is_tracked(s, ctx.session.id()))
        {
            return Err(match_not_found());
        }

        for stream in &streams {
            if let Some(presence) = ctx.services.tracker.untrack(stream, ctx.session.id()) {
                announce_leave(ctx.services, stream, &presence);
            }
        }
        Ok(Reply::Ack)
    }
}

pub struct MatchDataSendHandler;

#[async_trait]
impl PayloadHandler for MatchDataSendHandler {
    async fn handle(
        &self,
        ctx: &HandlerContext<'_>,
        payload: &Payload,
    ) -> Result<Reply, HandlerError> {
        let Payload::MatchDataSend(send) = payload else {
            return Err(HandlerError::bad_input("Expected match_data_send"));
        };
        if send.match_id.is_empty() {
            return Err(HandlerError::bad_input("Match ID is required"));
        }

        let stream = PresenceStream::Match(MatchId::from_raw(send.match_id.as_str()));
        let sender = ctx.session.id().as_str();
        let members = ctx.services.tracker.list(&stream);
        if !members.iter().any(|p| p.session_id == sender) {
            // Data from non-members is dropped without a reply.
            return Ok(Reply::Silent);
        }

        let recipients: Vec<UserPresence> = members
            .into_iter()
            .filter(|p| p.session_id != sender)
            .filter(|p| send.presences.is_empty() || send.presences.contains(p))
            .collect();
        if recipients.is_empty() {
            return Ok(Reply::Silent);
        }

        let data = Payload::MatchData(MatchData {
            match_id: send.match_id.clone(),
            presence: ctx.session.presence(),
            op_code: send.op_code,
            data: send.data.clone(),
        });
        let _ = ctx.services.router.send(&recipients, &Envelope::push(data));
        Ok(Reply::Silent)
    }
}
