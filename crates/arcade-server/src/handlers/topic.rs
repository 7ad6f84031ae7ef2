//! Chat topics: join, leave and realtime message fan-out.

use arcade_core::ids::{MessageId, SessionId};
use arcade_core::messages::{
    TopicId, TopicInfo, TopicKind, TopicMessage, TopicMessageAck, TopicTarget, Topics,
};
use arcade_core::{Envelope, Payload};
use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{announce_join, announce_leave};
use crate::pipeline::{HandlerContext, HandlerError, PayloadHandler, Reply};
use crate::presence::PresenceStream;

const MAX_ROOM_NAME_LEN: usize = 64;

/// Resolve a join target to the topic it names, from `user_id`'s side.
fn resolve_target(user_id: &str, target: &TopicTarget) -> Result<TopicId, HandlerError> {
    match target {
        TopicTarget::UserId(other) => {
            if other.is_empty() {
                return Err(HandlerError::bad_input("User ID is required"));
            }
            if other == user_id {
                return Err(HandlerError::bad_input("Cannot open a direct topic with self"));
            }
            Ok(TopicId::direct(user_id, other))
        }
        TopicTarget::Room(name) => {
            if name.is_empty() || name.chars().count() > MAX_ROOM_NAME_LEN {
                return Err(HandlerError::bad_input(format!(
                    "Room name must be 1-{MAX_ROOM_NAME_LEN} characters"
                )));
            }
            Ok(TopicId::room(name.as_str()))
        }
        TopicTarget::GroupId(group_id) => {
            if group_id.is_empty() {
                return Err(HandlerError::bad_input("Group ID is required"));
            }
            Ok(TopicId::group(group_id.as_str()))
        }
    }
}

fn validate_topic(topic: &TopicId) -> Result<(), HandlerError> {
    if topic.id.is_empty() {
        return Err(HandlerError::bad_input("Topic ID is required"));
    }
    if topic.kind == TopicKind::Room && topic.id.chars().count() > MAX_ROOM_NAME_LEN {
        return Err(HandlerError::bad_input("Invalid room topic"));
    }
    Ok(())
}

pub struct TopicJoinHandler;

#[async_trait]
impl PayloadHandler for TopicJoinHandler {
    #[instrument(skip_all, fields(payload = "topic_join"))]
    async fn handle(
        &self,
        ctx: &HandlerContext<'_>,
        payload: &Payload,
    ) -> Result<Reply, HandlerError> {
        let Payload::TopicJoin(join) = payload else {
            return Err(HandlerError::bad_input("Expected topic_join"));
        };
        if join.joins.is_empty() {
            return Err(HandlerError::bad_input("At least one item must be present"));
        }

        let user_id = ctx.session.user_id().as_str();
        let topics = join
            .joins
            .iter()
            .map(|target| resolve_target(user_id, target))
            .collect::<Result<Vec<_>, _>>()?;

        let self_presence = ctx.session.presence();
        let tracker = &ctx.services.tracker;
        let mut infos = Vec::with_capacity(topics.len());
        for topic in topics {
            let stream = PresenceStream::Topic(topic.clone());
            if tracker.track(stream.clone(), self_presence.clone()) {
                announce_join(ctx.services, &stream, &self_presence);
            }
            infos.push(TopicInfo {
                presences: tracker.list(&stream),
                topic,
                self_presence: self_presence.clone(),
            });
        }
        Ok(Reply::Payload(Payload::Topics(Topics { topics: infos })))
    }
}

pub struct TopicLeaveHandler;

#[async_trait]
impl PayloadHandler for TopicLeaveHandler {
    #[instrument(skip_all, fields(payload = "topic_leave"))]
    async fn handle(
        &self,
        ctx: &HandlerContext<'_>,
        payload: &Payload,
    ) -> Result<Reply, HandlerError> {
        let Payload::TopicLeave(leave) = payload else {
            return Err(HandlerError::bad_input("Expected topic_leave"));
        };
        if leave.topics.is_empty() {
            return Err(HandlerError::bad_input("At least one item must be present"));
        }
        for topic in &leave.topics {
            validate_topic(topic)?;
        }

        let session_id: &SessionId = ctx.session.id();
        for topic in &leave.topics {
            let stream = PresenceStream::Topic(topic.clone());
            if let Some(presence) = ctx.services.tracker.untrack(&stream, session_id) {
                announce_leave(ctx.services, &stream, &presence);
            }
        }
        Ok(Reply::Ack)
    }
}

pub struct TopicMessageSendHandler;

#[async_trait]
impl PayloadHandler for TopicMessageSendHandler {
    #[instrument(skip_all, fields(payload = "topic_message_send"))]
    async fn handle(
        &self,
        ctx: &HandlerContext<'_>,
        payload: &Payload,
    ) -> Result<Reply, HandlerError> {
        let Payload::TopicMessageSend(send) = payload else {
            return Err(HandlerError::bad_input("Expected topic_message_send"));
        };
        validate_topic(&send.topic)?;
        if !send.data.is_object() {
            return Err(HandlerError::bad_input("Data must be a JSON object"));
        }

        let stream = PresenceStream::Topic(send.topic.clone());
        if !ctx.services.tracker.is_tracked(&stream, ctx.session.id()) {
            return Err(HandlerError::bad_input("Must join topic before sending messages"));
        }

        let message_id = MessageId::new().to_string();
        let created_at = chrono::Utc::now().timestamp_millis();
        let message = TopicMessage {
            topic: send.topic.clone(),
            message_id: message_id.clone(),
            sender: ctx.session.presence(),
            data: send.data.clone(),
            created_at,
        };
        let recipients = ctx.services.tracker.list(&stream);
        let delivered = ctx.services.router.send(
            &recipients,
            &Envelope::push(Payload::TopicMessage(message)),
        );
        debug!(delivered, "topic message fanned out");

        Ok(Reply::Payload(Payload::TopicMessageAck(TopicMessageAck {
            message_id,
            created_at,
        })))
    }
}
