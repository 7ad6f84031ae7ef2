//! Payload handlers, one module per domain.

pub mod matches;
pub mod matchmaking;
pub mod storage;
pub mod topic;
pub mod unavailable;

#[cfg(test)]
pub(crate) mod test_helpers;

use std::sync::Arc;

use arcade_core::messages::{MatchPresence, TopicPresence, UserPresence};
use arcade_core::{Envelope, Payload, PayloadKind};

use crate::pipeline::{DispatchError, HandlerTable, Services};
use crate::presence::PresenceStream;

/// Table with every shipped handler registered.
pub fn build_table() -> Result<HandlerTable, DispatchError> {
    use PayloadKind as K;
    HandlerTable::builder()
        .register(K::TopicJoin, Arc::new(topic::TopicJoinHandler))
        .register(K::TopicLeave, Arc::new(topic::TopicLeaveHandler))
        .register(K::TopicMessageSend, Arc::new(topic::TopicMessageSendHandler))
        .register(K::MatchCreate, Arc::new(matches::MatchCreateHandler))
        .register(K::MatchJoin, Arc::new(matches::MatchJoinHandler))
        .register(K::MatchLeave, Arc::new(matches::MatchLeaveHandler))
        .register(K::MatchDataSend, Arc::new(matches::MatchDataSendHandler))
        .register(K::MatchmakeAdd, Arc::new(matchmaking::MatchmakeAddHandler))
        .register(K::MatchmakeRemove, Arc::new(matchmaking::MatchmakeRemoveHandler))
        .register(K::StorageFetch, Arc::new(storage::StorageFetchHandler))
        .register(K::StorageWrite, Arc::new(storage::StorageWriteHandler))
        .register(K::StorageRemove, Arc::new(storage::StorageRemoveHandler))
        .register_all(unavailable::KINDS, Arc::new(unavailable::UnavailableHandler))
        .build()
}

fn presence_event(
    stream: &PresenceStream,
    joins: Vec<UserPresence>,
    leaves: Vec<UserPresence>,
) -> Payload {
    match stream {
        PresenceStream::Topic(topic) => Payload::TopicPresence(TopicPresence {
            topic: topic.clone(),
            joins,
            leaves,
        }),
        PresenceStream::Match(match_id) => Payload::MatchPresence(MatchPresence {
            match_id: match_id.to_string(),
            joins,
            leaves,
        }),
    }
}

/// Tell everyone else on `stream` that `presence` arrived.
pub(crate) fn announce_join(services: &Services, stream: &PresenceStream, presence: &UserPresence) {
    let others: Vec<UserPresence> = services
        .tracker
        .list(stream)
        .into_iter()
        .filter(|p| p.session_id != presence.session_id)
        .collect();
    if others.is_empty() {
        return;
    }
    let event = presence_event(stream, vec![presence.clone()], Vec::new());
    let _ = services.router.send(&others, &Envelope::push(event));
}

/// Tell everyone still on `stream` that `presence` left.
pub(crate) fn announce_leave(
    services: &Services,
    stream: &PresenceStream,
    presence: &UserPresence,
) {
    let remaining = services.tracker.list(stream);
    if remaining.is_empty() {
        return;
    }
    let event = presence_event(stream, Vec::new(), vec![presence.clone()]);
    let _ = services.router.send(&remaining, &Envelope::push(event));
}
