//! Operations that need a persistent backend this server does not run.

use arcade_core::{Payload, PayloadKind};
use async_trait::async_trait;
use tracing::debug;

use crate::pipeline::{HandlerContext, HandlerError, PayloadHandler, Reply};

/// Kinds answered by [`UnavailableHandler`].
pub const KINDS: &[PayloadKind] = &[
    PayloadKind::Link,
    PayloadKind::Unlink,
    PayloadKind::SelfFetch,
    PayloadKind::SelfUpdate,
    PayloadKind::UsersFetch,
    PayloadKind::FriendAdd,
    PayloadKind::FriendRemove,
    PayloadKind::FriendBlock,
    PayloadKind::FriendsList,
    PayloadKind::GroupCreate,
    PayloadKind::GroupUpdate,
    PayloadKind::GroupRemove,
    PayloadKind::GroupsFetch,
    PayloadKind::GroupsList,
    PayloadKind::GroupsSelfList,
    PayloadKind::GroupUsersList,
    PayloadKind::GroupJoin,
    PayloadKind::GroupLeave,
    PayloadKind::GroupUserAdd,
    PayloadKind::GroupUserKick,
    PayloadKind::GroupUserPromote,
    PayloadKind::TopicMessagesList,
    PayloadKind::LeaderboardsList,
    PayloadKind::LeaderboardRecordWrite,
    PayloadKind::LeaderboardRecordsFetch,
    PayloadKind::LeaderboardRecordsList,
];

/// Answers `RUNTIME_EXCEPTION` naming the requested operation.
pub struct UnavailableHandler;

#[async_trait]
impl PayloadHandler for UnavailableHandler {
    async fn handle(
        &self,
        _ctx: &HandlerContext<'_>,
        payload: &Payload,
    ) -> Result<Reply, HandlerError> {
        let name = payload.name();
        debug!(payload = name, "operation not available");
        Err(HandlerError::runtime(format!(
            "'{name}' is not available on this server"
        )))
    }
}
