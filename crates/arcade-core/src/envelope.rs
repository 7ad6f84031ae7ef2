//! The envelope: one correlation id plus at most one payload.
//!
//! `Payload` is a closed sum type. [`Payload::route`] matches every variant
//! without a wildcard arm, so a new variant does not compile until someone
//! decides how it is routed.

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorBody, ErrorCode};
use crate::messages::*;

/// Decoded unit of client/server communication.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Client-chosen token echoed on every response, errors included.
    #[serde(default)]
    pub collation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

impl Envelope {
    /// Envelope carrying `payload` under `collation_id`.
    pub fn reply(collation_id: impl Into<String>, payload: Payload) -> Self {
        Self {
            collation_id: collation_id.into(),
            payload: Some(payload),
        }
    }

    /// Payload-less acknowledgement of a request.
    pub fn ack(collation_id: impl Into<String>) -> Self {
        Self {
            collation_id: collation_id.into(),
            payload: None,
        }
    }

    /// Server-initiated message not tied to any request.
    pub fn push(payload: Payload) -> Self {
        Self::reply(String::new(), payload)
    }

    /// Error envelope. The collation id is kept as given; an empty message is
    /// replaced by the code's default text.
    pub fn error(
        collation_id: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self::reply(collation_id, Payload::Error(ErrorBody::new(code, message)))
    }

    pub fn runtime_exception(collation_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::error(collation_id, ErrorCode::RuntimeException, message)
    }

    pub fn bad_input(collation_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::error(collation_id, ErrorCode::BadInput, message)
    }

    /// The error body, if this is an error envelope.
    pub fn error_body(&self) -> Option<&ErrorBody> {
        match &self.payload {
            Some(Payload::Error(body)) => Some(body),
            _ => None,
        }
    }
}

macro_rules! payload_kinds {
    ($($kind:ident => $name:literal,)+) => {
        /// Payload variants that are forwarded to a handler.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum PayloadKind {
            $($kind,)+
        }

        impl PayloadKind {
            /// Every routable kind, in declaration order.
            pub const ALL: &'static [PayloadKind] = &[$(PayloadKind::$kind,)+];

            /// Wire tag of the kind.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(PayloadKind::$kind => $name,)+
                }
            }
        }
    };
}

payload_kinds! {
    Link => "link",
    Unlink => "unlink",
    SelfFetch => "self_fetch",
    SelfUpdate => "self_update",
    UsersFetch => "users_fetch",
    FriendAdd => "friend_add",
    FriendRemove => "friend_remove",
    FriendBlock => "friend_block",
    FriendsList => "friends_list",
    GroupCreate => "group_create",
    GroupUpdate => "group_update",
    GroupRemove => "group_remove",
    GroupsFetch => "groups_fetch",
    GroupsList => "groups_list",
    GroupsSelfList => "groups_self_list",
    GroupUsersList => "group_users_list",
    GroupJoin => "group_join",
    GroupLeave => "group_leave",
    GroupUserAdd => "group_user_add",
    GroupUserKick => "group_user_kick",
    GroupUserPromote => "group_user_promote",
    TopicJoin => "topic_join",
    TopicLeave => "topic_leave",
    TopicMessageSend => "topic_message_send",
    TopicMessagesList => "topic_messages_list",
    MatchCreate => "match_create",
    MatchJoin => "match_join",
    MatchLeave => "match_leave",
    MatchDataSend => "match_data_send",
    MatchmakeAdd => "matchmake_add",
    MatchmakeRemove => "matchmake_remove",
    StorageFetch => "storage_fetch",
    StorageWrite => "storage_write",
    StorageRemove => "storage_remove",
    LeaderboardsList => "leaderboards_list",
    LeaderboardRecordWrite => "leaderboard_record_write",
    LeaderboardRecordsFetch => "leaderboard_records_fetch",
    LeaderboardRecordsList => "leaderboard_records_list",
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the dispatcher sends a payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Forward to the handler registered for this kind.
    Handler(PayloadKind),
    /// Tear the session down.
    Logout,
    /// Not accepted from clients; carries the variant's wire tag.
    Unrecognized(&'static str),
}

/// Closed set of message kinds an envelope may carry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    // Session
    Logout,

    // Identity
    Link(Link),
    Unlink(Unlink),

    // Self / users
    SelfFetch,
    SelfUpdate(SelfUpdate),
    UsersFetch(UsersFetch),

    // Friends
    FriendAdd(FriendAdd),
    FriendRemove(FriendRef),
    FriendBlock(FriendRef),
    FriendsList,

    // Groups
    GroupCreate(GroupCreate),
    GroupUpdate(GroupUpdate),
    GroupRemove(GroupIds),
    GroupsFetch(GroupsFetch),
    GroupsList(GroupsList),
    GroupsSelfList,
    GroupUsersList(GroupUsersList),
    GroupJoin(GroupIds),
    GroupLeave(GroupIds),
    GroupUserAdd(GroupUsers),
    GroupUserKick(GroupUsers),
    GroupUserPromote(GroupUsers),

    // Topics
    TopicJoin(TopicJoin),
    TopicLeave(TopicLeave),
    TopicMessageSend(TopicMessageSend),
    TopicMessagesList(TopicMessagesList),

    // Matches
    MatchCreate,
    MatchJoin(MatchJoin),
    MatchLeave(MatchLeave),
    MatchDataSend(MatchDataSend),

    // Matchmaking
    MatchmakeAdd(MatchmakeAdd),
    MatchmakeRemove(MatchmakeRemove),

    // Storage
    StorageFetch(StorageFetch),
    StorageWrite(StorageWrite),
    StorageRemove(StorageRemove),

    // Leaderboards
    LeaderboardsList(LeaderboardsList),
    LeaderboardRecordWrite(LeaderboardRecordWrite),
    LeaderboardRecordsFetch(LeaderboardRecordsFetch),
    LeaderboardRecordsList(LeaderboardRecordsList),

    // Server → client
    Error(ErrorBody),
    Topics(Topics),
    TopicMessageAck(TopicMessageAck),
    TopicMessage(TopicMessage),
    TopicPresence(TopicPresence),
    Match(MatchInfo),
    Matches(Matches),
    MatchData(MatchData),
    MatchPresence(MatchPresence),
    MatchmakeTicket(MatchmakeTicket),
    MatchmakeMatched(MatchmakeMatched),
    StorageData(StorageData),
    StorageKeys(StorageKeys),

    /// Any tag this build does not know.
    #[serde(other)]
    Unrecognized,
}

impl Payload {
    /// Routing decision for this payload.
    pub fn route(&self) -> Route {
        use PayloadKind as K;
        match self {
            Self::Logout => Route::Logout,

            Self::Link(_) => Route::Handler(K::Link),
            Self::Unlink(_) => Route::Handler(K::Unlink),

            Self::SelfFetch => Route::Handler(K::SelfFetch),
            Self::SelfUpdate(_) => Route::Handler(K::SelfUpdate),
            Self::UsersFetch(_) => Route::Handler(K::UsersFetch),

            Self::FriendAdd(_) => Route::Handler(K::FriendAdd),
            Self::FriendRemove(_) => Route::Handler(K::FriendRemove),
            Self::FriendBlock(_) => Route::Handler(K::FriendBlock),
            Self::FriendsList => Route::Handler(K::FriendsList),

            Self::GroupCreate(_) => Route::Handler(K::GroupCreate),
            Self::GroupUpdate(_) => Route::Handler(K::GroupUpdate),
            Self::GroupRemove(_) => Route::Handler(K::GroupRemove),
            Self::GroupsFetch(_) => Route::Handler(K::GroupsFetch),
            Self::GroupsList(_) => Route::Handler(K::GroupsList),
            Self::GroupsSelfList => Route::Handler(K::GroupsSelfList),
            Self::GroupUsersList(_) => Route::Handler(K::GroupUsersList),
            Self::GroupJoin(_) => Route::Handler(K::GroupJoin),
            Self::GroupLeave(_) => Route::Handler(K::GroupLeave),
            Self::GroupUserAdd(_) => Route::Handler(K::GroupUserAdd),
            Self::GroupUserKick(_) => Route::Handler(K::GroupUserKick),
            Self::GroupUserPromote(_) => Route::Handler(K::GroupUserPromote),

            Self::TopicJoin(_) => Route::Handler(K::TopicJoin),
            Self::TopicLeave(_) => Route::Handler(K::TopicLeave),
            Self::TopicMessageSend(_) => Route::Handler(K::TopicMessageSend),
            Self::TopicMessagesList(_) => Route::Handler(K::TopicMessagesList),

            Self::MatchCreate => Route::Handler(K::MatchCreate),
            Self::MatchJoin(_) => Route::Handler(K::MatchJoin),
            Self::MatchLeave(_) => Route::Handler(K::MatchLeave),
            Self::MatchDataSend(_) => Route::Handler(K::MatchDataSend),

            Self::MatchmakeAdd(_) => Route::Handler(K::MatchmakeAdd),
            Self::MatchmakeRemove(_) => Route::Handler(K::MatchmakeRemove),

            Self::StorageFetch(_) => Route::Handler(K::StorageFetch),
            Self::StorageWrite(_) => Route::Handler(K::StorageWrite),
            Self::StorageRemove(_) => Route::Handler(K::StorageRemove),

            Self::LeaderboardsList(_) => Route::Handler(K::LeaderboardsList),
            Self::LeaderboardRecordWrite(_) => Route::Handler(K::LeaderboardRecordWrite),
            Self::LeaderboardRecordsFetch(_) => Route::Handler(K::LeaderboardRecordsFetch),
            Self::LeaderboardRecordsList(_) => Route::Handler(K::LeaderboardRecordsList),

            Self::Error(_) => Route::Unrecognized("error"),
            Self::Topics(_) => Route::Unrecognized("topics"),
            Self::TopicMessageAck(_) => Route::Unrecognized("topic_message_ack"),
            Self::TopicMessage(_) => Route::Unrecognized("topic_message"),
            Self::TopicPresence(_) => Route::Unrecognized("topic_presence"),
            Self::Match(_) => Route::Unrecognized("match"),
            Self::Matches(_) => Route::Unrecognized("matches"),
            Self::MatchData(_) => Route::Unrecognized("match_data"),
            Self::MatchPresence(_) => Route::Unrecognized("match_presence"),
            Self::MatchmakeTicket(_) => Route::Unrecognized("matchmake_ticket"),
            Self::MatchmakeMatched(_) => Route::Unrecognized("matchmake_matched"),
            Self::StorageData(_) => Route::Unrecognized("storage_data"),
            Self::StorageKeys(_) => Route::Unrecognized("storage_keys"),
            Self::Unrecognized => Route::Unrecognized("unrecognized"),
        }
    }

    /// Wire tag of the variant, for logging.
    pub fn name(&self) -> &'static str {
        match self.route() {
            Route::Handler(kind) => kind.as_str(),
            Route::Logout => "logout",
            Route::Unrecognized(name) => name,
        }
    }
}
