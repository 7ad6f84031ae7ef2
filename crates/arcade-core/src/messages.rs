//! Bodies of the payload variants.
//!
//! Requests are what clients send; the response and push types further down
//! are only ever produced by the server.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Shared ─────────────────────────────────────────────────────────────────

/// A user's presence on one session, as seen by other users.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserPresence {
    pub user_id: String,
    pub session_id: String,
    pub handle: String,
}

/// Kind of chat topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicKind {
    Direct,
    Room,
    Group,
}

/// Identifier of a chat topic.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicId {
    pub kind: TopicKind,
    pub id: String,
}

impl TopicId {
    pub fn room(name: impl Into<String>) -> Self {
        Self {
            kind: TopicKind::Room,
            id: name.into(),
        }
    }

    pub fn group(group_id: impl Into<String>) -> Self {
        Self {
            kind: TopicKind::Group,
            id: group_id.into(),
        }
    }

    /// Direct topic between two users; the id is the same whichever side asks.
    ///
    /// The lower id is length-prefixed, so user ids containing `:` cannot make
    /// two different pairs share a topic.
    pub fn direct(a: &str, b: &str) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self {
            kind: TopicKind::Direct,
            id: format!("{}:{lo}:{hi}", lo.len()),
        }
    }
}

/// Identity provider used when linking or unlinking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Email,
    Device,
    Custom,
    Facebook,
    Google,
    Steam,
}

/// Credential presented for linking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum Credential {
    Email { email: String, password: String },
    Device { id: String },
    Custom { id: String },
    Facebook { token: String },
    Google { token: String },
    Steam { token: String },
}

// ── Identity ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub credential: Credential,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unlink {
    pub provider: Provider,
    pub id: String,
}

// ── Self / users ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfUpdate {
    pub handle: Option<String>,
    pub fullname: Option<String>,
    pub timezone: Option<String>,
    pub location: Option<String>,
    pub lang: Option<String>,
    pub avatar_url: Option<String>,
    pub metadata: Option<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsersFetch {
    pub user_ids: Vec<String>,
    pub handles: Vec<String>,
}

// ── Friends ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FriendAdd {
    pub user_id: Option<String>,
    pub handle: Option<String>,
}

/// Target of `friend_remove` and `friend_block`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRef {
    pub user_id: String,
}

// ── Groups ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewGroup {
    pub name: String,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub lang: Option<String>,
    pub metadata: Option<Value>,
    pub private: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupCreate {
    pub groups: Vec<NewGroup>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupChanges {
    pub group_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub lang: Option<String>,
    pub metadata: Option<Value>,
    pub private: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupUpdate {
    pub groups: Vec<GroupChanges>,
}

/// A set of groups addressed by id; used by remove, join and leave.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupIds {
    pub group_ids: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupsFetch {
    pub group_ids: Vec<String>,
    pub names: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupsList {
    pub page_limit: Option<u32>,
    pub order_by_asc: bool,
    pub lang: Option<String>,
    pub cursor: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupUsersList {
    pub group_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupUserRef {
    pub group_id: String,
    pub user_id: String,
}

/// Membership changes; used by add, kick and promote.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupUsers {
    pub group_users: Vec<GroupUserRef>,
}

// ── Topics ─────────────────────────────────────────────────────────────────

/// What a client asks to join.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicTarget {
    UserId(String),
    Room(String),
    GroupId(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicJoin {
    pub joins: Vec<TopicTarget>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicLeave {
    pub topics: Vec<TopicId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopicMessageSend {
    pub topic: TopicId,
    pub data: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMessagesList {
    pub topic: TopicId,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub forward: bool,
    #[serde(default)]
    pub limit: Option<u32>,
}

// ── Matches ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTarget {
    MatchId(String),
    Token(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchJoin {
    pub matches: Vec<MatchTarget>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchLeave {
    pub match_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDataSend {
    pub match_id: String,
    /// Restrict delivery to these presences; empty means everyone else.
    #[serde(default)]
    pub presences: Vec<UserPresence>,
    pub op_code: i64,
    #[serde(default)]
    pub data: String,
}

// ── Matchmaking ────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchmakeAdd {
    pub required_count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchmakeRemove {
    pub ticket: String,
}

// ── Storage ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageKey {
    pub bucket: String,
    pub collection: String,
    pub record: String,
    /// Owner; defaults to the calling user.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Expected version for conditional removes.
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageFetch {
    pub keys: Vec<StorageKey>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorageWriteItem {
    pub bucket: String,
    pub collection: String,
    pub record: String,
    pub value: Value,
    /// Expected current version; `"*"` means the record must not exist yet.
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageWrite {
    pub data: Vec<StorageWriteItem>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageRemove {
    pub keys: Vec<StorageKey>,
}

// ── Leaderboards ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardsList {
    pub leaderboard_ids: Vec<String>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOp {
    Incr,
    Decr,
    Set,
    Best,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRecordSpec {
    pub leaderboard_id: String,
    pub op: ScoreOp,
    pub value: i64,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardRecordWrite {
    pub records: Vec<LeaderboardRecordSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardRecordsFetch {
    pub leaderboard_ids: Vec<String>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardRecordsList {
    pub leaderboard_id: String,
    pub owner_ids: Vec<String>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

// ── Server → client ────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicInfo {
    pub topic: TopicId,
    pub presences: Vec<UserPresence>,
    pub self_presence: UserPresence,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topics {
    pub topics: Vec<TopicInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMessageAck {
    pub message_id: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopicMessage {
    pub topic: TopicId,
    pub message_id: String,
    pub sender: UserPresence,
    pub data: Value,
    pub created_at: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicPresence {
    pub topic: TopicId,
    #[serde(default)]
    pub joins: Vec<UserPresence>,
    #[serde(default)]
    pub leaves: Vec<UserPresence>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchInfo {
    pub match_id: String,
    pub presences: Vec<UserPresence>,
    pub self_presence: UserPresence,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Matches {
    pub matches: Vec<MatchInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchData {
    pub match_id: String,
    pub presence: UserPresence,
    pub op_code: i64,
    pub data: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPresence {
    pub match_id: String,
    #[serde(default)]
    pub joins: Vec<UserPresence>,
    #[serde(default)]
    pub leaves: Vec<UserPresence>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchmakeTicket {
    pub ticket: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchmakeMatched {
    pub ticket: String,
    pub token: String,
    pub presences: Vec<UserPresence>,
    pub self_presence: UserPresence,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorageObject {
    pub bucket: String,
    pub collection: String,
    pub record: String,
    pub user_id: String,
    pub value: Value,
    pub version: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageData {
    pub data: Vec<StorageObject>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageKeyVersion {
    pub bucket: String,
    pub collection: String,
    pub record: String,
    pub user_id: String,
    pub version: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    pub keys: Vec<StorageKeyVersion>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn direct_topic_is_symmetric() {
        assert_eq!(TopicId::direct("bob", "alice"), TopicId::direct("alice", "bob"));
        assert_eq!(TopicId::direct("bob", "alice").id, "5:alice:bob");
    }

    #[test]
    fn direct_topic_ids_with_colons_stay_distinct() {
        assert_ne!(TopicId::direct("a:b", "c"), TopicId::direct("a", "b:c"));
    }

    #[test]
    fn credential_is_tagged_by_provider() {
        let link: Link = serde_json::from_value(json!({
            "credential": {"provider": "device", "id": "abc"}
        }))
        .unwrap();
        assert_eq!(link.credential, Credential::Device { id: "abc".into() });
    }

    #[test]
    fn topic_target_uses_field_name_as_tag() {
        let join: TopicJoin =
            serde_json::from_value(json!({"joins": [{"room": "lobby"}, {"user_id": "u2"}]}))
                .unwrap();
        assert_eq!(
            join.joins,
            vec![
                TopicTarget::Room("lobby".into()),
                TopicTarget::UserId("u2".into())
            ]
        );
    }

    #[test]
    fn optional_collections_default_to_empty() {
        let fetch: UsersFetch = serde_json::from_value(json!({})).unwrap();
        assert!(fetch.user_ids.is_empty());
        assert!(fetch.handles.is_empty());
    }

    #[test]
    fn match_data_send_defaults_presences() {
        let send: MatchDataSend =
            serde_json::from_value(json!({"match_id": "m1", "op_code": 3})).unwrap();
        assert!(send.presences.is_empty());
        assert!(send.data.is_empty());
    }
}
