//! Identifier newtypes.
//!
//! Ids the server mints carry a short prefix followed by a UUIDv7, so they sort
//! by creation time. User ids arrive from the transport and are kept verbatim.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an id received from elsewhere without checking it.
            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

macro_rules! minted_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        string_id!($(#[$meta])* $name);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Fresh, time-ordered id.
            pub fn new() -> Self {
                Self(format!("{}_{}", Self::PREFIX, Uuid::now_v7()))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

string_id!(
    /// Account a session belongs to, as asserted at connect time.
    UserId
);
minted_id!(
    /// One live connection.
    SessionId,
    "sess"
);
minted_id!(MatchId, "match");
minted_id!(
    /// A matchmaking request waiting in a pool.
    TicketId,
    "ticket"
);
minted_id!(MessageId, "msg");
