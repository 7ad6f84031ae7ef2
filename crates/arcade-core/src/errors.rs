//! Error codes carried in `Error` payloads.
//!
//! The first four codes belong to the message pipeline itself; the rest are
//! used by domain handlers. Numeric values match the wire protocol so that
//! clients may switch on either the name or the number.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a failure reported back to a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Pipeline
    /// A handler failed for reasons outside the client's control.
    RuntimeException,
    /// The payload is not one the server accepts from clients.
    UnrecognizedPayload,
    /// The envelope carried no payload at all.
    MissingPayload,
    /// The payload was understood but its contents are invalid.
    BadInput,

    // Accounts
    AuthError,
    UserNotFound,
    UserRegisterInuse,
    UserLinkInuse,
    UserLinkProviderUnavailable,
    UserUnlinkDisallowed,
    UserHandleInuse,

    // Domain
    GroupNameInuse,
    StorageRejected,
    MatchNotFound,
    RuntimeFunctionNotFound,
    RuntimeFunctionException,
}

impl ErrorCode {
    /// Numeric wire value.
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::RuntimeException => 0,
            Self::UnrecognizedPayload => 1,
            Self::MissingPayload => 2,
            Self::BadInput => 3,
            Self::AuthError => 4,
            Self::UserNotFound => 5,
            Self::UserRegisterInuse => 6,
            Self::UserLinkInuse => 7,
            Self::UserLinkProviderUnavailable => 8,
            Self::UserUnlinkDisallowed => 9,
            Self::UserHandleInuse => 10,
            Self::GroupNameInuse => 11,
            Self::StorageRejected => 12,
            Self::MatchNotFound => 13,
            Self::RuntimeFunctionNotFound => 14,
            Self::RuntimeFunctionException => 15,
        }
    }

    /// Name as it appears on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RuntimeException => "RUNTIME_EXCEPTION",
            Self::UnrecognizedPayload => "UNRECOGNIZED_PAYLOAD",
            Self::MissingPayload => "MISSING_PAYLOAD",
            Self::BadInput => "BAD_INPUT",
            Self::AuthError => "AUTH_ERROR",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::UserRegisterInuse => "USER_REGISTER_INUSE",
            Self::UserLinkInuse => "USER_LINK_INUSE",
            Self::UserLinkProviderUnavailable => "USER_LINK_PROVIDER_UNAVAILABLE",
            Self::UserUnlinkDisallowed => "USER_UNLINK_DISALLOWED",
            Self::UserHandleInuse => "USER_HANDLE_INUSE",
            Self::GroupNameInuse => "GROUP_NAME_INUSE",
            Self::StorageRejected => "STORAGE_REJECTED",
            Self::MatchNotFound => "MATCH_NOT_FOUND",
            Self::RuntimeFunctionNotFound => "RUNTIME_FUNCTION_NOT_FOUND",
            Self::RuntimeFunctionException => "RUNTIME_FUNCTION_EXCEPTION",
        }
    }

    /// Text used when a caller supplies an empty message.
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::RuntimeException => "Runtime exception",
            Self::UnrecognizedPayload => "Unrecognized payload",
            Self::MissingPayload => "No payload found",
            Self::BadInput => "Bad input",
            Self::AuthError => "Authentication failed",
            Self::UserNotFound => "User not found",
            Self::UserRegisterInuse => "Registration already in use",
            Self::UserLinkInuse => "Identity already linked",
            Self::UserLinkProviderUnavailable => "Identity provider unavailable",
            Self::UserUnlinkDisallowed => "Cannot unlink last identity",
            Self::UserHandleInuse => "Handle is in use",
            Self::GroupNameInuse => "Group name is in use",
            Self::StorageRejected => "Storage write rejected",
            Self::MatchNotFound => "Match not found",
            Self::RuntimeFunctionNotFound => "Runtime function not found",
            Self::RuntimeFunctionException => "Runtime function failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of an `Error` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorBody {
    /// Build a body, substituting the code's default text for an empty message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.is_empty() {
            code.default_message().to_owned()
        } else {
            message
        };
        Self { code, message }
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
