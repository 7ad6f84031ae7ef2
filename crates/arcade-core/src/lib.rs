//! Wire vocabulary shared by every part of the arcade server: envelopes, the
//! closed payload taxonomy, error codes and branded identifiers.

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod messages;

pub use envelope::{Envelope, Payload, PayloadKind, Route};
pub use errors::{ErrorBody, ErrorCode};
