//! Handler table: one handler per routable payload kind.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arcade_core::{ErrorCode, Payload, PayloadKind};
use async_trait::async_trait;

use super::context::HandlerContext;

/// What a handler wants sent back to the requesting session.
#[derive(Debug, PartialEq)]
pub enum Reply {
    /// Respond with this payload under the request's collation id.
    Payload(Payload),
    /// Respond with an empty envelope under the request's collation id.
    Ack,
    /// Send nothing.
    Silent,
}

/// Failure reported back to the client as an `error` payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct HandlerError {
    pub code: ErrorCode,
    pub message: String,
}

impl HandlerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadInput, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RuntimeException, message)
    }
}

/// Implemented by every domain handler.
#[async_trait]
pub trait PayloadHandler: Send + Sync {
    async fn handle(&self, ctx: &HandlerContext<'_>, payload: &Payload)
        -> Result<Reply, HandlerError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("no handler registered for: {}", join_kinds(.0))]
    MissingHandlers(Vec<PayloadKind>),
    #[error("more than one handler registered for: {}", join_kinds(.0))]
    DuplicateHandlers(Vec<PayloadKind>),
}

fn join_kinds(kinds: &[PayloadKind]) -> String {
    kinds
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Immutable map from payload kind to handler.
pub struct HandlerTable {
    handlers: HashMap<PayloadKind, Arc<dyn PayloadHandler>>,
}

impl HandlerTable {
    pub fn builder() -> HandlerTableBuilder {
        HandlerTableBuilder::default()
    }

    pub fn get(&self, kind: PayloadKind) -> Option<&Arc<dyn PayloadHandler>> {
        self.handlers.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().map(|k| k.as_str()).collect();
        kinds.sort_unstable();
        f.debug_struct("HandlerTable").field("kinds", &kinds).finish()
    }
}

/// Collects registrations; [`build`](Self::build) refuses an incomplete or
/// ambiguous table.
#[derive(Default)]
pub struct HandlerTableBuilder {
    handlers: HashMap<PayloadKind, Arc<dyn PayloadHandler>>,
    duplicates: Vec<PayloadKind>,
}

impl HandlerTableBuilder {
    pub fn register(mut self, kind: PayloadKind, handler: Arc<dyn PayloadHandler>) -> Self {
        if self.handlers.insert(kind, handler).is_some() {
            self.duplicates.push(kind);
        }
        self
    }

    /// Register one handler for several kinds.
    pub fn register_all(mut self, kinds: &[PayloadKind], handler: Arc<dyn PayloadHandler>) -> Self {
        for &kind in kinds {
            self = self.register(kind, Arc::clone(&handler));
        }
        self
    }

    pub fn build(self) -> Result<HandlerTable, DispatchError> {
        if !self.duplicates.is_empty() {
            let mut duplicates = self.duplicates;
            duplicates.sort_unstable();
            duplicates.dedup();
            return Err(DispatchError::DuplicateHandlers(duplicates));
        }
        let missing: Vec<PayloadKind> = PayloadKind::ALL
            .iter()
            .copied()
            .filter(|k| !self.handlers.contains_key(k))
            .collect();
        if !missing.is_empty() {
            return Err(DispatchError::MissingHandlers(missing));
        }
        Ok(HandlerTable {
            handlers: self.handlers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl PayloadHandler for Noop {
        async fn handle(
            &self,
            _ctx: &HandlerContext<'_>,
            _payload: &Payload,
        ) -> Result<Reply, HandlerError> {
            Ok(Reply::Silent)
        }
    }

    #[test]
    fn complete_table_builds() {
        let table = HandlerTable::builder()
            .register_all(PayloadKind::ALL, Arc::new(Noop))
            .build()
            .unwrap();
        assert_eq!(table.len(), PayloadKind::ALL.len());
        assert!(table.get(PayloadKind::TopicJoin).is_some());
    }

    #[test]
    fn missing_kinds_are_reported() {
        let err = HandlerTable::builder()
            .register(PayloadKind::Link, Arc::new(Noop))
            .build()
            .unwrap_err();
        match err {
            DispatchError::MissingHandlers(kinds) => {
                assert_eq!(kinds.len(), PayloadKind::ALL.len() - 1);
                assert!(!kinds.contains(&PayloadKind::Link));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_registration_rejected() {
        let err = HandlerTable::builder()
            .register_all(PayloadKind::ALL, Arc::new(Noop))
            .register(PayloadKind::StorageWrite, Arc::new(Noop))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::DuplicateHandlers(vec![PayloadKind::StorageWrite])
        );
        assert!(err.to_string().contains("storage_write"));
    }

    #[test]
    fn handler_error_display() {
        let err = HandlerError::bad_input("no topic");
        assert_eq!(err.to_string(), "BAD_INPUT: no topic");
    }
}
