//! Shared fixtures for handler and pipeline tests.

use std::sync::Arc;

use arcade_core::ids::UserId;
use arcade_core::{Envelope, ErrorCode, Payload};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::pipeline::{HandlerContext, HandlerError, Pipeline, Reply, Services};
use crate::session::Session;

pub fn make_services() -> Arc<Services> {
    Arc::new(Services::local(Arc::new(Config::default())))
}

/// Session for `user`, registered with the pipeline's registry.
pub fn make_session(pipeline: &Pipeline, user: &str) -> (Arc<Session>, mpsc::Receiver<Envelope>) {
    register_session(pipeline.services(), user)
}

pub fn register_session(
    services: &Services,
    user: &str,
) -> (Arc<Session>, mpsc::Receiver<Envelope>) {
    let (tx, rx) = mpsc::channel(64);
    let session = Arc::new(Session::new(UserId::from_raw(user), user, tx));
    services.registry.add(Arc::clone(&session));
    (session, rx)
}

pub fn ctx<'a>(services: &'a Services, session: &'a Arc<Session>) -> HandlerContext<'a> {
    HandlerContext {
        services,
        session,
        collation_id: "test",
    }
}

pub fn drain(rx: &mut mpsc::Receiver<Envelope>) -> Vec<Envelope> {
    let mut out = Vec::new();
    while let Ok(env) = rx.try_recv() {
        out.push(env);
    }
    out
}

/// Unwrap a `Reply::Payload`.
pub fn reply_payload(result: Result<Reply, HandlerError>) -> Payload {
    match result {
        Ok(Reply::Payload(payload)) => payload,
        other => panic!("expected payload reply, got {other:?}"),
    }
}

pub fn error_code(result: Result<Reply, HandlerError>) -> ErrorCode {
    match result {
        Err(err) => err.code,
        other => panic!("expected error, got {other:?}"),
    }
}
