//! Envelope dispatch.
//!
//! [`Pipeline::process`] takes one decoded envelope from one session and does
//! exactly one of: reply `MISSING_PAYLOAD`, tear the session down on logout,
//! reply `UNRECOGNIZED_PAYLOAD`, or run the single handler registered for the
//! payload's kind.

pub mod context;
pub mod table;

pub use context::{HandlerContext, Services};
pub use table::{DispatchError, HandlerError, HandlerTable, PayloadHandler, Reply};

use std::sync::Arc;

use arcade_core::{Envelope, ErrorCode, Payload, PayloadKind, Route};
use tracing::{debug, error, info, instrument, warn};

use crate::handlers;
use crate::session::Session;

pub struct Pipeline {
    services: Arc<Services>,
    handlers: HandlerTable,
}

impl Pipeline {
    pub fn new(services: Arc<Services>, handlers: HandlerTable) -> Self {
        Self { services, handlers }
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    /// Dispatch one envelope received from `session`.
    ///
    /// Callers must not invoke this concurrently for the same session.
    #[instrument(
        skip_all,
        fields(
            session_id = %session.id(),
            user_id = %session.user_id(),
            collation_id = %envelope.collation_id,
        )
    )]
    pub async fn process(&self, session: &Arc<Session>, envelope: Envelope) {
        debug!(
            payload = envelope.payload.as_ref().map_or("none", Payload::name),
            "received message"
        );

        let Some(payload) = envelope.payload.as_ref() else {
            self.send(
                session,
                Envelope::error(
                    envelope.collation_id.as_str(),
                    ErrorCode::MissingPayload,
                    "No payload found",
                ),
            );
            return;
        };

        match payload.route() {
            Route::Logout => self.logout(session),
            Route::Handler(kind) => {
                self.invoke(kind, session, &envelope.collation_id, payload)
                    .await;
            }
            Route::Unrecognized(tag) => {
                debug!(payload = tag, "rejecting unrecognized payload");
                self.send(
                    session,
                    Envelope::error(
                        envelope.collation_id.as_str(),
                        ErrorCode::UnrecognizedPayload,
                        "Unrecognized payload",
                    ),
                );
            }
        }
    }

    /// Deregister first so nothing new is routed to the session, then close
    /// the transport. No reply is sent.
    fn logout(&self, session: &Session) {
        let removed = self.services.registry.remove(session);
        let closed = session.close();
        info!(removed, closed, "session logged out");
    }

    async fn invoke(
        &self,
        kind: PayloadKind,
        session: &Arc<Session>,
        collation_id: &str,
        payload: &Payload,
    ) {
        let Some(handler) = self.handlers.get(kind) else {
            // Unreachable for a table that passed `build`.
            error!(payload = kind.as_str(), "no handler registered");
            self.send(
                session,
                Envelope::error(collation_id, ErrorCode::UnrecognizedPayload, ""),
            );
            return;
        };

        let ctx = HandlerContext {
            services: &self.services,
            session,
            collation_id,
        };
        let reply = match handler.handle(&ctx, payload).await {
            Ok(Reply::Payload(payload)) => Envelope::reply(collation_id, payload),
            Ok(Reply::Ack) => Envelope::ack(collation_id),
            Ok(Reply::Silent) => return,
            Err(err) => {
                debug!(payload = kind.as_str(), error = %err, "handler rejected request");
                Envelope::error(collation_id, err.code, err.message)
            }
        };
        self.send(session, reply);
    }

    /// Release everything a session holds once its transport is gone.
    ///
    /// Safe to call after a logout already removed and closed the session.
    #[instrument(skip_all, fields(session_id = %session.id()))]
    pub fn cleanup(&self, session: &Session) {
        let _ = self.services.registry.remove(session);
        let _ = session.close();

        let left = self.services.tracker.untrack_all(session.id());
        for (stream, presence) in &left {
            handlers::announce_leave(&self.services, stream, presence);
        }
        let tickets = self.services.matchmaker.remove_all(session.id());
        debug!(streams = left.len(), tickets, "session cleaned up");
    }

    fn send(&self, session: &Session, envelope: Envelope) {
        if let Err(e) = session.send(envelope) {
            warn!(error = %e, "failed to send reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_helpers::{drain, make_services, make_session};
    use arcade_core::messages::TopicId;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Records which kind it was invoked for.
    struct Recorder {
        kind: PayloadKind,
        calls: Arc<Mutex<Vec<PayloadKind>>>,
    }

    #[async_trait]
    impl PayloadHandler for Recorder {
        async fn handle(
            &self,
            _ctx: &HandlerContext<'_>,
            _payload: &Payload,
        ) -> Result<Reply, HandlerError> {
            self.calls.lock().push(self.kind);
            Ok(Reply::Ack)
        }
    }

    fn recording_pipeline() -> (Pipeline, Arc<Mutex<Vec<PayloadKind>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut builder = HandlerTable::builder();
        for &kind in PayloadKind::ALL {
            builder = builder.register(
                kind,
                Arc::new(Recorder {
                    kind,
                    calls: Arc::clone(&calls),
                }),
            );
        }
        let pipeline = Pipeline::new(make_services(), builder.build().unwrap());
        (pipeline, calls)
    }

    /// Smallest valid payload of each kind.
    fn sample(kind: PayloadKind) -> Payload {
        use PayloadKind as K;
        let extra = match kind {
            K::Link => json!({"credential": {"provider": "device", "id": "d1"}}),
            K::Unlink => json!({"provider": "device", "id": "d1"}),
            K::FriendRemove | K::FriendBlock => json!({"user_id": "u2"}),
            K::GroupUsersList => json!({"group_id": "g1"}),
            K::TopicMessageSend => json!({"topic": {"kind": "room", "id": "r"}, "data": {}}),
            K::TopicMessagesList => json!({"topic": {"kind": "room", "id": "r"}}),
            K::MatchDataSend => json!({"match_id": "m1", "op_code": 1}),
            K::MatchmakeAdd => json!({"required_count": 2}),
            K::MatchmakeRemove => json!({"ticket": "t1"}),
            K::SelfFetch
            | K::SelfUpdate
            | K::UsersFetch
            | K::FriendAdd
            | K::FriendsList
            | K::GroupCreate
            | K::GroupUpdate
            | K::GroupRemove
            | K::GroupsFetch
            | K::GroupsList
            | K::GroupsSelfList
            | K::GroupJoin
            | K::GroupLeave
            | K::GroupUserAdd
            | K::GroupUserKick
            | K::GroupUserPromote
            | K::TopicJoin
            | K::TopicLeave
            | K::MatchCreate
            | K::MatchJoin
            | K::MatchLeave
            | K::StorageFetch
            | K::StorageWrite
            | K::StorageRemove
            | K::LeaderboardsList
            | K::LeaderboardRecordWrite
            | K::LeaderboardRecordsFetch
            | K::LeaderboardRecordsList => json!({}),
        };
        let mut value = extra;
        value["type"] = json!(kind.as_str());
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn every_kind_invokes_exactly_its_handler() {
        let (pipeline, calls) = recording_pipeline();
        let (session, mut rx) = make_session(&pipeline, "u1");

        for &kind in PayloadKind::ALL {
            calls.lock().clear();
            let payload = sample(kind);
            assert_eq!(payload.route(), Route::Handler(kind));
            pipeline
                .process(&session, Envelope::reply(kind.as_str(), payload))
                .await;
            assert_eq!(*calls.lock(), vec![kind], "wrong handler for {kind}");

            let replies = drain(&mut rx);
            assert_eq!(replies.len(), 1);
            assert_eq!(replies[0].collation_id, kind.as_str());
            assert!(replies[0].payload.is_none());
        }
    }

    #[tokio::test]
    async fn missing_payload_gets_error_and_no_handler() {
        let (pipeline, calls) = recording_pipeline();
        let (session, mut rx) = make_session(&pipeline, "u1");

        pipeline.process(&session, Envelope::ack("abc123")).await;

        let replies = drain(&mut rx);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].collation_id, "abc123");
        let body = replies[0].error_body().unwrap();
        assert_eq!(body.code, ErrorCode::MissingPayload);
        assert_eq!(body.message, "No payload found");
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn unknown_payload_gets_unrecognized() {
        let (pipeline, calls) = recording_pipeline();
        let (session, mut rx) = make_session(&pipeline, "u1");

        let envelope: Envelope = serde_json::from_value(json!({
            "collation_id": "xyz",
            "payload": {"type": "rpc_call"}
        }))
        .unwrap();
        pipeline.process(&session, envelope).await;

        let replies = drain(&mut rx);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].collation_id, "xyz");
        let body = replies[0].error_body().unwrap();
        assert_eq!(body.code, ErrorCode::UnrecognizedPayload);
        assert_eq!(body.message, "Unrecognized payload");
        assert!(calls.lock().is_empty());
        assert!(!session.is_closed());
    }

    #[tokio::test]
    async fn server_only_payload_gets_unrecognized() {
        let (pipeline, calls) = recording_pipeline();
        let (session, mut rx) = make_session(&pipeline, "u1");

        let envelope = Envelope::reply(
            "srv",
            Payload::TopicPresence(arcade_core::messages::TopicPresence {
                topic: TopicId::room("lobby"),
                joins: vec![],
                leaves: vec![],
            }),
        );
        pipeline.process(&session, envelope).await;

        let replies = drain(&mut rx);
        assert_eq!(
            replies[0].error_body().unwrap().code,
            ErrorCode::UnrecognizedPayload
        );
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn logout_removes_then_closes_without_reply() {
        let (pipeline, calls) = recording_pipeline();
        let (session, mut rx) = make_session(&pipeline, "u1");
        assert!(pipeline.services().registry.contains(session.id()));

        pipeline
            .process(&session, Envelope::reply("q1", Payload::Logout))
            .await;

        assert!(!pipeline.services().registry.contains(session.id()));
        assert!(session.is_closed());
        assert!(drain(&mut rx).is_empty());
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn logout_twice_is_harmless() {
        let (pipeline, _calls) = recording_pipeline();
        let (session, _rx) = make_session(&pipeline, "u1");
        pipeline
            .process(&session, Envelope::reply("a", Payload::Logout))
            .await;
        pipeline
            .process(&session, Envelope::reply("b", Payload::Logout))
            .await;
        pipeline.cleanup(&session);
        assert!(session.is_closed());
        assert_eq!(pipeline.services().registry.count(), 0);
    }

    #[tokio::test]
    async fn handler_error_keeps_collation_id() {
        struct Failing;

        #[async_trait]
        impl PayloadHandler for Failing {
            async fn handle(
                &self,
                _ctx: &HandlerContext<'_>,
                _payload: &Payload,
            ) -> Result<Reply, HandlerError> {
                Err(HandlerError::new(ErrorCode::MatchNotFound, "no such match"))
            }
        }

        let table = HandlerTable::builder()
            .register_all(PayloadKind::ALL, Arc::new(Failing))
            .build()
            .unwrap();
        let pipeline = Pipeline::new(make_services(), table);
        let (session, mut rx) = make_session(&pipeline, "u1");

        pipeline
            .process(&session, Envelope::reply("m-7", Payload::MatchCreate))
            .await;

        let replies = drain(&mut rx);
        assert_eq!(replies[0].collation_id, "m-7");
        assert_eq!(
            replies[0].error_body().unwrap().code,
            ErrorCode::MatchNotFound
        );
    }

    #[tokio::test]
    async fn reply_to_closed_session_is_dropped_quietly() {
        let (pipeline, _calls) = recording_pipeline();
        let (session, mut rx) = make_session(&pipeline, "u1");
        let _ = session.close();
        pipeline.process(&session, Envelope::ack("late")).await;
        assert!(drain(&mut rx).is_empty());
    }

    /// Log sink shared between a test and its subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn missing_payload_is_still_logged() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (pipeline, _calls) = recording_pipeline();
        let (session, _rx) = make_session(&pipeline, "u1");
        pipeline.process(&session, Envelope::ack("abc123")).await;

        let out = logs.contents();
        assert!(out.contains("received message"), "logs: {out}");
        assert!(out.contains("none"), "logs: {out}");
    }

    #[tokio::test]
    async fn oversized_matchmake_count_is_bad_input() {
        let pipeline = Pipeline::new(make_services(), handlers::build_table().unwrap());
        let (session, mut rx) = make_session(&pipeline, "alice");
        let add = Payload::MatchmakeAdd(arcade_core::messages::MatchmakeAdd {
            required_count: u32::MAX,
        });
        pipeline.process(&session, Envelope::reply("big", add)).await;

        let replies = drain(&mut rx);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].collation_id, "big");
        assert_eq!(replies[0].error_body().unwrap().code, ErrorCode::BadInput);
    }
}
