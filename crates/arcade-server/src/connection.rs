//! One WebSocket connection: a writer task draining the session's outbound
//! queue and a reader loop feeding the pipeline in arrival order.

use std::sync::Arc;
use std::time::Duration;

use arcade_core::Envelope;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::pipeline::Pipeline;
use crate::session::Session;

/// How long the writer gets to flush after the reader has stopped.
const WRITER_GRACE: Duration = Duration::from_secs(5);

/// Decode one frame into an envelope.
///
/// On failure returns the `BAD_INPUT` reply to send instead, carrying the
/// frame's collation id when one could still be read.
pub fn decode_frame(text: &str) -> Result<Envelope, Envelope> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| Envelope::bad_input("", format!("Could not decode message: {e}")))?;
    let collation_id = value
        .get("collation_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    serde_json::from_value(value)
        .map_err(|e| Envelope::bad_input(collation_id, format!("Could not decode message: {e}")))
}

/// Drive a connection until either side goes away, then release the session.
pub async fn run(
    socket: WebSocket,
    session: Arc<Session>,
    rx: mpsc::Receiver<Envelope>,
    pipeline: Arc<Pipeline>,
) {
    let (ws_tx, mut ws_rx) = socket.split();
    let ping_interval = Duration::from_millis(pipeline.services().config.socket.ping_interval_ms);
    info!(session_id = %session.id(), user_id = %session.user_id(), "session connected");

    let writer = tokio::spawn(write_loop(ws_tx, rx, Arc::clone(&session), ping_interval));

    loop {
        let frame = tokio::select! {
            _ = session.closed() => break,
            frame = ws_rx.next() => frame,
        };
        let text = match frame {
            Some(Ok(Message::Text(text))) => text.to_string(),
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    let reply = Envelope::bad_input("", "Binary frames must be UTF-8 JSON");
                    let _ = session.send(reply);
                    continue;
                }
            },
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Err(e)) => {
                debug!(session_id = %session.id(), error = %e, "websocket read failed");
                break;
            }
        };

        match decode_frame(&text) {
            Ok(envelope) => pipeline.process(&session, envelope).await,
            Err(reply) => {
                debug!(session_id = %session.id(), "undecodable frame");
                if let Err(e) = session.send(reply) {
                    warn!(session_id = %session.id(), error = %e, "failed to send decode error");
                }
            }
        }
    }

    pipeline.cleanup(&session);
    if tokio::time::timeout(WRITER_GRACE, writer).await.is_err() {
        warn!(session_id = %session.id(), "writer did not stop in time");
    }
    info!(
        session_id = %session.id(),
        connected_secs = session.age().as_secs(),
        dropped = session.drop_count(),
        "session disconnected"
    );
}

async fn write_loop<S>(
    mut ws_tx: S,
    mut rx: mpsc::Receiver<Envelope>,
    session: Arc<Session>,
    ping_interval: Duration,
) where
    S: futures::Sink<Message> + Unpin,
{
    let mut ping = tokio::time::interval(ping_interval);
    ping.tick().await;

    loop {
        tokio::select! {
            msg = rx.recv() => {
                let Some(envelope) = msg else { break };
                let json = match serde_json::to_string(&envelope) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(session_id = %session.id(), error = %e, "failed to encode envelope");
                        continue;
                    }
                };
                if ws_tx.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            _ = ping.tick() => {
                if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
                trace!(session_id = %session.id(), "sent ping");
            }
            _ = session.closed() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
        }
    }

    // A failed write ends the session too.
    let _ = session.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcade_core::{ErrorCode, Payload};

    #[test]
    fn decodes_valid_frame() {
        let env =
            decode_frame(r#"{"collation_id":"c1","payload":{"type":"match_create"}}"#).unwrap();
        assert_eq!(env.collation_id, "c1");
        assert_eq!(env.payload, Some(Payload::MatchCreate));
    }

    #[test]
    fn non_json_is_bad_input_without_id() {
        let reply = decode_frame("not json").unwrap_err();
        assert_eq!(reply.collation_id, "");
        assert_eq!(reply.error_body().unwrap().code, ErrorCode::BadInput);
    }

    #[test]
    fn malformed_payload_keeps_collation_id() {
        let frame = r#"{"collation_id":"c9","payload":{"type":"matchmake_add"}}"#;
        let reply = decode_frame(frame).unwrap_err();
        assert_eq!(reply.collation_id, "c9");
        assert_eq!(reply.error_body().unwrap().code, ErrorCode::BadInput);
    }

    #[test]
    fn frame_without_payload_decodes() {
        let env = decode_frame(r#"{"collation_id":"abc123"}"#).unwrap();
        assert!(env.payload.is_none());
    }
}
