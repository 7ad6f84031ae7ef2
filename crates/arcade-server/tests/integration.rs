//! End-to-end tests over a real socket: boot the server on a free port and
//! talk to it with a WebSocket client.

use std::sync::Arc;
use std::time::Duration;

use arcade_server::{Config, ServerHandle};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn boot_server() -> ServerHandle {
    let mut config = Config::default();
    config.socket.port = 0;
    let pipeline = arcade_server::build_pipeline(Arc::new(config)).unwrap();
    arcade_server::start(Arc::new(pipeline)).await.unwrap()
}

async fn connect(server: &ServerHandle, user_id: &str) -> WsStream {
    let url = format!(
        "ws://127.0.0.1:{}/ws?user_id={user_id}&handle={user_id}",
        server.port
    );
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

async fn send_json(ws: &mut WsStream, value: Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

/// Read the next text message as JSON.
async fn read_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream closed")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Read messages until one carries a payload of `payload_type`.
async fn read_until_type(ws: &mut WsStream, payload_type: &str) -> Value {
    loop {
        let msg = read_json(ws).await;
        if msg["payload"]["type"] == payload_type {
            return msg;
        }
    }
}

/// Live session count from the health endpoint.
async fn session_count(server: &ServerHandle) -> u64 {
    let mut stream = TcpStream::connect(("127.0.0.1", server.port)).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    let (_, body) = response.split_once("\r\n\r\n").unwrap();
    let health: Value = serde_json::from_str(body).unwrap();
    health["sessions"].as_u64().unwrap()
}

#[tokio::test]
async fn e2e_missing_payload() {
    let server = boot_server().await;
    let mut ws = connect(&server, "u1").await;

    send_json(&mut ws, json!({"collation_id": "abc123"})).await;
    let reply = read_json(&mut ws).await;
    assert_eq!(reply["collation_id"], "abc123");
    assert_eq!(reply["payload"]["type"], "error");
    assert_eq!(reply["payload"]["code"], "MISSING_PAYLOAD");
    assert_eq!(reply["payload"]["message"], "No payload found");

    server.shutdown().await;
}

#[tokio::test]
async fn e2e_unknown_payload() {
    let server = boot_server().await;
    let mut ws = connect(&server, "u1").await;

    send_json(
        &mut ws,
        json!({"collation_id": "c7", "payload": {"type": "teleport"}}),
    )
    .await;
    let reply = read_json(&mut ws).await;
    assert_eq!(reply["collation_id"], "c7");
    assert_eq!(reply["payload"]["code"], "UNRECOGNIZED_PAYLOAD");

    server.shutdown().await;
}

#[tokio::test]
async fn e2e_bad_frame_is_bad_input() {
    let server = boot_server().await;
    let mut ws = connect(&server, "u1").await;

    ws.send(Message::text("{not json")).await.unwrap();
    let reply = read_json(&mut ws).await;
    assert_eq!(reply["collation_id"], "");
    assert_eq!(reply["payload"]["code"], "BAD_INPUT");

    // The connection survives a bad frame.
    send_json(&mut ws, json!({"collation_id": "after"})).await;
    let reply = read_json(&mut ws).await;
    assert_eq!(reply["collation_id"], "after");

    server.shutdown().await;
}

#[tokio::test]
async fn e2e_logout_closes_socket() {
    let server = boot_server().await;
    let mut ws = connect(&server, "u1").await;

    // Round trip first so the session is registered.
    send_json(&mut ws, json!({"collation_id": "warmup"})).await;
    let _ = read_json(&mut ws).await;
    assert_eq!(session_count(&server).await, 1);

    send_json(&mut ws, json!({"collation_id": "bye", "payload": {"type": "logout"}})).await;
    let closed = timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => panic!("unexpected reply after logout: {text}"),
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "socket was not closed after logout");

    let drained = timeout(TIMEOUT, async {
        while session_count(&server).await != 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(drained.is_ok(), "session still registered after logout");

    server.shutdown().await;
}

#[tokio::test]
async fn e2e_topic_message_between_clients() {
    let server = boot_server().await;
    let mut alice = connect(&server, "alice").await;
    let mut bob = connect(&server, "bob").await;

    for (ws, cid) in [(&mut alice, "ja"), (&mut bob, "jb")] {
        send_json(
            ws,
            json!({"collation_id": cid, "payload": {"type": "topic_join", "joins": [{"room": "lobby"}]}}),
        )
        .await;
        let reply = read_until_type(ws, "topics").await;
        assert_eq!(reply["collation_id"], cid);
    }

    send_json(
        &mut alice,
        json!({
            "collation_id": "m1",
            "payload": {
                "type": "topic_message_send",
                "topic": {"kind": "room", "id": "lobby"},
                "data": {"text": "hi"}
            }
        }),
    )
    .await;
    let ack = read_until_type(&mut alice, "topic_message_ack").await;
    assert_eq!(ack["collation_id"], "m1");

    let msg = read_until_type(&mut bob, "topic_message").await;
    assert_eq!(msg["collation_id"], "");
    assert_eq!(msg["payload"]["data"]["text"], "hi");
    assert_eq!(msg["payload"]["sender"]["user_id"], "alice");

    server.shutdown().await;
}

#[tokio::test]
async fn e2e_matchmake_then_join_by_token() {
    let server = boot_server().await;
    let mut alice = connect(&server, "alice").await;
    let mut bob = connect(&server, "bob").await;

    let add = |cid: &str| {
        json!({"collation_id": cid, "payload": {"type": "matchmake_add", "required_count": 2}})
    };
    send_json(&mut alice, add("ma")).await;
    let ticket = read_until_type(&mut alice, "matchmake_ticket").await;
    assert_eq!(ticket["collation_id"], "ma");

    send_json(&mut bob, add("mb")).await;
    let ticket = read_until_type(&mut bob, "matchmake_ticket").await;
    assert_eq!(ticket["collation_id"], "mb");

    let matched_alice = read_until_type(&mut alice, "matchmake_matched").await;
    let matched_bob = read_until_type(&mut bob, "matchmake_matched").await;
    let token = matched_alice["payload"]["token"].as_str().unwrap().to_owned();
    assert_eq!(matched_bob["payload"]["token"], token.as_str());
    assert_eq!(
        matched_alice["payload"]["presences"].as_array().unwrap().len(),
        2
    );

    send_json(
        &mut alice,
        json!({"collation_id": "j1", "payload": {"type": "match_join", "matches": [{"token": token}]}}),
    )
    .await;
    let joined = read_until_type(&mut alice, "matches").await;
    assert_eq!(joined["collation_id"], "j1");
    let match_id = joined["payload"]["matches"][0]["match_id"].as_str().unwrap();
    assert!(!match_id.is_empty());

    send_json(
        &mut bob,
        json!({"collation_id": "j2", "payload": {"type": "match_join", "matches": [{"token": "forged"}]}}),
    )
    .await;
    let rejected = read_until_type(&mut bob, "error").await;
    assert_eq!(rejected["collation_id"], "j2");
    assert_eq!(rejected["payload"]["code"], "BAD_INPUT");

    server.shutdown().await;
}
