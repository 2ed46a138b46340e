//! End-to-end tests using a real HTTP client and real WebSocket clients.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use relay_core::RoomId;
use relay_server::{Hub, ServerConfig};
use relay_settings::RelaySettings;
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct TestServer {
    http: String,
    ws: String,
    hub: Hub,
    client: reqwest::Client,
}

/// Boot a server on an ephemeral port with cheap password hashing.
async fn boot_server(config: ServerConfig) -> TestServer {
    let mut settings = RelaySettings::default();
    settings.auth.password_memory_kib = 1024;
    settings.auth.password_iterations = 1;
    let server = relay_server::build(&settings, config, None).unwrap();
    let (addr, _handle) = server.listen().await.unwrap();
    TestServer {
        http: format!("http://{addr}"),
        ws: format!("ws://{addr}/ws"),
        hub: server.hub().clone(),
        client: reqwest::Client::new(),
    }
}

impl TestServer {
    /// Register a user; returns `(token, user_id)`.
    async fn register(&self, username: &str) -> (String, u64) {
        let body: Value = self
            .client
            .post(format!("{}/api/register", self.http))
            .json(&json!({"username": username, "password": "secret1"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let token = body["data"]["token"].as_str().unwrap().to_string();
        let user_id = body["data"]["user"]["id"].as_u64().unwrap();
        (token, user_id)
    }

    async fn create_room(&self, token: &str, name: &str, is_private: bool) -> u64 {
        let body: Value = self
            .client
            .post(format!("{}/api/rooms", self.http))
            .header("Authorization", token)
            .json(&json!({"name": name, "is_private": is_private}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body["data"]["id"].as_u64().unwrap()
    }

    async fn connect(&self, room_id: u64, token: &str) -> WsStream {
        let url = format!("{}?roomId={room_id}&token={token}", self.ws);
        let (ws, _) = connect_async(url).await.unwrap();
        ws
    }

    async fn wait_for_count(&self, room_id: u64, expected: usize) {
        let room = RoomId::new(room_id);
        timeout(TIMEOUT, async {
            while self.hub.count(room) != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("room {room_id} never reached {expected} connections"));
    }
}

async fn send_json(ws: &mut WsStream, value: &Value) {
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

/// Read the next text message within `dur`, if any.
async fn try_read_json(ws: &mut WsStream, dur: Duration) -> Option<Value> {
    timeout(dur, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str::<Value>(&text).ok(),
                Some(Ok(_)) => {}
                None | Some(Err(_)) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Wait until the server closes the connection.
async fn wait_closed(ws: &mut WsStream) {
    timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                None | Some(Err(_) | Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .expect("connection was not closed");
}

// ── Fan-out ──

#[tokio::test]
async fn broadcast_reaches_only_the_senders_room() {
    let srv = boot_server(ServerConfig::default()).await;
    let (token_a, id_a) = srv.register("alice").await;
    let (token_b, _) = srv.register("bob").await;
    let (token_c, _) = srv.register("carol").await;
    let seven = srv.create_room(&token_a, "seven", false).await;
    let eight = srv.create_room(&token_a, "eight", false).await;

    let mut a = srv.connect(seven, &token_a).await;
    let mut b = srv.connect(seven, &token_b).await;
    let mut c = srv.connect(eight, &token_c).await;
    srv.wait_for_count(seven, 2).await;
    srv.wait_for_count(eight, 1).await;

    send_json(&mut a, &json!({"content": "hi"})).await;

    for ws in [&mut a, &mut b] {
        let msg = read_json(ws).await;
        assert_eq!(msg["type"], "message");
        assert_eq!(msg["room_id"], seven);
        assert_eq!(msg["sender_id"], id_a);
        assert_eq!(msg["username"], "alice");
        assert_eq!(msg["content"], "hi");
        assert!(msg["ts"].as_i64().unwrap() > 0);
    }
    assert!(try_read_json(&mut a, Duration::from_millis(200)).await.is_none());
    assert!(try_read_json(&mut b, Duration::from_millis(200)).await.is_none());
    assert!(try_read_json(&mut c, Duration::from_millis(200)).await.is_none());
}

#[tokio::test]
async fn messages_are_persisted_in_history() {
    let srv = boot_server(ServerConfig::default()).await;
    let (token, _) = srv.register("alice").await;
    let mut ws = srv.connect(1, &token).await;
    srv.wait_for_count(1, 1).await;

    for content in ["one", "two"] {
        send_json(&mut ws, &json!({"content": content})).await;
        let _ = read_json(&mut ws).await;
    }

    let body: Value = srv
        .client
        .get(format!("{}/api/messages?roomId=1&limit=10", srv.http))
        .header("Authorization", format!("Bearer {token}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let contents: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["one", "two"]);
}

// ── Control frames and validation ──

#[tokio::test]
async fn ping_gets_pong_and_nothing_is_persisted() {
    let srv = boot_server(ServerConfig::default()).await;
    let (token, _) = srv.register("alice").await;
    let mut ws = srv.connect(1, &token).await;
    srv.wait_for_count(1, 1).await;

    send_json(&mut ws, &json!({"type": "ping"})).await;
    assert_eq!(read_json(&mut ws).await, json!({"type": "pong"}));
    assert!(try_read_json(&mut ws, Duration::from_millis(200)).await.is_none());

    let body: Value = srv
        .client
        .get(format!("{}/api/messages?roomId=1", srv.http))
        .header("Authorization", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn rejected_content_leaves_connection_open() {
    let srv = boot_server(ServerConfig::default()).await;
    let (token, _) = srv.register("alice").await;
    let mut ws = srv.connect(1, &token).await;
    srv.wait_for_count(1, 1).await;

    send_json(&mut ws, &json!({"content": "x".repeat(1001)})).await;
    send_json(&mut ws, &json!({"content": ""})).await;
    ws.send(Message::text("not json")).await.unwrap();
    send_json(&mut ws, &json!({"content": "still here"})).await;

    let msg = read_json(&mut ws).await;
    assert_eq!(msg["content"], "still here");
    assert_eq!(srv.hub.count(RoomId::new(1)), 1);
}

// ── Teardown ──

#[tokio::test]
async fn deleting_a_room_disconnects_members_during_broadcasts() {
    let srv = boot_server(ServerConfig::default()).await;
    let (owner, _) = srv.register("owner").await;
    let (guest, _) = srv.register("guest").await;
    let room = srv.create_room(&owner, "doomed", false).await;

    let mut a = srv.connect(room, &owner).await;
    let mut b = srv.connect(room, &guest).await;
    srv.wait_for_count(room, 2).await;

    let chatter = tokio::spawn(async move {
        for i in 0..50 {
            if a.send(Message::text(json!({"content": format!("m{i}")}).to_string())).await.is_err() {
                break;
            }
        }
        wait_closed(&mut a).await;
    });

    let resp = srv
        .client
        .delete(format!("{}/api/rooms/{room}", srv.http))
        .header("Authorization", &owner)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    assert_eq!(srv.hub.count(RoomId::new(room)), 0);
    wait_closed(&mut b).await;
    chatter.await.unwrap();
    srv.wait_for_count(room, 0).await;
}

#[tokio::test]
async fn silent_connection_is_torn_down_after_read_timeout() {
    let config = ServerConfig {
        read_timeout_ms: 300,
        ping_interval_ms: 100,
        ..ServerConfig::default()
    };
    let srv = boot_server(config).await;
    let (token, _) = srv.register("alice").await;

    // Never read, so transport pings go unanswered.
    let _ws = srv.connect(1, &token).await;
    srv.wait_for_count(1, 1).await;
    srv.wait_for_count(1, 0).await;
}

#[tokio::test]
async fn client_close_unregisters() {
    let srv = boot_server(ServerConfig::default()).await;
    let (token, _) = srv.register("alice").await;
    let mut ws = srv.connect(1, &token).await;
    srv.wait_for_count(1, 1).await;
    ws.close(None).await.unwrap();
    srv.wait_for_count(1, 0).await;
}

// ── Upgrade checks ──

async fn upgrade_status(url: &str) -> u16 {
    match connect_async(url).await {
        Ok(_) => panic!("upgrade to {url} should have been refused"),
        Err(tungstenite::Error::Http(resp)) => resp.status().as_u16(),
        Err(e) => panic!("unexpected error: {e}"),
    }
}

#[tokio::test]
async fn upgrade_requires_token_and_access() {
    let srv = boot_server(ServerConfig::default()).await;
    let (owner, _) = srv.register("owner").await;
    let (guest, _) = srv.register("guest").await;
    let secret = srv.create_room(&owner, "secret", true).await;

    assert_eq!(upgrade_status(&format!("{}?roomId=1", srv.ws)).await, 400);
    assert_eq!(upgrade_status(&format!("{}?roomId=1&token=bogus", srv.ws)).await, 401);
    assert_eq!(upgrade_status(&format!("{}?roomId={secret}&token={guest}", srv.ws)).await, 403);
    assert_eq!(upgrade_status(&format!("{}?roomId=404&token={guest}", srv.ws)).await, 404);
    assert_eq!(srv.hub.total_connections(), 0);

    let _ws = srv.connect(secret, &owner).await;
    srv.wait_for_count(secret, 1).await;
}

#[tokio::test]
async fn health_reports_live_connections() {
    let srv = boot_server(ServerConfig::default()).await;
    let (token, _) = srv.register("alice").await;
    let _ws = srv.connect(1, &token).await;
    srv.wait_for_count(1, 1).await;

    let body: Value = srv
        .client
        .get(format!("{}/health", srv.http))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 1);
}
