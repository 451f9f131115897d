//! Shared harness: a real server on a random port over a temp data dir.

#![allow(dead_code)]

use futures_util::StreamExt;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use trivia_server::config::Config;
use trivia_server::db::{init_db, sessions::SqliteSessionStore};
use trivia_server::game::{bank::QuestionBank, registry::SessionRegistry};
use trivia_server::routes::build_router;
use trivia_server::state::AppState;

pub type WsRead = futures_util::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

/// Start the server on a random port and return (base_url, addr).
pub async fn start_test_server() -> (String, SocketAddr) {
    start_test_server_with(|_| {}).await
}

/// Like `start_test_server`, with `configure` applied to the default config.
pub async fn start_test_server_with(configure: impl FnOnce(&mut Config)) -> (String, SocketAddr) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = init_db(&data_dir).expect("Failed to init DB");
    let registry = Arc::new(
        SessionRegistry::restore(Arc::new(SqliteSessionStore::new(db)))
            .expect("Failed to restore games"),
    );
    let questions = Arc::new(QuestionBank::open(&data_dir).expect("Failed to open question bank"));

    let mut config = Config {
        data_dir: data_dir.clone(),
        ..Config::default()
    };
    configure(&mut config);
    let state = AppState::new(registry, questions, &config);

    let app = build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        let _keep = tmp_dir;
    });

    (format!("http://{}", addr), addr)
}

pub fn two_plus_two() -> Value {
    json!({
        "text": "2+2?",
        "options": ["3", "4", "5", "6"],
        "type": "single",
        "correct": "4"
    })
}

pub async fn add_question(client: &reqwest::Client, base_url: &str, question: Value) -> Value {
    let resp = client
        .post(format!("{}/api/admin/questions", base_url))
        .json(&question)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

/// Create a game and return its id.
pub async fn create_game(client: &reqwest::Client, base_url: &str, name: &str) -> String {
    let resp = client
        .post(format!("{}/api/admin/games", base_url))
        .json(&json!({ "name": name }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

/// Join over HTTP and return the player id.
pub async fn join(client: &reqwest::Client, base_url: &str, game_id: &str, name: &str) -> String {
    let resp = client
        .post(format!("{}/api/games/{}/join", base_url, game_id))
        .json(&json!({ "name": name }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    body["playerId"].as_str().unwrap().to_string()
}

pub async fn post_admin(
    client: &reqwest::Client,
    base_url: &str,
    game_id: &str,
    action: &str,
) -> reqwest::Response {
    client
        .post(format!("{}/api/admin/games/{}/{}", base_url, game_id, action))
        .send()
        .await
        .unwrap()
}

/// Read frames until a JSON event of `kind` arrives. Panics after 5 seconds.
pub async fn next_event(read: &mut WsRead, kind: &str) -> Value {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let msg = tokio::time::timeout_at(deadline, read.next())
            .await
            .unwrap_or_else(|_| panic!("Timed out waiting for {}", kind))
            .expect("Stream ended")
            .expect("WebSocket error");
        if let Message::Text(text) = msg {
            let event: Value = serde_json::from_str(text.as_str()).unwrap();
            if event["kind"] == kind {
                return event;
            }
        }
    }
}

/// Read frames until the server closes and return the close code.
pub async fn close_code(read: &mut WsRead) -> u16 {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), read.next())
            .await
            .expect("Timed out waiting for close");
        match msg {
            Some(Ok(Message::Close(Some(frame)))) => return u16::from(frame.code),
            Some(Ok(_)) => continue,
            other => panic!("Expected close frame, got {:?}", other),
        }
    }
}

/// Forward the `kind` of every JSON event on `read` into a channel until the
/// stream ends. Keeps the socket drained.
pub fn collect_kinds(mut read: WsRead) -> tokio::sync::mpsc::UnboundedReceiver<String> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(Ok(msg)) = read.next().await {
            if let Message::Text(text) = msg {
                let event: Value = serde_json::from_str(text.as_str()).unwrap();
                if let Some(kind) = event["kind"].as_str() {
                    if tx.send(kind.to_string()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

/// Count `kind` events arriving on `rx` within `window`.
pub async fn count_kind(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<String>,
    kind: &str,
    window: Duration,
) -> usize {
    let deadline = tokio::time::Instant::now() + window;
    let mut count = 0;
    while let Ok(Some(seen)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        if seen == kind {
            count += 1;
        }
    }
    count
}
