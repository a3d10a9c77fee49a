//! Shared harness for the integration tests: a server on a random port with
//! its own temp data dir, plus WebSocket helpers that speak the JSON frames.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use social_server::config::RealtimeConfig;
use social_server::db::models::UserSummary;
use social_server::db::users::{self, NewUser};
use social_server::media::LocalMediaStorage;
use social_server::state::AppState;

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub const MEDIA_BASE_URL: &str = "https://media.test/";

/// How long to wait for an expected frame before failing the test.
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestServer {
    pub base_url: String,
    pub ws_url: String,
    pub state: AppState,
    pub media_root: std::path::PathBuf,
    // Keeps the data directory alive for the server's lifetime
    _data_dir: tempfile::TempDir,
}

pub struct TestUser {
    pub summary: UserSummary,
    pub token: String,
}

impl TestUser {
    pub fn id(&self) -> &str {
        &self.summary.id
    }
}

/// Start the server on a random port.
pub async fn start_test_server() -> TestServer {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = social_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = social_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let media_root = tmp_dir.path().join("media");
    std::fs::create_dir_all(&media_root).unwrap();
    let media = Arc::new(LocalMediaStorage::new(&media_root, MEDIA_BASE_URL));

    let state = AppState::new(db, jwt_secret, media, RealtimeConfig::default());
    let app = social_server::routes::build_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{}", addr),
        ws_url: format!("ws://{}/ws", addr),
        state,
        media_root,
        _data_dir: tmp_dir,
    }
}

impl TestServer {
    pub fn create_user(&self, username: &str, diamonds: i64) -> TestUser {
        self.create_account(NewUser {
            username: username.to_string(),
            full_name: Some(format!("{} Test", username)),
            diamonds,
            ..Default::default()
        })
    }

    pub fn create_admin(&self, username: &str) -> TestUser {
        self.create_account(NewUser {
            username: username.to_string(),
            is_admin: true,
            ..Default::default()
        })
    }

    fn create_account(&self, new: NewUser) -> TestUser {
        let summary = {
            let conn = self.state.db.lock().unwrap();
            users::create_user(&conn, &new).unwrap()
        };
        let token = social_server::auth::jwt::issue_access_token(
            &self.state.jwt_secret,
            &summary.id,
            new.is_admin,
        )
        .unwrap();
        TestUser { summary, token }
    }

    /// Open a socket with `?token=` and wait until the server has registered it.
    pub async fn connect(&self, user: &TestUser) -> WsStream {
        let previous = self.state.connections.lookup(user.id()).map(|h| h.id());
        let ws = self.connect_raw(Some(&user.token)).await;

        let registered = wait_until(|| {
            self.state
                .connections
                .lookup(user.id())
                .is_some_and(|h| Some(h.id()) != previous)
        })
        .await;
        assert!(registered, "connection for {} was never registered", user.summary.username);
        ws
    }

    pub async fn connect_raw(&self, token: Option<&str>) -> WsStream {
        let url = match token {
            Some(token) => format!("{}?token={}", self.ws_url, token),
            None => self.ws_url.clone(),
        };
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .expect("WebSocket handshake failed");
        ws
    }

    /// Wait for the server to drop a user's registry entry.
    pub async fn wait_offline(&self, user: &TestUser) {
        let gone = wait_until(|| self.state.connections.lookup(user.id()).is_none()).await;
        assert!(gone, "{} is still registered", user.summary.username);
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Poll a condition for up to the event timeout.
pub async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

/// Send a client event frame.
pub async fn send_event(ws: &mut WsStream, event: &str, data: Value) {
    let frame = serde_json::json!({ "event": event, "data": data });
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
}

/// Read frames until an event named `name` arrives; returns its `data`.
pub async fn expect_event(ws: &mut WsStream, name: &str) -> Value {
    let result = tokio::time::timeout(EVENT_TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let frame: Value = serde_json::from_str(text.as_str()).unwrap();
                    if frame["event"] == name {
                        return frame["data"].clone();
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    panic!("socket closed while waiting for {}: {:?}", name, frame)
                }
                Some(Ok(_)) => continue,
                other => panic!("socket ended while waiting for {}: {:?}", name, other),
            }
        }
    })
    .await;

    match result {
        Ok(data) => data,
        Err(_) => panic!("timed out waiting for {}", name),
    }
}

/// Assert that no event named `name` arrives within `window`.
pub async fn expect_no_event(ws: &mut WsStream, name: &str, window: Duration) {
    let _ = tokio::time::timeout(window, async {
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                let frame: Value = serde_json::from_str(text.as_str()).unwrap();
                assert_ne!(frame["event"], name, "unexpected {}: {}", name, frame);
            }
        }
    })
    .await;
}

/// Read until the server's close frame; returns its code.
pub async fn expect_close(ws: &mut WsStream) -> u16 {
    let result = tokio::time::timeout(EVENT_TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(Some(frame)))) => return u16::from(frame.code),
                Some(Ok(Message::Close(None))) => panic!("close frame without a code"),
                Some(Ok(_)) => continue,
                other => panic!("socket ended without a close frame: {:?}", other),
            }
        }
    })
    .await;

    match result {
        Ok(code) => code,
        Err(_) => panic!("timed out waiting for close frame"),
    }
}

/// Authenticated HTTP helper.
pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}
