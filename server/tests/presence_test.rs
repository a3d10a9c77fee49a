//! Integration tests for the WebSocket auth gate and presence transitions.

mod common;

use common::*;
use futures_util::SinkExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use social_server::chat::presence;
use social_server::db::users;
use social_server::ws::{ConnectionHandle, Session};

#[tokio::test]
async fn test_health_check() {
    let server = start_test_server().await;
    let resp = client().get(server.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_connect_broadcasts_online_and_disconnect_offline() {
    let server = start_test_server().await;
    let alice = server.create_user("alice", 0);
    let bob = server.create_user("bob", 0);

    let mut ws_a = server.connect(&alice).await;
    let mut ws_b = server.connect(&bob).await;

    let online = expect_event(&mut ws_a, "user_online").await;
    assert_eq!(online["userId"], bob.id());
    assert_eq!(online["user"]["username"], "bob");

    {
        let conn = server.state.db.lock().unwrap();
        assert!(social_server::db::users::is_online(&conn, bob.id()).unwrap());
    }

    ws_b.close(None).await.unwrap();
    let offline = expect_event(&mut ws_a, "user_offline").await;
    assert_eq!(offline["userId"], bob.id());
    server.wait_offline(&bob).await;

    let conn = server.state.db.lock().unwrap();
    assert!(!social_server::db::users::is_online(&conn, bob.id()).unwrap());
}

#[tokio::test]
async fn test_invalid_token_is_rejected_with_4002() {
    let server = start_test_server().await;

    let mut ws = server.connect_raw(Some("not-a-jwt")).await;
    let err = expect_event(&mut ws, "error").await;
    assert_eq!(err["message"], "Authentication error");
    assert_eq!(expect_close(&mut ws).await, 4002);

    let mut ws = server.connect_raw(None).await;
    assert_eq!(expect_close(&mut ws).await, 4002);

    assert!(server.state.connections.is_empty());
}

#[tokio::test]
async fn test_blocked_account_is_rejected_with_4003() {
    let server = start_test_server().await;
    let mallory = server.create_user("mallory", 0);
    {
        let conn = server.state.db.lock().unwrap();
        social_server::db::users::set_account_blocked(&conn, mallory.id(), true).unwrap();
    }

    let mut ws = server.connect_raw(Some(&mallory.token)).await;
    assert_eq!(expect_close(&mut ws).await, 4003);
    assert!(server.state.connections.lookup(mallory.id()).is_none());
}

#[tokio::test]
async fn test_token_for_unknown_user_is_invalid() {
    let server = start_test_server().await;
    let token = social_server::auth::jwt::issue_access_token(&server.state.jwt_secret, "ghost", false)
        .unwrap();

    let mut ws = server.connect_raw(Some(&token)).await;
    assert_eq!(expect_close(&mut ws).await, 4002);
}

#[tokio::test]
async fn test_newer_connection_wins_and_stale_close_keeps_user_online() {
    let server = start_test_server().await;
    let alice = server.create_user("alice", 0);
    let bob = server.create_user("bob", 0);

    let mut ws_a = server.connect(&alice).await;
    let mut ws_b1 = server.connect(&bob).await;
    let first = server.state.connections.lookup(bob.id()).unwrap().id();
    let _ws_b2 = server.connect(&bob).await;
    let second = server.state.connections.lookup(bob.id()).unwrap().id();
    assert_ne!(first, second);

    // Closing the displaced socket must not take bob offline
    ws_b1.close(None).await.unwrap();
    expect_no_event(&mut ws_a, "user_offline", Duration::from_millis(300)).await;
    assert_eq!(server.state.connections.lookup(bob.id()).map(|h| h.id()), Some(second));
}

#[tokio::test]
async fn test_malformed_frames_get_an_error_event() {
    let server = start_test_server().await;
    let alice = server.create_user("alice", 0);
    let mut ws = server.connect(&alice).await;

    ws.send(Message::Text("{not json".into())).await.unwrap();
    let err = expect_event(&mut ws, "error").await;
    assert_eq!(err["message"], "Invalid event payload");

    send_event(&mut ws, "launch_rockets", serde_json::json!({})).await;
    let err = expect_event(&mut ws, "error").await;
    assert_eq!(err["message"], "Invalid event payload");

    ws.send(Message::Binary(vec![1, 2, 3].into())).await.unwrap();
    expect_event(&mut ws, "error").await;

    // Still connected afterwards
    assert!(server.state.connections.lookup(alice.id()).is_some());
}

#[tokio::test]
async fn test_events_refresh_last_seen() {
    let server = start_test_server().await;
    let alice = server.create_user("alice", 0);
    let mut ws = server.connect(&alice).await;
    let before = server.state.connections.entry(alice.id()).unwrap().last_seen;

    tokio::time::sleep(Duration::from_millis(20)).await;
    send_event(&mut ws, "typing_start", serde_json::json!({ "receiverId": "someone" })).await;

    let refreshed = wait_until(|| {
        server
            .state
            .connections
            .entry(alice.id())
            .is_some_and(|e| e.last_seen > before)
    })
    .await;
    assert!(refreshed);
}

fn session_for(user: &TestUser) -> Session {
    let (tx, _rx) = mpsc::unbounded_channel();
    Session {
        handle: ConnectionHandle::new(user.id(), tx),
        user: user.summary.clone(),
    }
}

#[tokio::test]
async fn test_reconnect_during_offline_write_keeps_user_online() {
    let server = start_test_server().await;
    let alice = server.create_user("alice", 0);
    let bob = server.create_user("bob", 0);
    let mut ws_b = server.connect(&bob).await;
    let state = server.state.clone();

    let first = session_for(&alice);
    presence::go_online(&state, &first).await;
    expect_event(&mut ws_b, "user_online").await;

    // Stall the offline write until the same user has reconnected
    let db_guard = state.db.lock().unwrap();
    let releasing = tokio::spawn({
        let state = state.clone();
        let first = first.clone();
        async move { presence::go_offline(&state, &first).await }
    });
    assert!(wait_until(|| state.connections.lookup(alice.id()).is_none()).await);

    let second = session_for(&alice);
    state.connections.register(second.handle.clone(), second.user.clone());
    drop(db_guard);

    assert!(!releasing.await.unwrap());
    expect_no_event(&mut ws_b, "user_offline", Duration::from_millis(300)).await;
    assert_eq!(
        state.connections.lookup(alice.id()).map(|h| h.id()),
        Some(second.handle.id())
    );
    let conn = state.db.lock().unwrap();
    assert!(users::is_online(&conn, alice.id()).unwrap());
}
