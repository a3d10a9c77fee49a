//! Integration tests for admin account blocking and live eviction.

mod common;

use common::*;
use futures_util::SinkExt;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

use social_server::db::users;
use social_server::notifications::store as notification_store;

#[tokio::test]
async fn test_block_evicts_live_connection() {
    let server = start_test_server().await;
    let admin = server.create_admin("admin");
    let alice = server.create_user("alice", 0);
    let bob = server.create_user("bob", 0);
    let mut ws_a = server.connect(&alice).await;
    let mut ws_b = server.connect(&bob).await;
    server.state.rooms.join("live_x", &server.state.connections.lookup(bob.id()).unwrap());

    let resp = client()
        .put(server.url(&format!("/api/admin/users/{}/block", bob.id())))
        .bearer_auth(&admin.token)
        .json(&json!({ "reason": "Spamming live rooms" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "User bob blocked successfully");

    let note = expect_event(&mut ws_b, "notification").await;
    assert_eq!(note["title"], "Account Blocked");
    assert_eq!(note["message"], "Spamming live rooms");
    assert_eq!(note["type"], "admin");
    assert_eq!(note["data"]["action"], "block");
    assert_eq!(note["data"]["reason"], "Spamming live rooms");
    assert_eq!(expect_close(&mut ws_b).await, 4003);

    let offline = expect_event(&mut ws_a, "user_offline").await;
    assert_eq!(offline["userId"], bob.id());
    assert!(server.state.connections.lookup(bob.id()).is_none());
    assert_eq!(server.state.rooms.member_count("live_x"), 0);

    // A blocked account can neither reconnect nor call REST
    let mut again = server.connect_raw(Some(&bob.token)).await;
    assert_eq!(expect_close(&mut again).await, 4003);
    let rest = client()
        .get(server.url("/api/notifications"))
        .bearer_auth(&bob.token)
        .send()
        .await
        .unwrap();
    assert_eq!(rest.status(), 403);
}

#[tokio::test]
async fn test_block_requires_admin() {
    let server = start_test_server().await;
    let alice = server.create_user("alice", 0);
    let bob = server.create_user("bob", 0);

    let resp = client()
        .put(server.url(&format!("/api/admin/users/{}/block", bob.id())))
        .bearer_auth(&alice.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Admin access required");
}

#[tokio::test]
async fn test_block_closes_displaced_connections_too() {
    let server = start_test_server().await;
    let admin = server.create_admin("admin");
    let alice = server.create_user("alice", 100);
    let bob = server.create_user("bob", 0);
    let _ws_b = server.connect(&bob).await;
    let mut ws_old = server.connect(&alice).await;
    let mut ws_new = server.connect(&alice).await;

    let resp = client()
        .put(server.url(&format!("/api/admin/users/{}/block", alice.id())))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // The displaced socket keeps trying to act after the block
    let frames = [
        json!({ "event": "send_message", "data": { "receiverId": bob.id(), "content": "still here" } }),
        json!({
            "event": "send_live_gift",
            "data": { "roomId": "g", "receiverId": bob.id(), "giftType": "rose", "giftName": "Rose", "price": 30 }
        }),
    ];
    for frame in frames {
        let _ = ws_old.send(Message::Text(frame.to_string().into())).await;
    }

    assert_eq!(expect_close(&mut ws_old).await, 4003);
    assert_eq!(expect_close(&mut ws_new).await, 4003);
    assert!(server.state.connections.open_connections(alice.id()).is_empty());
    tokio::time::sleep(Duration::from_millis(200)).await;

    let conn = server.state.db.lock().unwrap();
    assert_eq!(
        social_server::dm::store::conversation_count(&conn, alice.id(), bob.id()).unwrap(),
        0
    );
    assert_eq!(users::balances(&conn, alice.id()).unwrap().unwrap().diamonds, 100);
}

#[tokio::test]
async fn test_block_and_unblock_only_change_state_once() {
    let server = start_test_server().await;
    let admin = server.create_admin("admin");
    let bob = server.create_user("bob", 0);
    let http = client();

    let action = |name: &str| {
        http.put(server.url(&format!("/api/admin/users/{}/{}", bob.id(), name)))
            .bearer_auth(&admin.token)
            .send()
    };

    let not_blocked = action("unblock").await.unwrap();
    assert_eq!(not_blocked.status(), 400);
    let body: Value = not_blocked.json().await.unwrap();
    assert_eq!(body["error"], "User is not blocked");

    assert_eq!(action("block").await.unwrap().status(), 200);
    let again = action("block").await.unwrap();
    assert_eq!(again.status(), 400);
    let body: Value = again.json().await.unwrap();
    assert_eq!(body["error"], "User is already blocked");

    let resp = action("unblock").await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "User bob unblocked successfully");

    let _ws = server.connect(&bob).await;
    let list = http
        .get(server.url("/api/notifications"))
        .bearer_auth(&bob.token)
        .send()
        .await
        .unwrap();
    assert_eq!(list.status(), 200);
    let body: Value = list.json().await.unwrap();
    let titles: Vec<&str> = body["data"]["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"Account Blocked"));
    assert!(titles.contains(&"Account Unblocked"));
    let unblocked = body["data"]["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["title"] == "Account Unblocked")
        .unwrap();
    assert_eq!(unblocked["data"]["action"], "unblock");

    let missing = http
        .put(server.url("/api/admin/users/nobody/block"))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn test_bulk_notification_reaches_each_recipient() {
    let server = start_test_server().await;
    let admin = server.create_admin("admin");
    let alice = server.create_user("alice", 0);
    let bob = server.create_user("bob", 0);
    let mut ws_a = server.connect(&alice).await;
    let http = client();

    let resp = http
        .post(server.url("/api/notifications/bulk"))
        .bearer_auth(&admin.token)
        .json(&json!({
            "userIds": [alice.id(), bob.id(), "nobody"],
            "title": "Maintenance",
            "message": "Back in ten minutes",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["successful"], 2);
    assert_eq!(body["data"]["failed"], 1);

    // Live owners get the event, offline ones find it stored
    let live = expect_event(&mut ws_a, "notification").await;
    assert_eq!(live["title"], "Maintenance");
    assert_eq!(live["type"], "system");
    {
        let conn = server.state.db.lock().unwrap();
        assert_eq!(notification_store::unread_count(&conn, bob.id()).unwrap(), 1);
    }

    let empty = http
        .post(server.url("/api/notifications/bulk"))
        .bearer_auth(&admin.token)
        .json(&json!({ "userIds": [], "title": "t", "message": "m" }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), 400);

    let not_admin = http
        .post(server.url("/api/notifications/bulk"))
        .bearer_auth(&alice.token)
        .json(&json!({ "userIds": [bob.id()], "title": "t", "message": "m" }))
        .send()
        .await
        .unwrap();
    assert_eq!(not_admin.status(), 403);
}
