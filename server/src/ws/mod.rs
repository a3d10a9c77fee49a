pub mod actor;
pub mod broadcast;
pub mod events;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod rooms;

use axum::extract::ws::{CloseFrame, Message};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use crate::db::models::UserSummary;
use crate::ws::events::ServerEvent;

pub use registry::ConnectionRegistry;
pub use rooms::RoomRegistry;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system clone this (inside a handle) to push messages to a client.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// Distinguishes two connections from the same user.
pub type ConnectionId = Uuid;

/// Cloneable handle to one live transport connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    user_id: String,
    sender: ConnectionSender,
    evicted: Arc<Notify>,
}

impl ConnectionHandle {
    pub fn new(user_id: impl Into<String>, sender: ConnectionSender) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            sender,
            evicted: Arc::new(Notify::new()),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Encode and queue an event. Returns false if the connection is gone.
    pub fn send(&self, event: &ServerEvent) -> bool {
        match broadcast::encode(event) {
            Some(msg) => self.send_raw(msg),
            None => false,
        }
    }

    pub fn send_raw(&self, msg: Message) -> bool {
        self.sender.send(msg).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Queue a close frame and wake the reader loop so it stops taking events.
    pub fn evict(&self, code: u16, reason: &str) {
        let _ = self.sender.send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.to_string().into(),
        })));
        self.evicted.notify_one();
    }

    /// Resolves once `evict` has been called on any clone of this handle.
    pub async fn evicted(&self) {
        self.evicted.notified().await
    }
}

/// The authenticated identity bound to a connection for its whole life.
#[derive(Debug, Clone)]
pub struct Session {
    pub handle: ConnectionHandle,
    pub user: UserSummary,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}
