//! Connection registry: which user is reachable through which live connection.
//!
//! One authoritative entry per user. A second connection from the same user
//! replaces the first for routing (last connect wins); the displaced
//! connection stays open but is no longer addressable by user id. Every open
//! connection of a user is still tracked separately so eviction reaches all
//! of them.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use crate::db::models::UserSummary;
use crate::ws::broadcast::fan_out;
use crate::ws::events::ServerEvent;
use crate::ws::{ConnectionHandle, ConnectionId};

#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    pub handle: ConnectionHandle,
    pub user: UserSummary,
    pub last_seen: DateTime<Utc>,
}

/// Owned by the server instance (see `AppState`), cloned cheaply into handlers.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    entries: Arc<DashMap<String, ConnectionEntry>>,
    /// Every open connection per user, routing target or not.
    open: Arc<DashMap<String, Vec<ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `handle` the routing target for its user.
    /// Returns the handle it displaced, if any.
    pub fn register(&self, handle: ConnectionHandle, user: UserSummary) -> Option<ConnectionHandle> {
        let user_id = handle.user_id().to_string();
        {
            let mut open = self.open.entry(user_id.clone()).or_default();
            open.retain(|h| !h.is_closed());
            open.push(handle.clone());
        }

        let previous = self.entries.insert(
            user_id.clone(),
            ConnectionEntry {
                handle,
                user,
                last_seen: Utc::now(),
            },
        );

        tracing::debug!(
            user_id = %user_id,
            replaced = previous.is_some(),
            "Connection registered"
        );

        previous.map(|entry| entry.handle)
    }

    pub fn lookup(&self, user_id: &str) -> Option<ConnectionHandle> {
        self.entries.get(user_id).map(|e| e.handle.clone())
    }

    pub fn entry(&self, user_id: &str) -> Option<ConnectionEntry> {
        self.entries.get(user_id).map(|e| e.value().clone())
    }

    /// Every open connection of a user, the displaced ones included.
    pub fn open_connections(&self, user_id: &str) -> Vec<ConnectionHandle> {
        self.open
            .get(user_id)
            .map(|handles| handles.value().clone())
            .unwrap_or_default()
    }

    /// Remove the entry only if it still belongs to `connection_id`, so a late
    /// disconnect from a replaced connection cannot evict its successor.
    /// The connection always leaves the open set.
    pub fn unregister(&self, user_id: &str, connection_id: ConnectionId) -> bool {
        if let Some(mut open) = self.open.get_mut(user_id) {
            open.retain(|h| h.id() != connection_id);
        }
        self.open.remove_if(user_id, |_, open| open.is_empty());

        let removed = self
            .entries
            .remove_if(user_id, |_, entry| entry.handle.id() == connection_id)
            .is_some();

        tracing::debug!(user_id = %user_id, removed, "Connection unregistered");
        removed
    }

    /// Refresh last-activity for the current connection of a user.
    pub fn touch(&self, user_id: &str, connection_id: ConnectionId) {
        if let Some(mut entry) = self.entries.get_mut(user_id) {
            if entry.handle.id() == connection_id {
                entry.last_seen = Utc::now();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Send an event to a user's current connection.
    pub fn send_to_user(&self, user_id: &str, event: &ServerEvent) -> bool {
        match self.lookup(user_id) {
            Some(handle) => handle.send(event),
            None => false,
        }
    }

    /// Send an event to every registered connection except `user_id`'s.
    /// Returns the number of recipients.
    pub fn broadcast_except(&self, user_id: &str, event: &ServerEvent) -> usize {
        // Snapshot first so no shard lock is held while queueing frames
        let recipients: Vec<ConnectionHandle> = self
            .entries
            .iter()
            .filter(|e| e.key() != user_id)
            .map(|e| e.handle.clone())
            .collect();

        fan_out(recipients.iter(), event)
    }
}
