//! Ephemeral room membership for two-party chat rooms and live-stream rooms.
//!
//! Rooms exist only while they have members. Membership is per connection,
//! not per user, and is tracked in both directions so a disconnect can leave
//! every room in one call.

use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::ws::broadcast::fan_out;
use crate::ws::events::ServerEvent;
use crate::ws::{ConnectionHandle, ConnectionId};

#[derive(Debug, Clone, Default)]
pub struct RoomRegistry {
    /// room_id -> members
    rooms: Arc<DashMap<String, HashMap<ConnectionId, ConnectionHandle>>>,
    /// connection -> rooms it joined
    memberships: Arc<DashMap<ConnectionId, HashSet<String>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room. Returns false if it was already a member.
    pub fn join(&self, room_id: &str, handle: &ConnectionHandle) -> bool {
        let inserted = self
            .rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(handle.id(), handle.clone())
            .is_none();

        self.memberships
            .entry(handle.id())
            .or_default()
            .insert(room_id.to_string());

        inserted
    }

    /// Remove a connection from a room. Returns false if it was not a member.
    pub fn leave(&self, room_id: &str, connection_id: ConnectionId) -> bool {
        let removed = self.remove_member(room_id, connection_id);

        if let Some(mut joined) = self.memberships.get_mut(&connection_id) {
            joined.remove(room_id);
        }
        self.memberships
            .remove_if(&connection_id, |_, joined| joined.is_empty());

        removed
    }

    /// Remove a connection from every room it joined. Returns the room ids.
    pub fn leave_all(&self, connection_id: ConnectionId) -> Vec<String> {
        let joined = self
            .memberships
            .remove(&connection_id)
            .map(|(_, rooms)| rooms)
            .unwrap_or_default();

        joined
            .into_iter()
            .filter(|room_id| self.remove_member(room_id, connection_id))
            .collect()
    }

    fn remove_member(&self, room_id: &str, connection_id: ConnectionId) -> bool {
        let removed = match self.rooms.get_mut(room_id) {
            Some(mut members) => members.remove(&connection_id).is_some(),
            None => false,
        };
        // Garbage-collect the room once its last member is gone
        self.rooms.remove_if(room_id, |_, members| members.is_empty());
        removed
    }

    pub fn contains(&self, room_id: &str, connection_id: ConnectionId) -> bool {
        self.rooms
            .get(room_id)
            .map(|members| members.contains_key(&connection_id))
            .unwrap_or(false)
    }

    pub fn members(&self, room_id: &str) -> Vec<ConnectionHandle> {
        self.rooms
            .get(room_id)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn member_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map(|m| m.len()).unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Send to every member of a room, optionally skipping one connection.
    /// Returns the number of recipients.
    pub fn broadcast(
        &self,
        room_id: &str,
        event: &ServerEvent,
        except: Option<ConnectionId>,
    ) -> usize {
        let recipients: Vec<ConnectionHandle> = self
            .members(room_id)
            .into_iter()
            .filter(|handle| Some(handle.id()) != except)
            .collect();

        fan_out(recipients.iter(), event)
    }
}
