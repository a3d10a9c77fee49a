//! Presence coordinator: Offline <-> Online per user.
//!
//! Online: register the connection, persist `is_online = 1`, tell everyone else.
//! Offline: drop the connection's room memberships and registry entry first,
//! then persist `is_online = 0` and tell everyone else. Nothing in between.

use crate::db::{self, users};
use crate::state::AppState;
use crate::ws::events::ServerEvent;
use crate::ws::{ConnectionId, Session};

/// Transition a freshly authenticated connection to Online.
pub async fn go_online(state: &AppState, session: &Session) {
    let user_id = session.user_id().to_string();

    if let Some(previous) = state
        .connections
        .register(session.handle.clone(), session.user.clone())
    {
        tracing::info!(
            user_id = %user_id,
            previous_connection = %previous.id(),
            "Newer connection replaces previous one for routing"
        );
    }

    persist_online(state, &user_id, true).await;

    let recipients = state
        .connections
        .broadcast_except(&user_id, &ServerEvent::user_online(&session.user));
    tracing::debug!(user_id = %user_id, recipients, "Broadcast user_online");
}

/// Transition a closing connection to Offline.
///
/// Returns false when the connection had already been replaced by a newer one
/// from the same user, or one arrived while going offline; that user stays
/// Online and nothing is broadcast.
pub async fn go_offline(state: &AppState, session: &Session) -> bool {
    release_connection(state, session.user_id(), session.handle.id()).await
}

/// Force every open connection of a user closed (e.g. account blocked
/// mid-session), displaced ones included. Returns false if there were none.
pub async fn evict(state: &AppState, user_id: &str, close_code: u16, reason: &str) -> bool {
    let handles = state.connections.open_connections(user_id);
    if handles.is_empty() {
        return false;
    }

    for handle in &handles {
        handle.send(&ServerEvent::error(reason));
        handle.evict(close_code, reason);
    }
    tracing::info!(
        user_id = %user_id,
        close_code,
        connections = handles.len(),
        "Connections evicted"
    );

    // Displaced connections first so user_offline goes out once, last
    let current = state.connections.lookup(user_id).map(|h| h.id());
    for handle in handles.iter().filter(|h| Some(h.id()) != current) {
        release_connection(state, user_id, handle.id()).await;
    }
    if let Some(connection_id) = current {
        release_connection(state, user_id, connection_id).await;
    }
    true
}

async fn release_connection(state: &AppState, user_id: &str, connection_id: ConnectionId) -> bool {
    // Synchronous removal before any await, so no later event can target this socket
    let left_rooms = state.rooms.leave_all(connection_id);
    let was_current = state.connections.unregister(user_id, connection_id);

    tracing::debug!(
        user_id = %user_id,
        rooms = left_rooms.len(),
        was_current,
        "Connection released"
    );

    if !was_current {
        return false;
    }

    persist_online(state, user_id, false).await;

    // A reconnect during the write owns presence now; restore its flag and stay quiet
    if state.connections.lookup(user_id).is_some() {
        persist_online(state, user_id, true).await;
        tracing::debug!(user_id = %user_id, "Reconnected while going offline");
        return false;
    }

    let recipients = state
        .connections
        .broadcast_except(user_id, &ServerEvent::user_offline(user_id));
    tracing::debug!(user_id = %user_id, recipients, "Broadcast user_offline");
    true
}

/// Persist the online flag. Failures are logged; presence in memory stays authoritative.
async fn persist_online(state: &AppState, user_id: &str, online: bool) {
    let uid = user_id.to_string();
    if let Err(e) = db::run(&state.db, move |conn| Ok(users::set_online(conn, &uid, online)?)).await {
        tracing::warn!(
            user_id = %user_id,
            online,
            error = %e,
            "Failed to persist presence"
        );
    }
}
