//! Live-stream rooms: viewer membership, comments, and gifts.
//!
//! Rooms are keyed `live_{roomId}` in the shared room registry so they can
//! never collide with a two-party chat room id.

pub mod gifts;

use crate::error::RealtimeError;
use crate::state::AppState;
use crate::ws::events::{LiveCommentEvent, ServerEvent};
use crate::ws::Session;

/// Registry key for a live room.
pub fn live_room_key(room_id: &str) -> String {
    format!("live_{}", room_id)
}

fn require_room_id(room_id: &str) -> Result<&str, RealtimeError> {
    let room_id = room_id.trim();
    if room_id.is_empty() {
        return Err(RealtimeError::validation("Room ID is required"));
    }
    Ok(room_id)
}

/// Join a live room and announce the viewer to everyone already in it.
pub fn join_live_room(state: &AppState, session: &Session, room_id: &str) -> Result<usize, RealtimeError> {
    let key = live_room_key(require_room_id(room_id)?);
    state.rooms.join(&key, &session.handle);

    let notified = state.rooms.broadcast(
        &key,
        &ServerEvent::viewer_joined(&session.user),
        Some(session.handle.id()),
    );
    tracing::debug!(user_id = %session.user_id(), room = %key, notified, "Viewer joined");
    Ok(notified)
}

/// Leave a live room and tell the remaining viewers.
pub fn leave_live_room(state: &AppState, session: &Session, room_id: &str) -> Result<usize, RealtimeError> {
    let key = live_room_key(require_room_id(room_id)?);
    if !state.rooms.leave(&key, session.handle.id()) {
        return Ok(0);
    }

    let notified = state
        .rooms
        .broadcast(&key, &ServerEvent::viewer_left(session.user_id()), None);
    tracing::debug!(user_id = %session.user_id(), room = %key, notified, "Viewer left");
    Ok(notified)
}

/// Broadcast a comment to the whole room, author included.
pub fn live_comment(
    state: &AppState,
    session: &Session,
    room_id: &str,
    comment: &str,
) -> Result<usize, RealtimeError> {
    let key = live_room_key(require_room_id(room_id)?);
    let comment = comment.trim();
    if comment.is_empty() {
        return Err(RealtimeError::validation("Comment cannot be empty"));
    }

    let event = ServerEvent::NewLiveComment(LiveCommentEvent {
        user_id: session.user.id.clone(),
        user: session.user.clone(),
        comment: comment.to_string(),
        timestamp: crate::db::now_rfc3339(),
    });
    Ok(state.rooms.broadcast(&key, &event, None))
}
