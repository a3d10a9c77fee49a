//! Inbound event dispatch.
//!
//! A text frame is decoded once into `ClientEvent`, then matched exhaustively.
//! Handler failures are reported to the originating connection only.

use crate::calls::relay;
use crate::dm::router;
use crate::error::RealtimeError;
use crate::live::{self, gifts};
use crate::state::AppState;
use crate::ws::events::{ClientEvent, ServerEvent};
use crate::ws::Session;

/// Handle one text frame from an authenticated connection.
pub async fn handle_text_message(text: &str, state: &AppState, session: &Session) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(
                user_id = %session.user_id(),
                error = %e,
                "Failed to decode client event"
            );
            session.handle.send(&ServerEvent::error("Invalid event payload"));
            return;
        }
    };

    state
        .connections
        .touch(session.user_id(), session.handle.id());

    dispatch(event, state, session).await;
}

/// Route a decoded event to its handler.
async fn dispatch(event: ClientEvent, state: &AppState, session: &Session) {
    match event {
        ClientEvent::JoinChat(target) => {
            let result = router::join_chat(state, session, &target.receiver_id).await;
            report(session, result, "Failed to join chat");
        }
        ClientEvent::SendMessage(msg) => {
            let result = router::send_message(state, &session.user, msg).await;
            report(session, result, "Failed to send message");
        }
        ClientEvent::TypingStart(target) => {
            router::typing(state, session, &target.receiver_id, true);
        }
        ClientEvent::TypingStop(target) => {
            router::typing(state, session, &target.receiver_id, false);
        }
        ClientEvent::JoinLiveRoom(room) => {
            let result = live::join_live_room(state, session, &room.room_id);
            report(session, result, "Failed to join live room");
        }
        ClientEvent::LeaveLiveRoom(room) => {
            let result = live::leave_live_room(state, session, &room.room_id);
            report(session, result, "Failed to leave live room");
        }
        ClientEvent::LiveComment(c) => {
            let result = live::live_comment(state, session, &c.room_id, &c.comment);
            report(session, result, "Failed to send comment");
        }
        ClientEvent::SendLiveGift(gift) => {
            let result = gifts::send_gift(state, &session.user, gift).await;
            report(session, result, "Failed to send gift");
        }
        ClientEvent::CallUser(req) => {
            let result = relay::call_user(state, session, req);
            report(session, result, "Failed to initiate call");
        }
        ClientEvent::CallResponse(req) => {
            let result = relay::call_response(state, session, req);
            report(session, result, "Failed to respond to call");
        }
        ClientEvent::CallEnded(req) => {
            let result = relay::call_ended(state, session, req);
            report(session, result, "Failed to end call");
        }
    }
}

/// Send an `error` event back to the originating connection on failure.
fn report<T>(session: &Session, result: Result<T, RealtimeError>, fallback: &str) {
    let Err(e) = result else {
        return;
    };

    match &e {
        RealtimeError::Persistence(_) | RealtimeError::Internal(_) => {
            tracing::error!(user_id = %session.user_id(), error = %e, "{}", fallback);
        }
        _ => {
            tracing::debug!(user_id = %session.user_id(), error = %e, "Event rejected");
        }
    }
    session.handle.send(&ServerEvent::error(e.client_message(fallback)));
}
