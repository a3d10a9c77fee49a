//! Point-to-point forwarding of call signals through the connection registry.
//! A target without a live connection means the signal is dropped.

use crate::error::RealtimeError;
use crate::state::AppState;
use crate::ws::events::{
    CallEnded, CallResponse, CallResponseEvent, CallUser, IncomingCall, ServerEvent, UserRef,
};
use crate::ws::Session;

fn forward(state: &AppState, from: &str, to: &str, event: ServerEvent) -> bool {
    let name = event.name();
    let delivered = state.connections.send_to_user(to, &event);
    if !delivered {
        tracing::debug!(from = %from, to = %to, event = name, "Call signal dropped, target offline");
    }
    delivered
}

fn require_target<'a>(session: &Session, target: &'a str) -> Result<&'a str, RealtimeError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(RealtimeError::validation("Target user ID is required"));
    }
    if target == session.user_id() {
        return Err(RealtimeError::validation("Cannot call yourself"));
    }
    Ok(target)
}

/// Ring the receiver. Returns whether they had a live connection.
pub fn call_user(state: &AppState, session: &Session, req: CallUser) -> Result<bool, RealtimeError> {
    let receiver_id = require_target(session, &req.receiver_id)?;

    let event = ServerEvent::IncomingCall(IncomingCall {
        caller_id: session.user.id.clone(),
        caller: session.user.clone(),
        call_type: req.call_type,
        agora_token: req.agora_token,
        channel_name: req.channel_name,
    });
    Ok(forward(state, session.user_id(), receiver_id, event))
}

/// Answer (accept or reject) a call back to its caller.
pub fn call_response(
    state: &AppState,
    session: &Session,
    req: CallResponse,
) -> Result<bool, RealtimeError> {
    let caller_id = require_target(session, &req.caller_id)?;

    let event = ServerEvent::CallResponse(CallResponseEvent {
        receiver_id: session.user.id.clone(),
        receiver: session.user.clone(),
        accepted: req.accepted,
        agora_token: req.agora_token,
        channel_name: req.channel_name,
    });
    Ok(forward(state, session.user_id(), caller_id, event))
}

/// Tell the other party the call is over.
pub fn call_ended(state: &AppState, session: &Session, req: CallEnded) -> Result<bool, RealtimeError> {
    let other_id = require_target(session, &req.other_user_id)?;

    let event = ServerEvent::CallEnded(UserRef {
        user_id: session.user.id.clone(),
    });
    Ok(forward(state, session.user_id(), other_id, event))
}
