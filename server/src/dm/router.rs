//! Direct-message routing shared by the socket events and the REST send.
//!
//! A message is persisted first, then fanned out to the chat room. When the
//! receiver has no live connection a `message` notification is stored instead.

use serde_json::json;

use crate::db::{self, models::MessageRecord, models::UserSummary, users};
use crate::error::RealtimeError;
use crate::notifications::push;
use crate::notifications::store::{NewNotification, TYPE_MESSAGE};
use crate::state::AppState;
use crate::ws::events::{JoinedChat, SendMessage, ServerEvent, UserRef, UserWithProfile};
use crate::ws::Session;

use super::chat_room_id;
use super::store::{self, NewMessage};

pub const MAX_CONTENT_CHARS: usize = 1000;

/// Notification body for messages that carry media only.
pub const MEDIA_PLACEHOLDER: &str = "Sent a media file";

/// Outcome of a routed message.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: MessageRecord,
    pub chat_room_id: String,
    /// Connections in the chat room that were handed the `new_message` event.
    pub recipients: usize,
    /// Set when the receiver was offline and a notification was stored.
    pub notification_id: Option<String>,
}

fn normalize(msg: SendMessage) -> Result<SendMessage, RealtimeError> {
    let trim = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let msg = SendMessage {
        receiver_id: msg.receiver_id.trim().to_string(),
        content: trim(msg.content),
        image: trim(msg.image),
        video: trim(msg.video),
        message_type: msg.message_type,
    };

    if msg.receiver_id.is_empty() {
        return Err(RealtimeError::validation("Receiver ID is required"));
    }
    if msg.content.is_none() && msg.image.is_none() && msg.video.is_none() {
        return Err(RealtimeError::validation("Message must have content or media"));
    }
    if let Some(content) = &msg.content {
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(RealtimeError::validation(format!(
                "Message content cannot exceed {} characters",
                MAX_CONTENT_CHARS
            )));
        }
    }
    Ok(msg)
}

/// Validate, persist, and deliver one direct message from `sender`.
pub async fn send_message(
    state: &AppState,
    sender: &UserSummary,
    msg: SendMessage,
) -> Result<Delivery, RealtimeError> {
    let msg = normalize(msg)?;
    if msg.receiver_id == sender.id {
        return Err(RealtimeError::validation("Cannot send message to yourself"));
    }

    let sender_row = sender.clone();
    let message = db::run(&state.db, move |conn| {
        let receiver = users::find_account(conn, &msg.receiver_id)?;
        if !matches!(receiver, Some(ref account) if !account.is_blocked) {
            return Err(RealtimeError::not_found("Receiver not found or blocked"));
        }
        if users::block_exists_between(conn, &sender_row.id, &msg.receiver_id)? {
            return Err(RealtimeError::forbidden("Cannot send message to blocked user"));
        }

        Ok(store::insert_message(
            conn,
            NewMessage {
                sender: sender_row,
                receiver_id: msg.receiver_id,
                content: msg.content,
                message_type: msg.message_type,
                image: msg.image,
                video: msg.video,
            },
        )?)
    })
    .await?;

    let room_id = chat_room_id(&message.sender_id, &message.receiver_id);
    let recipients = state
        .rooms
        .broadcast(&room_id, &ServerEvent::NewMessage(message.clone()), None);

    let notification_id = if state.connections.lookup(&message.receiver_id).is_none() {
        notify_offline_receiver(state, sender, &message).await
    } else {
        None
    };

    tracing::debug!(
        message_id = %message.id,
        chat_room_id = %room_id,
        recipients,
        notified = notification_id.is_some(),
        "Message routed"
    );

    Ok(Delivery {
        message,
        chat_room_id: room_id,
        recipients,
        notification_id,
    })
}

/// The message is already stored; a failed notification only gets logged.
async fn notify_offline_receiver(
    state: &AppState,
    sender: &UserSummary,
    message: &MessageRecord,
) -> Option<String> {
    let notification = NewNotification {
        user_id: message.receiver_id.clone(),
        title: format!("New message from {}", sender.display_name()),
        body: message
            .content
            .clone()
            .unwrap_or_else(|| MEDIA_PLACEHOLDER.to_string()),
        notification_type: TYPE_MESSAGE.to_string(),
        data: Some(json!({ "senderId": sender.id, "messageId": message.id })),
    };

    match push::notify_user(state, notification).await {
        Ok(record) => Some(record.id),
        Err(e) => {
            tracing::warn!(
                message_id = %message.id,
                receiver_id = %message.receiver_id,
                error = %e,
                "Failed to store message notification"
            );
            None
        }
    }
}

/// Subscribe the session to its chat room with `receiver_id` and mark that
/// conversation read. Returns the chat room id.
pub async fn join_chat(
    state: &AppState,
    session: &Session,
    receiver_id: &str,
) -> Result<String, RealtimeError> {
    let receiver_id = receiver_id.trim().to_string();
    if receiver_id.is_empty() {
        return Err(RealtimeError::validation("Receiver ID is required"));
    }

    let room_id = chat_room_id(session.user_id(), &receiver_id);
    state.rooms.join(&room_id, &session.handle);

    let reader = session.user_id().to_string();
    let counterpart = receiver_id.clone();
    let marked = db::run(&state.db, move |conn| {
        Ok(store::mark_conversation_read(conn, &reader, &counterpart)?)
    })
    .await?;

    session.handle.send(&ServerEvent::JoinedChat(JoinedChat {
        chat_room_id: room_id.clone(),
        receiver_id,
    }));

    tracing::debug!(
        user_id = %session.user_id(),
        chat_room_id = %room_id,
        marked,
        "Joined chat"
    );
    Ok(room_id)
}

/// Relay a typing indicator to the other connections in the chat room.
pub fn typing(state: &AppState, session: &Session, receiver_id: &str, started: bool) -> usize {
    let room_id = chat_room_id(session.user_id(), receiver_id.trim());
    let event = if started {
        ServerEvent::UserTyping(UserWithProfile {
            user_id: session.user.id.clone(),
            user: session.user.clone(),
        })
    } else {
        ServerEvent::UserStoppedTyping(UserRef {
            user_id: session.user.id.clone(),
        })
    };

    state
        .rooms
        .broadcast(&room_id, &event, Some(session.handle.id()))
}
