//! REST endpoints for direct-message history, sending, and cleanup.
//!
//! Sending goes through the same router as the socket `send_message` event,
//! so both paths validate, persist, broadcast, and notify identically.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::auth::middleware::AuthUser;
use crate::db::{self, users};
use crate::error::RealtimeError;
use crate::pagination::{PageInfo, PageQuery};
use crate::state::AppState;
use crate::ws::events::SendMessage;

use super::{router, store};

/// Default page size for conversation history.
const DEFAULT_LIMIT: u32 = 50;
/// Maximum page size for conversation history.
const MAX_LIMIT: u32 = 100;

/// GET /api/messages/conversations/{user_id}?page&limit
///
/// History with one counterpart, oldest first. Opening it marks the
/// counterpart's messages to the caller as read.
pub async fn get_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(other_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, RealtimeError> {
    let page = query.resolve(DEFAULT_LIMIT, MAX_LIMIT);
    let user_id = user.id().to_string();

    let (messages, total) = db::run(&state.db, move |conn| {
        if users::find_account(conn, &other_id)?.is_none() {
            return Err(RealtimeError::not_found("User not found"));
        }
        if users::block_exists_between(conn, &user_id, &other_id)? {
            return Err(RealtimeError::forbidden(
                "Cannot access messages with blocked user",
            ));
        }

        let messages = store::conversation_page(conn, &user_id, &other_id, page.limit, page.offset)?;
        let total = store::conversation_count(conn, &user_id, &other_id)?;
        store::mark_conversation_read(conn, &user_id, &other_id)?;
        Ok((messages, total))
    })
    .await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "messages": messages,
            "pagination": PageInfo::new(page, total),
        }
    })))
}

/// POST /api/messages/send
pub async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<SendMessage>,
) -> Result<(StatusCode, Json<Value>), RealtimeError> {
    let delivery = router::send_message(&state, user.summary(), body).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Message sent successfully",
            "data": delivery.message,
        })),
    ))
}

/// PUT /api/messages/{id}/read. Only the receiver may mark a message read.
pub async fn mark_message_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(message_id): Path<String>,
) -> Result<Json<Value>, RealtimeError> {
    let user_id = user.id().to_string();

    db::run(&state.db, move |conn| {
        let message = store::find_message(conn, &message_id)?
            .ok_or_else(|| RealtimeError::not_found("Message not found"))?;
        if message.receiver_id != user_id {
            return Err(RealtimeError::forbidden(
                "Not authorized to mark this message as read",
            ));
        }
        store::mark_message_read(conn, &message_id)?;
        Ok(())
    })
    .await?;

    Ok(Json(json!({ "success": true, "message": "Message marked as read" })))
}

/// DELETE /api/messages/{id}. Sender only. Attached media is removed from
/// storage afterwards; a storage failure does not undo the delete.
pub async fn delete_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(message_id): Path<String>,
) -> Result<Json<Value>, RealtimeError> {
    let user_id = user.id().to_string();

    let message = db::run(&state.db, move |conn| {
        let message = store::find_message(conn, &message_id)?
            .ok_or_else(|| RealtimeError::not_found("Message not found"))?;
        if message.sender_id != user_id {
            return Err(RealtimeError::forbidden(
                "Not authorized to delete this message",
            ));
        }
        store::delete_message(conn, &message.id)?;
        Ok(message)
    })
    .await?;

    let media = message.media();
    if !media.is_empty() {
        let storage = state.media.clone();
        let message_id = message.id.clone();
        let cleanup = tokio::task::spawn_blocking(move || {
            for reference in media {
                if let Err(e) = storage.delete(&reference) {
                    tracing::warn!(
                        message_id = %message_id,
                        reference = %reference,
                        error = %e,
                        "Failed to delete message media"
                    );
                }
            }
        });
        if let Err(e) = cleanup.await {
            tracing::warn!(error = %e, "Media cleanup task failed");
        }
    }

    tracing::debug!(message_id = %message.id, "Message deleted");
    Ok(Json(json!({ "success": true, "message": "Message deleted successfully" })))
}

/// GET /api/messages/unread-count
pub async fn get_unread_count(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Value>, RealtimeError> {
    let user_id = user.id().to_string();
    let count = db::run(&state.db, move |conn| Ok(store::unread_count(conn, &user_id)?)).await?;

    Ok(Json(json!({ "success": true, "data": { "unreadCount": count } })))
}
