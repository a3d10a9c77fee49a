//! Conversation list: one row per counterpart with the latest message.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::auth::middleware::AuthUser;
use crate::db;
use crate::error::RealtimeError;
use crate::state::AppState;

use super::store;

/// GET /api/messages/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Value>, RealtimeError> {
    let user_id = user.id().to_string();
    let conversations = db::run(&state.db, move |conn| {
        Ok(store::conversation_summaries(conn, &user_id)?)
    })
    .await?;

    Ok(Json(json!({ "success": true, "data": conversations })))
}
