//! Admin account moderation: block and unblock whole accounts.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::middleware::AdminUser;
use crate::chat::presence;
use crate::db::{self, users};
use crate::error::RealtimeError;
use crate::notifications::push;
use crate::notifications::store::{NewNotification, TYPE_ADMIN};
use crate::state::AppState;
use crate::ws::handler::CLOSE_ACCOUNT_BLOCKED;

#[derive(Debug, Default, Deserialize)]
pub struct BlockRequest {
    pub reason: Option<String>,
}

/// Flip the account flag after checking it actually changes.
/// Returns the account's username.
async fn change_block_flag(
    state: &AppState,
    user_id: &str,
    blocked: bool,
) -> Result<String, RealtimeError> {
    let target = user_id.to_string();
    db::run(&state.db, move |conn| {
        let account = users::find_account(conn, &target)?
            .ok_or_else(|| RealtimeError::not_found("User not found"))?;
        match (account.is_blocked, blocked) {
            (true, true) => return Err(RealtimeError::validation("User is already blocked")),
            (false, false) => return Err(RealtimeError::validation("User is not blocked")),
            _ => {}
        }
        users::set_account_blocked(conn, &target, blocked)?;
        Ok(account.summary.username)
    })
    .await
}

/// Leave an admin notification for the account owner. Failures are logged.
async fn notify_account_owner(state: &AppState, user_id: &str, title: &str, body: String, data: Value) {
    let new = NewNotification {
        user_id: user_id.to_string(),
        title: title.to_string(),
        body,
        notification_type: TYPE_ADMIN.to_string(),
        data: Some(data),
    };
    if let Err(e) = push::notify_user(state, new).await {
        tracing::warn!(user_id = %user_id, error = %e, "Failed to store moderation notification");
    }
}

/// PUT /api/admin/users/{id}/block
///
/// Flags the account blocked and offline, leaves an "Account Blocked"
/// notification carrying the optional reason, and evicts every live
/// connection of the user.
pub async fn block_account(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
    body: Option<Json<BlockRequest>>,
) -> Result<Json<Value>, RealtimeError> {
    if user_id == admin.summary.id {
        return Err(RealtimeError::validation("Cannot block your own account"));
    }

    let reason = body
        .and_then(|Json(req)| req.reason)
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    let username = change_block_flag(&state, &user_id, true).await?;

    notify_account_owner(
        &state,
        &user_id,
        "Account Blocked",
        reason
            .clone()
            .unwrap_or_else(|| "Your account has been blocked by an administrator".to_string()),
        json!({ "action": "block", "reason": reason }),
    )
    .await;

    let evicted = presence::evict(&state, &user_id, CLOSE_ACCOUNT_BLOCKED, "Account is blocked").await;

    tracing::info!(
        admin_id = %admin.summary.id,
        user_id = %user_id,
        evicted,
        "Account blocked"
    );
    Ok(Json(json!({
        "success": true,
        "message": format!("User {} blocked successfully", username),
    })))
}

/// PUT /api/admin/users/{id}/unblock
pub async fn unblock_account(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, RealtimeError> {
    let username = change_block_flag(&state, &user_id, false).await?;

    notify_account_owner(
        &state,
        &user_id,
        "Account Unblocked",
        "Your account has been unblocked by an administrator".to_string(),
        json!({ "action": "unblock" }),
    )
    .await;

    tracing::info!(admin_id = %admin.summary.id, user_id = %user_id, "Account unblocked");
    Ok(Json(json!({
        "success": true,
        "message": format!("User {} unblocked successfully", username),
    })))
}
