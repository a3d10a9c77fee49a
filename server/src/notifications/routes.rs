//! REST endpoints for a user's notifications. JWT auth required on all.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::middleware::{AdminUser, AuthUser};
use crate::db;
use crate::error::RealtimeError;
use crate::pagination::{PageInfo, PageQuery};
use crate::state::AppState;

use super::push;
use super::store::{self, NewNotification, TYPE_SYSTEM};

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct NotificationListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(rename = "type")]
    pub notification_type: Option<String>,
}

/// GET /api/notifications?page&limit&type
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<Value>, RealtimeError> {
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .resolve(DEFAULT_LIMIT, MAX_LIMIT);
    let user_id = user.id().to_string();
    let kind = query.notification_type;

    let (notifications, total) = db::run(&state.db, move |conn| {
        let items = store::list_notifications(conn, &user_id, kind.as_deref(), page.limit, page.offset)?;
        let total = store::count_notifications(conn, &user_id, kind.as_deref())?;
        Ok((items, total))
    })
    .await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "notifications": notifications,
            "pagination": PageInfo::new(page, total),
        }
    })))
}

/// GET /api/notifications/unread-count
pub async fn get_unread_count(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Value>, RealtimeError> {
    let user_id = user.id().to_string();
    let count = db::run(&state.db, move |conn| Ok(store::unread_count(conn, &user_id)?)).await?;

    Ok(Json(json!({ "success": true, "data": { "unreadCount": count } })))
}

/// PUT /api/notifications/{id}/read. Owner only; repeating it is a no-op.
pub async fn mark_notification_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(notification_id): Path<String>,
) -> Result<Json<Value>, RealtimeError> {
    let user_id = user.id().to_string();

    db::run(&state.db, move |conn| {
        let notification = store::find_notification(conn, &notification_id)?
            .ok_or_else(|| RealtimeError::not_found("Notification not found"))?;
        if notification.user_id != user_id {
            return Err(RealtimeError::forbidden(
                "Not authorized to mark this notification as read",
            ));
        }
        store::mark_read(conn, &notification_id)?;
        Ok(())
    })
    .await?;

    Ok(Json(json!({ "success": true, "message": "Notification marked as read" })))
}

/// PUT /api/notifications/read-all
pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Value>, RealtimeError> {
    let user_id = user.id().to_string();
    let updated = db::run(&state.db, move |conn| Ok(store::mark_all_read(conn, &user_id)?)).await?;

    Ok(Json(json!({
        "success": true,
        "message": "All notifications marked as read",
        "data": { "updated": updated },
    })))
}

/// DELETE /api/notifications/{id}. Owner only.
pub async fn delete_notification(
    State(state): State<AppState>,
    user: AuthUser,
    Path(notification_id): Path<String>,
) -> Result<Json<Value>, RealtimeError> {
    let user_id = user.id().to_string();

    db::run(&state.db, move |conn| {
        let notification = store::find_notification(conn, &notification_id)?
            .ok_or_else(|| RealtimeError::not_found("Notification not found"))?;
        if notification.user_id != user_id {
            return Err(RealtimeError::forbidden(
                "Not authorized to delete this notification",
            ));
        }
        store::delete_notification(conn, &notification_id)?;
        Ok(())
    })
    .await?;

    Ok(Json(json!({ "success": true, "message": "Notification deleted successfully" })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkNotificationRequest {
    #[serde(default)]
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: Option<String>,
    pub data: Option<Value>,
}

/// POST /api/notifications/bulk. Admin only.
///
/// Each recipient is handled on its own; one failure does not stop the rest.
pub async fn send_bulk_notification(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<BulkNotificationRequest>,
) -> Result<Json<Value>, RealtimeError> {
    if req.user_ids.is_empty() {
        return Err(RealtimeError::validation("User IDs array is required"));
    }
    let title = req.title.trim();
    let message = req.message.trim();
    if title.is_empty() || message.is_empty() {
        return Err(RealtimeError::validation("Title and message are required"));
    }

    let notification_type = req
        .notification_type
        .unwrap_or_else(|| TYPE_SYSTEM.to_string());
    let total = req.user_ids.len();
    let mut successful = 0;

    for user_id in req.user_ids {
        let new = NewNotification {
            user_id: user_id.clone(),
            title: title.to_string(),
            body: message.to_string(),
            notification_type: notification_type.clone(),
            data: req.data.clone(),
        };
        match push::notify_user(&state, new).await {
            Ok(_) => successful += 1,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Bulk notification failed for recipient")
            }
        }
    }

    tracing::info!(
        admin_id = %admin.summary.id,
        total,
        successful,
        "Bulk notification sent"
    );
    Ok(Json(json!({
        "success": true,
        "message": "Bulk notification sent",
        "data": {
            "total": total,
            "successful": successful,
            "failed": total - successful,
        }
    })))
}
