use crate::db;
use crate::db::models::NotificationRecord;
use crate::error::RealtimeError;
use crate::state::AppState;
use crate::ws::events::ServerEvent;

use super::store::{self, NewNotification};

/// Persist a notification and, if the owner is connected, push it live too.
pub async fn notify_user(
    state: &AppState,
    new: NewNotification,
) -> Result<NotificationRecord, RealtimeError> {
    let record = db::run(&state.db, move |conn| Ok(store::create_notification(conn, new)?)).await?;

    let delivered = state
        .connections
        .send_to_user(&record.user_id, &ServerEvent::Notification(record.clone()));
    tracing::debug!(
        user_id = %record.user_id,
        notification_id = %record.id,
        delivered,
        "Notification recorded"
    );

    Ok(record)
}
