use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::models::NotificationRecord;
use crate::db::now_rfc3339;

/// Notification kinds produced by this server.
pub const TYPE_MESSAGE: &str = "message";
pub const TYPE_ADMIN: &str = "admin";
pub const TYPE_SYSTEM: &str = "system";

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub notification_type: String,
    pub data: Option<serde_json::Value>,
}

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, title, body, notification_type, data, is_read, created_at";

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationRecord> {
    let data: Option<String> = row.get(5)?;
    Ok(NotificationRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        notification_type: row.get(4)?,
        data: data.and_then(|d| serde_json::from_str(&d).ok()),
        is_read: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn create_notification(
    conn: &Connection,
    new: NewNotification,
) -> rusqlite::Result<NotificationRecord> {
    let id = Uuid::now_v7().to_string();
    let created_at = now_rfc3339();
    let data = new.data.as_ref().map(|d| d.to_string());

    conn.execute(
        "INSERT INTO notifications (id, user_id, title, body, notification_type, data, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            new.user_id,
            new.title,
            new.body,
            new.notification_type,
            data,
            created_at,
        ],
    )?;

    Ok(NotificationRecord {
        id,
        user_id: new.user_id,
        title: new.title,
        body: new.body,
        notification_type: new.notification_type,
        data: new.data,
        is_read: false,
        created_at,
    })
}

pub fn find_notification(
    conn: &Connection,
    notification_id: &str,
) -> rusqlite::Result<Option<NotificationRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM notifications WHERE id = ?1", NOTIFICATION_COLUMNS),
        params![notification_id],
        notification_from_row,
    )
    .optional()
}

/// Newest first, optionally filtered by type.
pub fn list_notifications(
    conn: &Connection,
    user_id: &str,
    notification_type: Option<&str>,
    limit: u32,
    offset: u32,
) -> rusqlite::Result<Vec<NotificationRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM notifications
         WHERE user_id = ?1 AND (?2 IS NULL OR notification_type = ?2)
         ORDER BY rowid DESC
         LIMIT ?3 OFFSET ?4",
        NOTIFICATION_COLUMNS
    ))?;

    let notifications = stmt
        .query_map(
            params![user_id, notification_type, limit, offset],
            notification_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(notifications)
}

pub fn count_notifications(
    conn: &Connection,
    user_id: &str,
    notification_type: Option<&str>,
) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM notifications
         WHERE user_id = ?1 AND (?2 IS NULL OR notification_type = ?2)",
        params![user_id, notification_type],
        |row| row.get(0),
    )
}

pub fn unread_count(conn: &Connection, user_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
        params![user_id],
        |row| row.get(0),
    )
}

pub fn mark_read(conn: &Connection, notification_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND is_read = 0",
        params![notification_id],
    )
}

pub fn mark_all_read(conn: &Connection, user_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
        params![user_id],
    )
}

pub fn delete_notification(conn: &Connection, notification_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM notifications WHERE id = ?1",
        params![notification_id],
    )
}

/// Notifications owned by `user_id` that reference a given message.
pub fn count_for_message(conn: &Connection, user_id: &str, message_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM notifications
         WHERE user_id = ?1 AND json_extract(data, '$.messageId') = ?2",
        params![user_id, message_id],
        |row| row.get(0),
    )
}
