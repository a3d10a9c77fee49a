//! SQL for the messages table.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

use crate::db::models::{MessageRecord, MessageType, UserSummary};
use crate::db::now_rfc3339;

const MESSAGE_SELECT: &str = "SELECT m.id, m.sender_id, m.receiver_id, m.content, m.message_type,
        m.image, m.video, m.is_read, m.created_at,
        u.id, u.username, u.full_name, u.profile_image
 FROM messages m
 JOIN users u ON u.id = m.sender_id";

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    let message_type: String = row.get(4)?;
    Ok(MessageRecord {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        content: row.get(3)?,
        message_type: MessageType::parse(&message_type).unwrap_or_default(),
        image: row.get(5)?,
        video: row.get(6)?,
        is_read: row.get(7)?,
        created_at: row.get(8)?,
        sender: UserSummary {
            id: row.get(9)?,
            username: row.get(10)?,
            full_name: row.get(11)?,
            profile_image: row.get(12)?,
        },
    })
}

/// Fields of a message about to be persisted.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender: UserSummary,
    pub receiver_id: String,
    pub content: Option<String>,
    pub message_type: MessageType,
    pub image: Option<String>,
    pub video: Option<String>,
}

pub fn insert_message(conn: &Connection, new: NewMessage) -> rusqlite::Result<MessageRecord> {
    let id = Uuid::now_v7().to_string();
    let created_at = now_rfc3339();

    conn.execute(
        "INSERT INTO messages (id, sender_id, receiver_id, content, message_type, image, video, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            new.sender.id,
            new.receiver_id,
            new.content,
            new.message_type.as_str(),
            new.image,
            new.video,
            created_at,
        ],
    )?;

    Ok(MessageRecord {
        id,
        sender_id: new.sender.id.clone(),
        receiver_id: new.receiver_id,
        content: new.content,
        message_type: new.message_type,
        image: new.image,
        video: new.video,
        is_read: false,
        created_at,
        sender: new.sender,
    })
}

pub fn find_message(conn: &Connection, message_id: &str) -> rusqlite::Result<Option<MessageRecord>> {
    conn.query_row(
        &format!("{} WHERE m.id = ?1", MESSAGE_SELECT),
        params![message_id],
        message_from_row,
    )
    .optional()
}

/// Mark every unread message from `counterpart_id` to `reader_id` as read.
/// Safe to repeat: already-read rows are not touched. Returns rows changed.
pub fn mark_conversation_read(
    conn: &Connection,
    reader_id: &str,
    counterpart_id: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE messages SET is_read = 1
         WHERE sender_id = ?1 AND receiver_id = ?2 AND is_read = 0",
        params![counterpart_id, reader_id],
    )
}

pub fn mark_message_read(conn: &Connection, message_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE messages SET is_read = 1 WHERE id = ?1 AND is_read = 0",
        params![message_id],
    )
}

pub fn delete_message(conn: &Connection, message_id: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM messages WHERE id = ?1", params![message_id])
}

/// One page of the conversation between `a` and `b`, oldest first.
/// `offset` counts back from the newest message.
pub fn conversation_page(
    conn: &Connection,
    a: &str,
    b: &str,
    limit: u32,
    offset: u32,
) -> rusqlite::Result<Vec<MessageRecord>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE (m.sender_id = ?1 AND m.receiver_id = ?2)
              OR (m.sender_id = ?2 AND m.receiver_id = ?1)
         ORDER BY m.rowid DESC
         LIMIT ?3 OFFSET ?4",
        MESSAGE_SELECT
    ))?;

    let mut messages = stmt
        .query_map(params![a, b, limit, offset], message_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    messages.reverse();
    Ok(messages)
}

pub fn conversation_count(conn: &Connection, a: &str, b: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM messages
         WHERE (sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)",
        params![a, b],
        |row| row.get(0),
    )
}

pub fn unread_count(conn: &Connection, user_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE receiver_id = ?1 AND is_read = 0",
        params![user_id],
        |row| row.get(0),
    )
}

/// Latest message and unread count for one counterpart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub user: UserSummary,
    pub last_message: MessageRecord,
    pub unread_count: i64,
}

/// One entry per counterpart `user_id` has exchanged messages with,
/// most recently active first.
pub fn conversation_summaries(
    conn: &Connection,
    user_id: &str,
) -> rusqlite::Result<Vec<ConversationSummary>> {
    let mut stmt = conn.prepare(
        "WITH threads AS (
            SELECT CASE WHEN sender_id = ?1 THEN receiver_id ELSE sender_id END AS partner_id,
                   MAX(rowid) AS last_rowid,
                   SUM(CASE WHEN receiver_id = ?1 AND is_read = 0 THEN 1 ELSE 0 END) AS unread
            FROM messages
            WHERE sender_id = ?1 OR receiver_id = ?1
            GROUP BY partner_id
         )
         SELECT m.id, m.sender_id, m.receiver_id, m.content, m.message_type,
                m.image, m.video, m.is_read, m.created_at,
                u.id, u.username, u.full_name, u.profile_image,
                p.id, p.username, p.full_name, p.profile_image,
                t.unread
         FROM threads t
         JOIN messages m ON m.rowid = t.last_rowid
         JOIN users u ON u.id = m.sender_id
         JOIN users p ON p.id = t.partner_id
         ORDER BY t.last_rowid DESC",
    )?;

    let summaries = stmt
        .query_map(params![user_id], |row| {
            Ok(ConversationSummary {
                last_message: message_from_row(row)?,
                user: UserSummary {
                    id: row.get(13)?,
                    username: row.get(14)?,
                    full_name: row.get(15)?,
                    profile_image: row.get(16)?,
                },
                unread_count: row.get(17)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, users};

    fn setup() -> (tempfile::TempDir, db::DbPool, UserSummary, UserSummary) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::init_db(dir.path().to_str().unwrap()).unwrap();
        let (a, b) = {
            let conn = pool.lock().unwrap();
            let a = users::create_user(&conn, &users::NewUser {
                username: "ana".into(),
                ..Default::default()
            })
            .unwrap();
            let b = users::create_user(&conn, &users::NewUser {
                username: "ben".into(),
                ..Default::default()
            })
            .unwrap();
            (a, b)
        };
        (dir, pool, a, b)
    }

    fn text(sender: &UserSummary, receiver: &UserSummary, body: &str) -> NewMessage {
        NewMessage {
            sender: sender.clone(),
            receiver_id: receiver.id.clone(),
            content: Some(body.to_string()),
            message_type: MessageType::Text,
            image: None,
            video: None,
        }
    }

    #[test]
    fn read_batch_is_idempotent() {
        let (_dir, pool, a, b) = setup();
        let conn = pool.lock().unwrap();
        insert_message(&conn, text(&a, &b, "one")).unwrap();
        insert_message(&conn, text(&a, &b, "two")).unwrap();
        insert_message(&conn, text(&b, &a, "reply")).unwrap();

        assert_eq!(unread_count(&conn, &b.id).unwrap(), 2);
        assert_eq!(mark_conversation_read(&conn, &b.id, &a.id).unwrap(), 2);
        assert_eq!(mark_conversation_read(&conn, &b.id, &a.id).unwrap(), 0);
        assert_eq!(unread_count(&conn, &b.id).unwrap(), 0);
        // The reply to `a` is untouched
        assert_eq!(unread_count(&conn, &a.id).unwrap(), 1);
    }

    #[test]
    fn conversation_page_is_oldest_first() {
        let (_dir, pool, a, b) = setup();
        let conn = pool.lock().unwrap();
        for body in ["1", "2", "3"] {
            insert_message(&conn, text(&a, &b, body)).unwrap();
        }

        let latest_two = conversation_page(&conn, &b.id, &a.id, 2, 0).unwrap();
        let bodies: Vec<_> = latest_two.iter().filter_map(|m| m.content.clone()).collect();
        assert_eq!(bodies, vec!["2", "3"]);
        assert_eq!(latest_two[0].sender.username, "ana");
        assert_eq!(conversation_count(&conn, &a.id, &b.id).unwrap(), 3);
    }

    #[test]
    fn summaries_pick_latest_message_per_counterpart() {
        let (_dir, pool, a, b) = setup();
        let conn = pool.lock().unwrap();
        let c = users::create_user(&conn, &users::NewUser {
            username: "cal".into(),
            ..Default::default()
        })
        .unwrap();
        insert_message(&conn, text(&b, &a, "hey")).unwrap();
        insert_message(&conn, text(&a, &b, "hi back")).unwrap();
        insert_message(&conn, text(&c, &a, "ping")).unwrap();

        let summaries = conversation_summaries(&conn, &a.id).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].user.id, c.id);
        assert_eq!(summaries[0].unread_count, 1);
        assert_eq!(summaries[1].user.id, b.id);
        assert_eq!(summaries[1].last_message.content.as_deref(), Some("hi back"));
        assert_eq!(summaries[1].unread_count, 1);
    }
}
