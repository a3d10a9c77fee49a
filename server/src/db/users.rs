//! Account queries used by the auth gate, presence, routing, and moderation.
//!
//! Functions take a borrowed `Connection` so callers can compose several of
//! them inside one `db::run` closure (or one transaction).

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::models::{Account, Balances, UserSummary};
use crate::db::now_rfc3339;

/// Fields for creating an account. Registration proper lives with the identity
/// provider; this is the row the rest of the server reads.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub full_name: Option<String>,
    pub profile_image: Option<String>,
    pub diamonds: i64,
    pub is_admin: bool,
}

const ACCOUNT_COLUMNS: &str = "id, username, full_name, profile_image, is_blocked, is_admin";

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: row.get(0)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
        profile_image: row.get(3)?,
    })
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        summary: summary_from_row(row)?,
        is_blocked: row.get(4)?,
        is_admin: row.get(5)?,
    })
}

pub fn create_user(conn: &Connection, new: &NewUser) -> rusqlite::Result<UserSummary> {
    let id = Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO users (id, username, full_name, profile_image, diamonds, is_admin, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            new.username,
            new.full_name,
            new.profile_image,
            new.diamonds,
            new.is_admin,
            now_rfc3339(),
        ],
    )?;

    Ok(UserSummary {
        id,
        username: new.username.clone(),
        full_name: new.full_name.clone(),
        profile_image: new.profile_image.clone(),
    })
}

pub fn find_account(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<Account>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", ACCOUNT_COLUMNS),
        params![user_id],
        account_from_row,
    )
    .optional()
}

/// Persist the online flag and stamp last activity.
pub fn set_online(conn: &Connection, user_id: &str, online: bool) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET is_online = ?1, last_active = ?2 WHERE id = ?3",
        params![online, now_rfc3339(), user_id],
    )?;
    Ok(())
}

pub fn is_online(conn: &Connection, user_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT is_online FROM users WHERE id = ?1",
        params![user_id],
        |row| row.get(0),
    )
}

pub fn balances(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<Balances>> {
    conn.query_row(
        "SELECT diamonds, coins FROM users WHERE id = ?1",
        params![user_id],
        |row| {
            Ok(Balances {
                diamonds: row.get(0)?,
                coins: row.get(1)?,
            })
        },
    )
    .optional()
}

/// Record that `blocker_id` blocks `blocked_id`. Idempotent.
pub fn block_user(conn: &Connection, blocker_id: &str, blocked_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO blocked_users (blocker_id, blocked_id, created_at) VALUES (?1, ?2, ?3)",
        params![blocker_id, blocked_id, now_rfc3339()],
    )?;
    Ok(())
}

/// True when either party blocks the other.
pub fn block_exists_between(conn: &Connection, a: &str, b: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM blocked_users
            WHERE (blocker_id = ?1 AND blocked_id = ?2) OR (blocker_id = ?2 AND blocked_id = ?1)
         )",
        params![a, b],
        |row| row.get(0),
    )
}

/// Flip the account-level block flag. Blocking also clears the online flag.
/// Returns false when the user does not exist.
pub fn set_account_blocked(conn: &Connection, user_id: &str, blocked: bool) -> rusqlite::Result<bool> {
    let changed = if blocked {
        conn.execute(
            "UPDATE users SET is_blocked = 1, is_online = 0 WHERE id = ?1",
            params![user_id],
        )?
    } else {
        conn.execute(
            "UPDATE users SET is_blocked = 0 WHERE id = ?1",
            params![user_id],
        )?
    };
    Ok(changed > 0)
}
