//! Virtual gifts sent inside a live room.
//!
//! The balance check, both balance updates, and the gift row commit as one
//! SQLite transaction. The check is the `WHERE diamonds >= price` of the
//! decrement itself, so two concurrent sends can never both pass it.

use rusqlite::{params, Connection, TransactionBehavior};
use uuid::Uuid;

use crate::db::models::{GiftRecord, UserSummary};
use crate::db::{self, now_rfc3339};
use crate::error::RealtimeError;
use crate::state::AppState;
use crate::ws::events::{LiveGiftEvent, SendLiveGift, ServerEvent};

use super::live_room_key;

/// A validated gift about to be charged.
#[derive(Debug, Clone)]
pub struct NewGift {
    pub sender_id: String,
    pub receiver_id: String,
    pub gift_type: String,
    pub gift_name: String,
    pub price: i64,
}

/// Charge the sender, credit the receiver, and record the gift, all or nothing.
///
/// The sender spends diamonds; the receiver earns the same amount in coins.
pub fn record_gift(conn: &mut Connection, gift: NewGift) -> Result<GiftRecord, RealtimeError> {
    if gift.price <= 0 {
        return Err(RealtimeError::validation("Gift price must be positive"));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let charged = tx.execute(
        "UPDATE users SET diamonds = diamonds - ?1 WHERE id = ?2 AND diamonds >= ?1",
        params![gift.price, gift.sender_id],
    )?;
    if charged == 0 {
        let sender_exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            params![gift.sender_id],
            |row| row.get(0),
        )?;
        // Dropping `tx` rolls back
        return Err(if sender_exists {
            RealtimeError::InsufficientBalance
        } else {
            RealtimeError::not_found("Sender not found")
        });
    }

    let credited = tx.execute(
        "UPDATE users SET coins = coins + ?1 WHERE id = ?2",
        params![gift.price, gift.receiver_id],
    )?;
    if credited == 0 {
        return Err(RealtimeError::not_found("Receiver not found"));
    }

    let record = GiftRecord {
        id: Uuid::now_v7().to_string(),
        sender_id: gift.sender_id,
        receiver_id: gift.receiver_id,
        gift_type: gift.gift_type,
        gift_name: gift.gift_name,
        price: gift.price,
        created_at: now_rfc3339(),
    };
    tx.execute(
        "INSERT INTO gifts (id, sender_id, receiver_id, gift_type, gift_name, price, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.id,
            record.sender_id,
            record.receiver_id,
            record.gift_type,
            record.gift_name,
            record.price,
            record.created_at,
        ],
    )?;

    tx.commit()?;
    Ok(record)
}

pub fn count_gifts(conn: &Connection, sender_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM gifts WHERE sender_id = ?1",
        params![sender_id],
        |row| row.get(0),
    )
}

/// Commit a gift, then announce it to everyone in the live room.
pub async fn send_gift(
    state: &AppState,
    sender: &UserSummary,
    req: SendLiveGift,
) -> Result<GiftRecord, RealtimeError> {
    let room_id = req.room_id.trim().to_string();
    if room_id.is_empty() || req.receiver_id.trim().is_empty() {
        return Err(RealtimeError::validation("Room ID and receiver ID are required"));
    }
    if req.gift_type.trim().is_empty() || req.gift_name.trim().is_empty() {
        return Err(RealtimeError::validation("Gift type and name are required"));
    }

    let gift = NewGift {
        sender_id: sender.id.clone(),
        receiver_id: req.receiver_id.trim().to_string(),
        gift_type: req.gift_type.trim().to_string(),
        gift_name: req.gift_name.trim().to_string(),
        price: req.price,
    };
    let record = db::run(&state.db, move |conn| record_gift(conn, gift)).await?;

    let key = live_room_key(&room_id);
    let recipients = state.rooms.broadcast(
        &key,
        &ServerEvent::LiveGiftSent(LiveGiftEvent {
            sender: sender.clone(),
            receiver_id: record.receiver_id.clone(),
            gift_type: record.gift_type.clone(),
            gift_name: record.gift_name.clone(),
            price: record.price,
            timestamp: record.created_at.clone(),
        }),
        None,
    );

    tracing::info!(
        sender_id = %record.sender_id,
        receiver_id = %record.receiver_id,
        price = record.price,
        room = %key,
        recipients,
        "Gift sent"
    );
    Ok(record)
}
