//! Call history: an audit record written after a call concludes.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::db::{self, models::CallRecord, users};
use crate::error::RealtimeError;
use crate::pagination::{PageInfo, PageQuery};
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

const CALL_TYPES: &[&str] = &["audio", "video"];
const CALL_STATUSES: &[&str] = &["completed", "missed", "rejected"];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCall {
    pub receiver_id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub status: String,
    /// Seconds; only meaningful for completed calls.
    #[serde(default)]
    pub duration: Option<i64>,
}

fn call_from_row(row: &Row<'_>) -> rusqlite::Result<CallRecord> {
    Ok(CallRecord {
        id: row.get(0)?,
        caller_id: row.get(1)?,
        receiver_id: row.get(2)?,
        call_type: row.get(3)?,
        status: row.get(4)?,
        duration: row.get(5)?,
        started_at: row.get(6)?,
        ended_at: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Insert a concluded call. Completed calls are stamped as having ended now
/// and started `duration` seconds earlier.
pub fn record_call(conn: &Connection, caller_id: &str, call: NewCall) -> Result<CallRecord, RealtimeError> {
    if !CALL_TYPES.contains(&call.call_type.as_str()) {
        return Err(RealtimeError::validation("Call type must be audio or video"));
    }
    if !CALL_STATUSES.contains(&call.status.as_str()) {
        return Err(RealtimeError::validation(
            "Call status must be completed, missed or rejected",
        ));
    }
    if call.duration.is_some_and(|d| d < 0) {
        return Err(RealtimeError::validation("Call duration cannot be negative"));
    }
    if call.receiver_id == caller_id {
        return Err(RealtimeError::validation("Cannot call yourself"));
    }
    if users::find_account(conn, &call.receiver_id)?.is_none() {
        return Err(RealtimeError::not_found("Receiver not found"));
    }

    let now = Utc::now();
    let (started_at, ended_at) = if call.status == "completed" {
        let started = Duration::try_seconds(call.duration.unwrap_or(0))
            .and_then(|elapsed| now.checked_sub_signed(elapsed))
            .ok_or_else(|| RealtimeError::validation("Call duration is out of range"))?;
        (
            Some(started.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Some(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        )
    } else {
        (None, None)
    };

    let record = CallRecord {
        id: Uuid::now_v7().to_string(),
        caller_id: caller_id.to_string(),
        receiver_id: call.receiver_id,
        call_type: call.call_type,
        status: call.status,
        duration: call.duration,
        started_at,
        ended_at,
        created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    conn.execute(
        "INSERT INTO call_history
            (id, caller_id, receiver_id, call_type, status, duration_secs, started_at, ended_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            record.id,
            record.caller_id,
            record.receiver_id,
            record.call_type,
            record.status,
            record.duration,
            record.started_at,
            record.ended_at,
            record.created_at,
        ],
    )?;
    Ok(record)
}

/// Calls the user placed or received, newest first.
pub fn list_calls(
    conn: &Connection,
    user_id: &str,
    limit: u32,
    offset: u32,
) -> rusqlite::Result<Vec<CallRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, caller_id, receiver_id, call_type, status, duration_secs, started_at, ended_at, created_at
         FROM call_history
         WHERE caller_id = ?1 OR receiver_id = ?1
         ORDER BY rowid DESC
         LIMIT ?2 OFFSET ?3",
    )?;
    let calls = stmt
        .query_map(params![user_id, limit, offset], call_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(calls)
}

pub fn count_calls(conn: &Connection, user_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM call_history WHERE caller_id = ?1 OR receiver_id = ?1",
        params![user_id],
        |row| row.get(0),
    )
}

/// POST /api/live/call-history
pub async fn create_call_record(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<NewCall>,
) -> Result<(StatusCode, Json<Value>), RealtimeError> {
    let caller_id = user.id().to_string();
    let record = db::run(&state.db, move |conn| record_call(conn, &caller_id, body)).await?;

    tracing::debug!(call_id = %record.id, status = %record.status, "Call recorded");
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "data": record }))))
}

/// GET /api/live/call-history?page&limit
pub async fn get_call_history(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, RealtimeError> {
    let page = query.resolve(DEFAULT_LIMIT, MAX_LIMIT);
    let user_id = user.id().to_string();

    let (calls, total) = db::run(&state.db, move |conn| {
        let calls = list_calls(conn, &user_id, page.limit, page.offset)?;
        let total = count_calls(conn, &user_id)?;
        Ok((calls, total))
    })
    .await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "calls": calls,
            "pagination": PageInfo::new(page, total),
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users::NewUser;

    #[test]
    fn completed_calls_get_a_time_window() {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::init_db(dir.path().to_str().unwrap()).unwrap();
        let conn = pool.lock().unwrap();
        let a = users::create_user(&conn, &NewUser { username: "a".into(), ..Default::default() }).unwrap();
        let b = users::create_user(&conn, &NewUser { username: "b".into(), ..Default::default() }).unwrap();

        let done = record_call(&conn, &a.id, NewCall {
            receiver_id: b.id.clone(),
            call_type: "video".into(),
            status: "completed".into(),
            duration: Some(90),
        })
        .unwrap();
        assert!(done.started_at.is_some() && done.ended_at.is_some());
        assert!(done.started_at < done.ended_at);

        let missed = record_call(&conn, &b.id, NewCall {
            receiver_id: a.id.clone(),
            call_type: "audio".into(),
            status: "missed".into(),
            duration: None,
        })
        .unwrap();
        assert!(missed.started_at.is_none());

        let history = list_calls(&conn, &a.id, 10, 0).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, missed.id);
        assert_eq!(count_calls(&conn, &b.id).unwrap(), 2);

        assert!(matches!(
            record_call(&conn, &a.id, NewCall {
                receiver_id: b.id.clone(),
                call_type: "hologram".into(),
                status: "completed".into(),
                duration: None,
            }),
            Err(RealtimeError::Validation(_))
        ));
    }
}
