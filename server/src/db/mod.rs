pub mod migrations;
pub mod models;
pub mod users;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::RealtimeError;

/// Type alias for the shared database connection.
/// rusqlite is synchronous; we wrap in Arc<Mutex> for thread safety
/// with tokio::task::spawn_blocking for DB operations.
pub type DbPool = Arc<Mutex<Connection>>;

/// Initialize the SQLite database: create data directory if needed,
/// open (or create) the database file, enable WAL mode, and run migrations.
pub fn init_db(data_dir: &str) -> Result<DbPool, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(data_dir)?;

    let db_path = Path::new(data_dir).join("social.db");
    let mut conn = Connection::open(&db_path)?;

    // WAL for concurrent readers; wait on the writer lock instead of failing
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    migrations::migrations().to_latest(&mut conn)?;

    tracing::info!("Database initialized at {}", db_path.display());

    Ok(Arc::new(Mutex::new(conn)))
}

/// Run a closure against the connection on the blocking pool.
///
/// Suspends only the calling task; other connections' events keep flowing
/// on the async runtime while the query runs.
pub async fn run<T, F>(db: &DbPool, f: F) -> Result<T, RealtimeError>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T, RealtimeError> + Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = db
            .lock()
            .map_err(|e| RealtimeError::Internal(format!("DB lock error: {}", e)))?;
        f(&mut conn)
    })
    .await
    .map_err(|e| RealtimeError::Internal(format!("Task join: {}", e)))?
}

/// Current time in the format stored in every timestamp column.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
