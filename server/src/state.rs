use std::sync::Arc;

use crate::config::RealtimeConfig;
use crate::db::DbPool;
use crate::media::MediaStorage;
use crate::ws::{ConnectionRegistry, RoomRegistry};

/// Shared application state passed to all handlers via axum State extractor.
///
/// The connection registry and room membership live here rather than in
/// globals, so each server instance (and each test) owns its own.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Live connection per user (last connect wins)
    pub connections: ConnectionRegistry,
    /// Chat and live-room membership per connection
    pub rooms: RoomRegistry,
    /// Storage-delete collaborator for message media
    pub media: Arc<dyn MediaStorage>,
    /// Keepalive tuning for WebSocket actors
    pub realtime: RealtimeConfig,
}

impl AppState {
    pub fn new(
        db: DbPool,
        jwt_secret: Vec<u8>,
        media: Arc<dyn MediaStorage>,
        realtime: RealtimeConfig,
    ) -> Self {
        Self {
            db,
            jwt_secret,
            connections: ConnectionRegistry::new(),
            rooms: RoomRegistry::new(),
            media,
            realtime,
        }
    }
}
