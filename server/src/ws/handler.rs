use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;

use crate::auth::gate;
use crate::error::{AuthFailure, RealtimeError};
use crate::state::AppState;
use crate::ws::actor;
use crate::ws::broadcast;
use crate::ws::events::ServerEvent;

/// Query parameters for WebSocket connection.
/// Auth is via query param ?token=JWT.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// WebSocket close codes:
/// 4001 = token expired
/// 4002 = token invalid or missing
/// 4003 = account blocked
pub const CLOSE_TOKEN_EXPIRED: u16 = 4001;
pub const CLOSE_TOKEN_INVALID: u16 = 4002;
pub const CLOSE_ACCOUNT_BLOCKED: u16 = 4003;

fn close_code(err: &RealtimeError) -> (u16, &'static str) {
    match err {
        RealtimeError::Authentication(AuthFailure::Expired) => (CLOSE_TOKEN_EXPIRED, "Token expired"),
        RealtimeError::Authentication(AuthFailure::Blocked) => (CLOSE_ACCOUNT_BLOCKED, "Account blocked"),
        _ => (CLOSE_TOKEN_INVALID, "Token invalid"),
    }
}

/// GET /ws?token=JWT
/// WebSocket upgrade endpoint. Authenticates via query parameter.
/// On auth failure, upgrades, sends an `error` event, then closes with the
/// matching close code. The connection is never registered.
/// On success, runs an actor for the connection.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    match gate::authenticate(&state.db, &state.jwt_secret, params.token.as_deref()).await {
        Ok(account) => {
            tracing::info!(user_id = %account.summary.id, "WebSocket connection authenticated");
            ws.on_upgrade(move |socket| actor::run_connection(socket, state, account.summary))
        }
        Err(err) => {
            let (code, reason) = close_code(&err);
            if matches!(err, RealtimeError::Authentication(_)) {
                tracing::warn!(close_code = code, reason, "WebSocket auth failed");
            } else {
                tracing::error!(error = %err, "WebSocket auth lookup failed");
            }

            ws.on_upgrade(move |socket| reject(socket, code, reason))
        }
    }
}

/// Tell the client why, then close with the error code.
async fn reject(mut socket: WebSocket, code: u16, reason: &'static str) {
    if let Some(frame) = broadcast::encode(&ServerEvent::error("Authentication error")) {
        let _ = socket.send(frame).await;
    }
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}
