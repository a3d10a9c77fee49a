use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::chat::presence;
use crate::db::models::UserSummary;
use crate::state::AppState;
use crate::ws::events::ServerEvent;
use crate::ws::protocol;
use crate::ws::{ConnectionHandle, Session};

/// How long cleanup waits for queued frames (e.g. a close frame) to flush.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Run the actor-per-connection pattern for an authenticated WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Ping task: keepalive, closes the socket when a pong is late
/// - Reader loop: decodes and handles events one at a time, in arrival order
///
/// The connection's handle (a clone of the channel sender) is what the
/// registry and rooms hold to push events to this client.
pub async fn run_connection(socket: WebSocket, state: AppState, user: UserSummary) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let session = Session {
        handle: ConnectionHandle::new(user.id.clone(), tx.clone()),
        user,
    };
    let user_id = session.user_id().to_string();
    let connection_id = session.handle.id();

    // Spawn writer task first so nothing queued during go_online is lost
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    presence::go_online(&state, &session).await;

    tracing::info!(
        user_id = %user_id,
        connection_id = %connection_id,
        "WebSocket actor started"
    );

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    let ping_tx = tx.clone();
    let ping_interval = state.realtime.ping_interval();
    let pong_timeout = state.realtime.pong_timeout();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(ping_interval);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died, connection is gone
                break;
            }

            match timeout(pong_timeout, pong_rx.recv()).await {
                Ok(Some(())) => {}
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket messages
    loop {
        // Eviction wins over frames that are already buffered
        let msg = tokio::select! {
            biased;
            _ = session.handle.evicted() => {
                tracing::info!(user_id = %user_id, "Connection evicted, stopping reader");
                break;
            }
            msg = ws_receiver.next() => msg,
        };

        match msg {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_message(text.as_str(), &state, &session).await;
                }
                Message::Binary(_) => {
                    session
                        .handle
                        .send(&ServerEvent::error("Binary frames are not supported"));
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        user_id = %user_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(user_id = %user_id, "WebSocket stream ended");
                break;
            }
        }
    }

    ping_handle.abort();

    // Registry and room removal happen inside go_offline before any broadcast
    let went_offline = presence::go_offline(&state, &session).await;

    // Drop our senders so the writer drains what is queued, then exits
    drop(session);
    drop(tx);
    let mut writer_handle = writer_handle;
    if timeout(WRITER_DRAIN_TIMEOUT, &mut writer_handle).await.is_err() {
        writer_handle.abort();
    }

    tracing::info!(
        user_id = %user_id,
        connection_id = %connection_id,
        went_offline,
        "WebSocket actor stopped"
    );
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
/// Stops after a close frame has been written.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let is_close = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed, connection is broken
            break;
        }
        if is_close {
            break;
        }
    }
    let _ = ws_sender.close().await;
}
