use axum::{middleware, Router};

use crate::auth::middleware::AuthContext;
use crate::calls::history;
use crate::dm::{conversations, messages};
use crate::moderation::accounts;
use crate::notifications::routes as notifications;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Inject what the auth extractors need into request extensions.
async fn inject_auth_context(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut().insert(AuthContext {
        db: state.db.clone(),
        jwt_secret: state.jwt_secret.clone(),
    });
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let message_routes = Router::new()
        .route(
            "/api/messages/conversations",
            axum::routing::get(conversations::list_conversations),
        )
        .route(
            "/api/messages/conversations/{user_id}",
            axum::routing::get(messages::get_conversation),
        )
        .route("/api/messages/send", axum::routing::post(messages::send_message))
        .route(
            "/api/messages/unread-count",
            axum::routing::get(messages::get_unread_count),
        )
        .route(
            "/api/messages/{id}/read",
            axum::routing::put(messages::mark_message_read),
        )
        .route(
            "/api/messages/{id}",
            axum::routing::delete(messages::delete_message),
        );

    let notification_routes = Router::new()
        .route(
            "/api/notifications",
            axum::routing::get(notifications::list_notifications),
        )
        .route(
            "/api/notifications/unread-count",
            axum::routing::get(notifications::get_unread_count),
        )
        .route(
            "/api/notifications/bulk",
            axum::routing::post(notifications::send_bulk_notification),
        )
        .route(
            "/api/notifications/read-all",
            axum::routing::put(notifications::mark_all_notifications_read),
        )
        .route(
            "/api/notifications/{id}/read",
            axum::routing::put(notifications::mark_notification_read),
        )
        .route(
            "/api/notifications/{id}",
            axum::routing::delete(notifications::delete_notification),
        );

    let call_routes = Router::new().route(
        "/api/live/call-history",
        axum::routing::get(history::get_call_history).post(history::create_call_record),
    );

    let admin_routes = Router::new()
        .route(
            "/api/admin/users/{id}/block",
            axum::routing::put(accounts::block_account),
        )
        .route(
            "/api/admin/users/{id}/unblock",
            axum::routing::put(accounts::unblock_account),
        );

    // WebSocket route (auth via query param, not the extractor)
    let ws_routes = Router::new().route("/ws", axum::routing::get(ws_handler::ws_upgrade));

    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(message_routes)
        .merge(notification_routes)
        .merge(call_routes)
        .merge(admin_routes)
        .merge(ws_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_auth_context,
        ))
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
