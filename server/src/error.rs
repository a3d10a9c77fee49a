//! Error taxonomy shared by the WebSocket event handlers and the REST surface.
//!
//! Handlers return `RealtimeError`; the transport decides how to present it
//! (an `error` event on the socket, or a JSON body with a status code over HTTP).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Why an identity token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Missing,
    Invalid,
    Expired,
    Blocked,
}

#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("Authentication error")]
    Authentication(AuthFailure),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFoundOrBlocked(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Insufficient diamonds")]
    InsufficientBalance,

    #[error("database error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RealtimeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFoundOrBlocked(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Text for the `error{message}` event sent back to the originating connection.
    /// Store and internal failures collapse to the operation's generic message.
    pub fn client_message(&self, fallback: &str) -> String {
        match self {
            Self::Persistence(_) | Self::Internal(_) => fallback.to_string(),
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Authentication(AuthFailure::Blocked) => StatusCode::FORBIDDEN,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Validation(_) | Self::InsufficientBalance => StatusCode::BAD_REQUEST,
            Self::NotFoundOrBlocked(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RealtimeError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Authentication(AuthFailure::Blocked) => "Account is blocked".to_string(),
            Self::Authentication(AuthFailure::Missing) => "No token provided".to_string(),
            Self::Authentication(_) => "Invalid token".to_string(),
            Self::Persistence(e) => {
                tracing::error!(error = %e, "Request failed on database error");
                "Internal server error".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "Request failed on internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(serde_json::json!({ "success": false, "error": message })),
        )
            .into_response()
    }
}
