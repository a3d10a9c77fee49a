use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

use crate::auth::gate;
use crate::db::models::{Account, UserSummary};
use crate::db::DbPool;
use crate::error::RealtimeError;

/// JWT claims carried in access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID (UUIDv7)
    pub sub: String,
    /// Whether the user may call admin endpoints
    pub is_admin: bool,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// What the auth extractors need from the app, stored in request extensions
/// by the router middleware.
#[derive(Clone)]
pub struct AuthContext {
    pub db: DbPool,
    pub jwt_secret: Vec<u8>,
}

/// An authenticated, unblocked caller resolved from `Authorization: Bearer`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Account);

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.0.summary.id
    }

    pub fn summary(&self) -> &UserSummary {
        &self.0.summary
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = RealtimeError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);

        let ctx = parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| RealtimeError::Internal("auth context missing".to_string()))?;

        let account = gate::authenticate(&ctx.db, &ctx.jwt_secret, token.as_deref()).await?;
        Ok(AuthUser(account))
    }
}

/// An authenticated caller whose account carries the admin flag.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Account);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = RealtimeError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(account) = AuthUser::from_request_parts(parts, state).await?;
        if !account.is_admin {
            return Err(RealtimeError::forbidden("Admin access required"));
        }
        Ok(AdminUser(account))
    }
}

