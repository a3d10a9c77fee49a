//! The single authentication gate for both the WebSocket handshake and REST.
//!
//! Token -> claims -> account row. A missing or blocked account never passes,
//! so a blocked user can never be registered as online.

use jsonwebtoken::errors::ErrorKind;

use crate::db::{self, models::Account, users, DbPool};
use crate::error::{AuthFailure, RealtimeError};

use super::jwt;

/// Resolve an opaque bearer token to a live, unblocked account.
pub async fn authenticate(
    db: &DbPool,
    jwt_secret: &[u8],
    token: Option<&str>,
) -> Result<Account, RealtimeError> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(RealtimeError::Authentication(AuthFailure::Missing))?;

    let claims = jwt::validate_access_token(jwt_secret, token).map_err(|e| {
        let failure = match e.kind() {
            ErrorKind::ExpiredSignature => AuthFailure::Expired,
            _ => AuthFailure::Invalid,
        };
        RealtimeError::Authentication(failure)
    })?;

    let user_id = claims.sub;
    let account = db::run(db, move |conn| Ok(users::find_account(conn, &user_id)?))
        .await?
        .ok_or(RealtimeError::Authentication(AuthFailure::Invalid))?;

    if account.is_blocked {
        return Err(RealtimeError::Authentication(AuthFailure::Blocked));
    }

    Ok(account)
}
