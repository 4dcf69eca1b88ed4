//! Authentication extractors
//!
//! `AuthUser` rejects unauthenticated requests; `MaybeUser` never rejects and
//! hands the handler an `Option` instead.

use crate::error::ApiError;
use crate::state::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use persistence::repository::{UserRecord, UserRepository};
use tracing::warn;

/// The authenticated account behind the bearer token
pub struct AuthUser(pub UserRecord);

/// Auth-optional variant for routes that only personalize when logged in
pub struct MaybeUser(pub Option<UserRecord>);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

async fn lookup_user(state: &AppState, token: &str) -> Option<UserRecord> {
    let claims = engine::verify_token(token, &state.config.secret_key).ok()?;
    UserRepository::new(state.db.pool())
        .find_by_id(claims.user_id)
        .await
        .ok()
        .flatten()
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let Some(token) = bearer_token(parts) else {
            return Err(ApiError::unauthorized(
                "Missing Token",
                "Authorization token is required",
                "MISSING_TOKEN",
            ));
        };

        let Some(user) = lookup_user(state, token).await else {
            warn!("Rejected request with invalid or expired token");
            return Err(ApiError::unauthorized(
                "Invalid Token",
                "Invalid or expired token",
                "INVALID_TOKEN",
            ));
        };

        if !user.is_active {
            return Err(ApiError::forbidden(
                "Account Disabled",
                "Your account has been disabled",
                "ACCOUNT_DISABLED",
            ));
        }

        Ok(AuthUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = match bearer_token(parts) {
            Some(token) => lookup_user(state, token).await.filter(|u| u.is_active),
            None => None,
        };
        Ok(MaybeUser(user))
    }
}
