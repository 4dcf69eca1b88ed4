//! Profile routes — account details, password changes, deletion, stats

use crate::error::{ApiError, ApiResult};
use crate::extract::AuthUser;
use crate::routes::{body_opt_str, body_str};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use engine::auth;
use persistence::repository::{
    AlertRepository, PortfolioRepository, ProfileChanges, SavedItemRepository,
    SearchHistoryRepository, SettingsRepository, UserRecord, UserRepository,
};
use serde_json::{json, Value};
use tracing::info;

async fn profile_json(state: &AppState, user: &UserRecord) -> ApiResult<Value> {
    let settings = SettingsRepository::new(state.db.pool())
        .get_or_create(user.id)
        .await?;

    Ok(json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
        "first_name": user.first_name,
        "last_name": user.last_name,
        "is_active": user.is_active,
        "is_verified": user.is_verified,
        "created_at": user.created_at,
        "last_login": user.last_login,
        "settings": super::settings::settings_json(&settings),
    }))
}

/// GET /api/profile
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    let profile = profile_json(&state, &user).await?;
    Ok(Json(json!({
        "profile": profile,
        "status": "success",
    })))
}

/// PUT /api/profile
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(data) = body?;
    let repo = UserRepository::new(state.db.pool());

    let mut changes = ProfileChanges::default();

    if let Some(username) = body_str(&data, "username") {
        if username != user.username {
            if repo.find_by_username(username).await?.is_some() {
                return Err(ApiError::bad_request(
                    "Username Taken",
                    "Username is already taken",
                    "USERNAME_EXISTS",
                ));
            }
            changes.username = Some(username.to_string());
        }
    }
    if let Some(email) = body_str(&data, "email") {
        let email = email.to_lowercase();
        if email != user.email {
            if repo.find_by_email(&email).await?.is_some() {
                return Err(ApiError::bad_request(
                    "Email Taken",
                    "Email is already registered",
                    "EMAIL_EXISTS",
                ));
            }
            changes.email = Some(email);
        }
    }
    if data.get("first_name").is_some() {
        changes.first_name = Some(body_opt_str(&data, "first_name").filter(|s| !s.is_empty()));
    }
    if data.get("last_name").is_some() {
        changes.last_name = Some(body_opt_str(&data, "last_name").filter(|s| !s.is_empty()));
    }

    let updated = repo.update_profile(user.id, changes).await?;
    let profile = profile_json(&state, &updated).await?;

    info!(user_id = user.id, "Profile updated");

    Ok(Json(json!({
        "profile": profile,
        "message": "Profile updated successfully",
        "status": "success",
    })))
}

/// PUT /api/profile/password
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(data) = body?;

    let current = data.get("current_password").and_then(|v| v.as_str());
    let new = data.get("new_password").and_then(|v| v.as_str());
    let (Some(current), Some(new)) = (current, new) else {
        return Err(ApiError::bad_request(
            "Missing Fields",
            "current_password and new_password are required",
            "MISSING_FIELDS",
        ));
    };

    if !auth::verify_password(current, &user.password_hash) {
        return Err(ApiError::unauthorized(
            "Invalid Password",
            "Current password is incorrect",
            "INVALID_CURRENT_PASSWORD",
        ));
    }
    if let Err(reason) = auth::validate_password_strength(new) {
        return Err(ApiError::bad_request("Weak Password", reason, "WEAK_PASSWORD"));
    }

    let password_hash = auth::hash_password(new).map_err(ApiError::internal)?;
    UserRepository::new(state.db.pool())
        .set_password_hash(user.id, &password_hash)
        .await?;

    info!(user_id = user.id, "Password changed");

    Ok(Json(json!({
        "message": "Password changed successfully",
        "status": "success",
    })))
}

/// DELETE /api/profile/delete — password-confirmed, cascades everything
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(data) = body?;

    let Some(password) = data.get("password").and_then(|v| v.as_str()) else {
        return Err(ApiError::bad_request(
            "Missing Password",
            "Password confirmation is required to delete the account",
            "MISSING_PASSWORD",
        ));
    };
    if !auth::verify_password(password, &user.password_hash) {
        return Err(ApiError::unauthorized(
            "Invalid Password",
            "Password is incorrect",
            "INVALID_PASSWORD",
        ));
    }

    UserRepository::new(state.db.pool()).delete(user.id).await?;

    info!(username = %user.username, "Account deleted");

    Ok(Json(json!({
        "message": "Account deleted successfully",
        "status": "success",
    })))
}

/// GET /api/profile/stats
pub async fn profile_stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    let pool = state.db.pool();
    let saved_items = SavedItemRepository::new(pool).count_for_user(user.id).await?;
    let portfolio = PortfolioRepository::new(pool).summary(user.id).await?;
    let alerts = AlertRepository::new(pool).stats(user.id).await?;
    let searches = SearchHistoryRepository::new(pool).count_for_user(user.id).await?;

    Ok(Json(json!({
        "stats": {
            "saved_items": saved_items,
            "portfolio": portfolio,
            "alerts": alerts,
            "searches": searches,
            "member_since": user.created_at,
        },
        "status": "success",
    })))
}
