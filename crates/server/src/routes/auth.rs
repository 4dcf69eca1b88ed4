//! Authentication routes — register, login, current user, logout

use crate::error::{ApiError, ApiResult};
use crate::extract::{AuthUser, MaybeUser};
use crate::routes::body_str;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use engine::auth;
use persistence::repository::{NewUser, UserRepository};
use persistence::DbError;
use serde_json::{json, Value};
use tracing::info;

/// Rough structural email check: one `@`, non-empty local part, dotted domain
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.len() <= 30
        && username.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Names may carry letters, spaces, hyphens and apostrophes
fn is_safe_name(name: &str) -> bool {
    name.len() <= 50
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == ' ' || c == '-' || c == '\'')
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(data) = body?;

    let missing: Vec<&str> = ["email", "username", "password"]
        .into_iter()
        .filter(|field| body_str(&data, field).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::bad_request(
            "Missing Fields",
            format!("Missing required fields: {}", missing.join(", ")),
            "MISSING_FIELDS",
        ));
    }

    let email = body_str(&data, "email").unwrap_or_default().to_lowercase();
    let username = body_str(&data, "username").unwrap_or_default().to_string();
    let password = data
        .get("password")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    let first_name = body_str(&data, "first_name").map(str::to_string);
    let last_name = body_str(&data, "last_name").map(str::to_string);

    if !is_valid_email(&email) {
        return Err(ApiError::bad_request(
            "Invalid Email",
            "Please provide a valid email address",
            "INVALID_EMAIL",
        ));
    }
    if !is_valid_username(&username) {
        return Err(ApiError::bad_request(
            "Invalid Username",
            "Username must be 1-30 characters and contain only letters and numbers",
            "INVALID_USERNAME",
        ));
    }
    if let Err(reason) = auth::validate_password_strength(password) {
        return Err(ApiError::bad_request("Weak Password", reason, "WEAK_PASSWORD"));
    }
    if let Some(name) = &first_name {
        if !is_safe_name(name) {
            return Err(ApiError::bad_request(
                "Invalid First Name",
                "First name contains invalid characters",
                "INVALID_FIRST_NAME",
            ));
        }
    }
    if let Some(name) = &last_name {
        if !is_safe_name(name) {
            return Err(ApiError::bad_request(
                "Invalid Last Name",
                "Last name contains invalid characters",
                "INVALID_LAST_NAME",
            ));
        }
    }

    let password_hash = auth::hash_password(password).map_err(ApiError::internal)?;

    let repo = UserRepository::new(state.db.pool());
    let user = repo
        .create(NewUser {
            email,
            username,
            password_hash,
            first_name,
            last_name,
            email_verification_token: auth::opaque_token(),
        })
        .await
        .map_err(|e| match e {
            DbError::Conflict(message) => {
                ApiError::conflict("Registration Failed", message, "REGISTRATION_FAILED")
            }
            other => ApiError::internal(other),
        })?;

    let token = auth::issue_token(
        user.id,
        &user.username,
        &user.email,
        &state.config.secret_key,
        state.config.token_ttl_secs,
    )
    .map_err(ApiError::internal)?;

    info!(username = %user.username, email = %user.email, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "user": user,
            "token": token,
            "status": "success",
        })),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(data) = body?;

    let identifier = body_str(&data, "email").or_else(|| body_str(&data, "username"));
    let password = data.get("password").and_then(|v| v.as_str());

    let (Some(identifier), Some(password)) = (identifier, password) else {
        return Err(ApiError::bad_request(
            "Missing Credentials",
            "Email/username and password are required",
            "MISSING_CREDENTIALS",
        ));
    };

    let repo = UserRepository::new(state.db.pool());
    let user = if identifier.contains('@') {
        repo.find_by_email(&identifier.to_lowercase()).await?
    } else {
        repo.find_by_username(identifier).await?
    };

    let Some(user) = user.filter(|u| auth::verify_password(password, &u.password_hash)) else {
        return Err(ApiError::unauthorized(
            "Invalid Credentials",
            "Invalid email/username or password",
            "INVALID_CREDENTIALS",
        ));
    };

    if !user.is_active {
        return Err(ApiError::forbidden(
            "Account Disabled",
            "Your account has been disabled",
            "ACCOUNT_DISABLED",
        ));
    }

    let token = auth::issue_token(
        user.id,
        &user.username,
        &user.email,
        &state.config.secret_key,
        state.config.token_ttl_secs,
    )
    .map_err(ApiError::internal)?;

    repo.touch_last_login(user.id).await?;

    info!(username = %user.username, "User logged in");

    Ok(Json(json!({
        "message": "Login successful",
        "user": user,
        "token": token,
        "status": "success",
    })))
}

/// GET /api/auth/me
pub async fn me(AuthUser(user): AuthUser) -> Json<Value> {
    Json(json!({
        "user": user,
        "status": "success",
    }))
}

/// POST /api/auth/logout — token discard happens client-side; log the event
pub async fn logout(MaybeUser(user): MaybeUser) -> Json<Value> {
    if let Some(user) = user {
        info!(username = %user.username, "User logged out");
    }
    Json(json!({
        "message": "Logout successful",
        "status": "success",
    }))
}
