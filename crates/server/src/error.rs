//! JSON error mapping
//!
//! Every failure becomes a `{"error", "message", "status": "error", "code"}`
//! body with the matching HTTP status. Unexpected errors are logged with
//! their cause; the cause is echoed to the client only outside production.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use persistence::DbError;
use serde_json::json;
use std::sync::OnceLock;
use tracing::{error, warn};

/// Set once at startup; suppresses internal error details when true
static PRODUCTION_MODE: OnceLock<bool> = OnceLock::new();

pub fn set_production_mode(production: bool) {
    PRODUCTION_MODE.set(production).ok();
}

fn is_production() -> bool {
    *PRODUCTION_MODE.get().unwrap_or(&false)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    /// Short human-readable title ("Invalid Email", "Item Not Found", ...)
    error: &'static str,
    message: String,
    code: &'static str,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(error: &'static str, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
            message: message.into(),
            code,
        }
    }

    pub fn unauthorized(error: &'static str, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error,
            message: message.into(),
            code,
        }
    }

    pub fn forbidden(error: &'static str, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            error,
            message: message.into(),
            code,
        }
    }

    pub fn not_found(error: &'static str, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error,
            message: message.into(),
            code,
        }
    }

    pub fn conflict(error: &'static str, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            error,
            message: message.into(),
            code,
        }
    }

    /// Upstream dependency failure (marketplace unreachable or erroring)
    pub fn upstream(error: &'static str, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            error,
            message: message.into(),
            code,
        }
    }

    pub fn internal(cause: impl std::fmt::Display) -> Self {
        error!("Internal server error: {cause}");
        let message = if is_production() {
            "An unexpected error occurred".to_string()
        } else {
            cause.to_string()
        };
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "Internal Server Error",
            message,
            code: "INTERNAL_SERVER_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.error,
            "message": self.message,
            "status": "error",
            "code": self.code,
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict(message) => ApiError::conflict("Conflict", message, "CONFLICT"),
            DbError::NotFound(what) => ApiError::not_found(
                "Not Found",
                format!("The requested {what} was not found"),
                "NOT_FOUND",
            ),
            other => ApiError::internal(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                warn!("Request Content-Type is not application/json");
                Self {
                    status: StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    error: "Invalid Content-Type",
                    message: "Content-Type must be application/json".to_string(),
                    code: "INVALID_CONTENT_TYPE",
                }
            }
            other => {
                warn!("Invalid JSON body: {other}");
                ApiError::bad_request(
                    "Invalid JSON",
                    "Request body contains invalid JSON.",
                    "INVALID_JSON",
                )
            }
        }
    }
}
