//! Health probe

use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "FlipLens Backend",
        "version": APP_VERSION,
        "environment": state.config.environment_name(),
    }))
}
