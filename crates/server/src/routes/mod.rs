//! HTTP route handlers

pub mod alerts;
pub mod auth;
pub mod health;
pub mod market_trends;
pub mod portfolio;
pub mod profile;
pub mod saved_items;
pub mod search;
pub mod settings;

use crate::error::ApiError;
use crate::state::AppState;
use axum::routing::{delete, get, post, put};
use axum::Router;
use serde_json::{json, Value};

/// Assemble every `/api` route
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        .route("/search", post(search::search_post).get(search::search_get))
        .route(
            "/saved-items",
            get(saved_items::list_items).post(saved_items::save_item),
        )
        .route(
            "/saved-items/:id",
            get(saved_items::get_item)
                .put(saved_items::update_item)
                .delete(saved_items::delete_item),
        )
        .route(
            "/portfolio",
            get(portfolio::list_items).post(portfolio::add_item),
        )
        .route(
            "/portfolio/:id",
            get(portfolio::get_item)
                .put(portfolio::update_item)
                .delete(portfolio::delete_item),
        )
        .route("/alerts", get(alerts::list_alerts).post(alerts::create_alert))
        .route(
            "/alerts/:id",
            get(alerts::get_alert)
                .put(alerts::update_alert)
                .delete(alerts::delete_alert),
        )
        .route("/alerts/:id/toggle", post(alerts::toggle_alert))
        .route("/alerts/:id/notifications", get(alerts::alert_notifications))
        .route("/market-trends/platforms", get(market_trends::platforms))
        .route("/market-trends/conditions", get(market_trends::conditions))
        .route("/market-trends/:item", get(market_trends::trends))
        .route("/market-trends/:item/summary", get(market_trends::summary))
        .route(
            "/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        .route("/settings/reset", post(settings::reset_settings))
        .route("/settings/currencies", get(settings::currencies))
        .route("/settings/languages", get(settings::languages))
        .route("/settings/timezones", get(settings::timezones))
        .route("/settings/export", get(settings::export_settings))
        .route(
            "/profile",
            get(profile::get_profile).put(profile::update_profile),
        )
        .route("/profile/password", put(profile::change_password))
        .route("/profile/delete", delete(profile::delete_account))
        .route("/profile/stats", get(profile::profile_stats))
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Non-empty trimmed string field from a JSON body
pub(crate) fn body_str<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Optional string field, trimmed, `None` when absent or not a string
pub(crate) fn body_opt_str(data: &Value, key: &str) -> Option<String> {
    data.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
}

/// Price-like field accepted as either a JSON number or a numeric string
pub(crate) fn body_price(data: &Value, key: &str) -> Option<String> {
    match data.get(key) {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        _ => None,
    }
}

/// Standard pagination block for list responses
pub(crate) fn pagination_json(page: i64, per_page: i64, total: i64) -> Value {
    let pages = if total == 0 {
        0
    } else {
        (total + per_page - 1) / per_page
    };
    json!({
        "page": page,
        "per_page": per_page,
        "total": total,
        "pages": pages,
        "has_next": page < pages,
        "has_prev": page > 1,
    })
}

/// `page`/`per_page` query parameters with the usual clamping
pub(crate) fn page_params(params: &std::collections::HashMap<String, String>) -> (i64, i64, i64) {
    let page: i64 = params
        .get("page")
        .and_then(|s| s.parse().ok())
        .unwrap_or(1)
        .max(1);
    let per_page: i64 = params
        .get("per_page")
        .and_then(|s| s.parse().ok())
        .unwrap_or(20)
        .clamp(1, 100);
    (page, per_page, (page - 1) * per_page)
}

/// Numeric path segment; the id namespace is database rowids
pub(crate) fn parse_id(raw: &str, what: &'static str) -> Result<i64, ApiError> {
    raw.parse::<i64>().map_err(|_| {
        ApiError::bad_request("Invalid Id", format!("{what} id must be numeric"), "INVALID_ID")
    })
}

/// JSON-valued TEXT column parsed back into a JSON value for responses
pub(crate) fn parse_json_column(raw: Option<&str>) -> Value {
    raw.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or(Value::Null)
}
