//! User settings routes

use crate::error::{ApiError, ApiResult};
use crate::extract::AuthUser;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use persistence::repository::{SettingsChanges, SettingsRepository, UserSettingsRecord};
use serde_json::{json, Value};
use tracing::info;

/// Settings row rendered in the grouped layout the frontend consumes
pub(crate) fn settings_json(s: &UserSettingsRecord) -> Value {
    json!({
        "id": s.id,
        "user_id": s.user_id,
        "notifications": {
            "email_notifications": s.email_notifications,
            "push_notifications": s.push_notifications,
            "price_alert_notifications": s.price_alert_notifications,
            "market_update_notifications": s.market_update_notifications,
            "newsletter_notifications": s.newsletter_notifications,
        },
        "app_preferences": {
            "dark_mode": s.dark_mode,
            "currency": s.currency,
            "language": s.language,
            "timezone": s.timezone,
        },
        "display_preferences": {
            "items_per_page": s.items_per_page,
            "default_sort_order": s.default_sort_order,
            "show_profit_percentage": s.show_profit_percentage,
            "show_rating": s.show_rating,
        },
        "privacy_settings": {
            "profile_visibility": s.profile_visibility,
            "share_analytics": s.share_analytics,
        },
        "platform_integrations": {
            "ebay": {"connected": s.ebay_connected, "username": s.ebay_username},
            "poshmark": {"connected": s.poshmark_connected, "username": s.poshmark_username},
            "mercari": {"connected": s.mercari_connected, "username": s.mercari_username},
        },
        "advanced_settings": {
            "auto_update_market_prices": s.auto_update_market_prices,
            "price_update_frequency": s.price_update_frequency,
            "enable_experimental_features": s.enable_experimental_features,
        },
        "created_at": s.created_at,
        "updated_at": s.updated_at,
    })
}

fn group_bool(data: &Value, group: &str, key: &str) -> Option<bool> {
    data.get(group).and_then(|g| g.get(key)).and_then(|v| v.as_bool())
}

fn group_str(data: &Value, group: &str, key: &str) -> Option<String> {
    data.get(group)
        .and_then(|g| g.get(key))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn group_i64(data: &Value, group: &str, key: &str) -> Option<i64> {
    data.get(group).and_then(|g| g.get(key)).and_then(|v| v.as_i64())
}

/// Map the grouped payload onto column-level changes
fn parse_changes(data: &Value) -> SettingsChanges {
    let mut changes = SettingsChanges {
        email_notifications: group_bool(data, "notifications", "email_notifications"),
        push_notifications: group_bool(data, "notifications", "push_notifications"),
        price_alert_notifications: group_bool(data, "notifications", "price_alert_notifications"),
        market_update_notifications: group_bool(data, "notifications", "market_update_notifications"),
        newsletter_notifications: group_bool(data, "notifications", "newsletter_notifications"),
        dark_mode: group_bool(data, "app_preferences", "dark_mode"),
        currency: group_str(data, "app_preferences", "currency"),
        language: group_str(data, "app_preferences", "language"),
        timezone: group_str(data, "app_preferences", "timezone"),
        items_per_page: group_i64(data, "display_preferences", "items_per_page"),
        default_sort_order: group_str(data, "display_preferences", "default_sort_order"),
        show_profit_percentage: group_bool(data, "display_preferences", "show_profit_percentage"),
        show_rating: group_bool(data, "display_preferences", "show_rating"),
        profile_visibility: group_str(data, "privacy_settings", "profile_visibility"),
        share_analytics: group_bool(data, "privacy_settings", "share_analytics"),
        auto_update_market_prices: group_bool(data, "advanced_settings", "auto_update_market_prices"),
        price_update_frequency: group_str(data, "advanced_settings", "price_update_frequency"),
        enable_experimental_features: group_bool(data, "advanced_settings", "enable_experimental_features"),
        ..Default::default()
    };

    if let Some(platforms) = data.get("platform_integrations") {
        if let Some(ebay) = platforms.get("ebay") {
            changes.ebay_connected = ebay.get("connected").and_then(|v| v.as_bool());
            if let Some(username) = ebay.get("username") {
                changes.ebay_username = Some(username.as_str().map(str::to_string));
            }
        }
        if let Some(poshmark) = platforms.get("poshmark") {
            changes.poshmark_connected = poshmark.get("connected").and_then(|v| v.as_bool());
            if let Some(username) = poshmark.get("username") {
                changes.poshmark_username = Some(username.as_str().map(str::to_string));
            }
        }
        if let Some(mercari) = platforms.get("mercari") {
            changes.mercari_connected = mercari.get("connected").and_then(|v| v.as_bool());
            if let Some(username) = mercari.get("username") {
                changes.mercari_username = Some(username.as_str().map(str::to_string));
            }
        }
    }

    changes
}

/// GET /api/settings
pub async fn get_settings(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    let settings = SettingsRepository::new(state.db.pool())
        .get_or_create(user.id)
        .await?;

    Ok(Json(json!({
        "settings": settings_json(&settings),
        "status": "success",
    })))
}

/// PUT /api/settings
pub async fn update_settings(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(data) = body?;

    if let Some(per_page) = group_i64(&data, "display_preferences", "items_per_page") {
        if !(1..=100).contains(&per_page) {
            return Err(ApiError::bad_request(
                "Invalid Items Per Page",
                "items_per_page must be between 1 and 100",
                "INVALID_ITEMS_PER_PAGE",
            ));
        }
    }
    if let Some(visibility) = group_str(&data, "privacy_settings", "profile_visibility") {
        if visibility != "private" && visibility != "public" {
            return Err(ApiError::bad_request(
                "Invalid Profile Visibility",
                "profile_visibility must be 'private' or 'public'",
                "INVALID_PROFILE_VISIBILITY",
            ));
        }
    }

    let settings = SettingsRepository::new(state.db.pool())
        .update(user.id, parse_changes(&data))
        .await?;

    info!(user_id = user.id, "Settings updated");

    Ok(Json(json!({
        "settings": settings_json(&settings),
        "message": "Settings updated successfully",
        "status": "success",
    })))
}

/// POST /api/settings/reset
pub async fn reset_settings(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    let settings = SettingsRepository::new(state.db.pool()).reset(user.id).await?;

    info!(user_id = user.id, "Settings reset to defaults");

    Ok(Json(json!({
        "settings": settings_json(&settings),
        "message": "Settings reset to defaults",
        "status": "success",
    })))
}

/// GET /api/settings/currencies
pub async fn currencies() -> Json<Value> {
    Json(json!({
        "currencies": [
            {"code": "USD", "name": "US Dollar", "symbol": "$"},
            {"code": "EUR", "name": "Euro", "symbol": "€"},
            {"code": "GBP", "name": "British Pound", "symbol": "£"},
            {"code": "CAD", "name": "Canadian Dollar", "symbol": "C$"},
            {"code": "AUD", "name": "Australian Dollar", "symbol": "A$"},
            {"code": "JPY", "name": "Japanese Yen", "symbol": "¥"},
        ],
        "status": "success",
    }))
}

/// GET /api/settings/languages
pub async fn languages() -> Json<Value> {
    Json(json!({
        "languages": [
            {"code": "en", "name": "English"},
            {"code": "es", "name": "Spanish"},
            {"code": "fr", "name": "French"},
            {"code": "de", "name": "German"},
            {"code": "it", "name": "Italian"},
            {"code": "pt", "name": "Portuguese"},
        ],
        "status": "success",
    }))
}

/// GET /api/settings/timezones
pub async fn timezones() -> Json<Value> {
    Json(json!({
        "timezones": [
            {"id": "UTC", "name": "Coordinated Universal Time"},
            {"id": "America/New_York", "name": "Eastern Time"},
            {"id": "America/Chicago", "name": "Central Time"},
            {"id": "America/Denver", "name": "Mountain Time"},
            {"id": "America/Los_Angeles", "name": "Pacific Time"},
            {"id": "Europe/London", "name": "London"},
            {"id": "Europe/Berlin", "name": "Berlin"},
            {"id": "Asia/Tokyo", "name": "Tokyo"},
        ],
        "status": "success",
    }))
}

/// GET /api/settings/export
pub async fn export_settings(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    let settings = SettingsRepository::new(state.db.pool())
        .get_or_create(user.id)
        .await?;

    Ok(Json(json!({
        "settings": settings_json(&settings),
        "profile": user,
        "exported_at": chrono::Utc::now().to_rfc3339(),
        "status": "success",
    })))
}
