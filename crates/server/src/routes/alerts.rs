//! Price alert routes

use crate::error::{ApiError, ApiResult};
use crate::extract::AuthUser;
use crate::routes::{body_opt_str, body_price, body_str, page_params, pagination_json};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use engine::AlertKind;
use persistence::repository::{AlertRepository, NewPriceAlert, PriceAlertChanges};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;

const NOTIFICATION_METHODS: &[&str] = &["email", "push", "both"];

fn alert_not_found() -> ApiError {
    ApiError::not_found("Alert Not Found", "Price alert not found", "ALERT_NOT_FOUND")
}

fn validate_percentage(pct: f64) -> Result<(), ApiError> {
    if !(0.0..=100.0).contains(&pct) || pct == 0.0 {
        return Err(ApiError::bad_request(
            "Invalid Percentage",
            "percentage_change must be greater than 0 and at most 100",
            "INVALID_PERCENTAGE",
        ));
    }
    Ok(())
}

/// GET /api/alerts
pub async fn list_alerts(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let (page, per_page, offset) = page_params(&params);
    let is_active = params.get("is_active").map(|v| v == "true");
    let alert_type = params.get("alert_type").map(String::as_str);

    let repo = AlertRepository::new(state.db.pool());
    let (alerts, total) = repo
        .list(user.id, is_active, alert_type, per_page, offset)
        .await?;
    let stats = repo.stats(user.id).await?;

    Ok(Json(json!({
        "alerts": alerts,
        "pagination": pagination_json(page, per_page, total),
        "stats": stats,
        "status": "success",
    })))
}

/// POST /api/alerts
pub async fn create_alert(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(data) = body?;

    let Some(item_identifier) = body_str(&data, "item_identifier") else {
        return Err(ApiError::bad_request(
            "Missing Fields",
            "Missing required fields: item_identifier",
            "MISSING_FIELDS",
        ));
    };
    if item_identifier.len() > 200 {
        return Err(ApiError::bad_request(
            "Invalid Item Identifier",
            "Item identifier must be at most 200 characters",
            "INVALID_ITEM_IDENTIFIER",
        ));
    }

    let Some(kind) = body_str(&data, "alert_type").and_then(AlertKind::parse) else {
        return Err(ApiError::bad_request(
            "Invalid Alert Type",
            "alert_type must be one of: threshold, price_drop, price_increase",
            "INVALID_ALERT_TYPE",
        ));
    };

    let threshold_price = body_price(&data, "threshold_price");
    let baseline_price = body_price(&data, "baseline_price");
    let percentage_change = data.get("percentage_change").and_then(|v| v.as_f64());

    // Each kind must arrive with the fields it needs to ever be evaluable
    match kind {
        AlertKind::Threshold => {
            if threshold_price.is_none() {
                return Err(ApiError::bad_request(
                    "Missing Threshold Price",
                    "Threshold alerts require threshold_price",
                    "MISSING_THRESHOLD_PRICE",
                ));
            }
        }
        AlertKind::PriceDrop | AlertKind::PriceIncrease => {
            let Some(pct) = percentage_change else {
                return Err(ApiError::bad_request(
                    "Missing Percentage",
                    "Percentage alerts require percentage_change",
                    "MISSING_PERCENTAGE_CHANGE",
                ));
            };
            validate_percentage(pct)?;
            if baseline_price.is_none() {
                return Err(ApiError::bad_request(
                    "Missing Baseline Price",
                    "Percentage alerts require baseline_price",
                    "MISSING_BASELINE_PRICE",
                ));
            }
        }
    }

    let notification_method = body_opt_str(&data, "notification_method")
        .unwrap_or_else(|| "email".to_string())
        .to_lowercase();
    if !NOTIFICATION_METHODS.contains(&notification_method.as_str()) {
        return Err(ApiError::bad_request(
            "Invalid Notification Method",
            "notification_method must be one of: email, push, both",
            "INVALID_NOTIFICATION_METHOD",
        ));
    }

    let repo = AlertRepository::new(state.db.pool());
    let alert = repo
        .insert(NewPriceAlert {
            user_id: user.id,
            item_identifier: item_identifier.to_string(),
            platform: body_opt_str(&data, "platform"),
            condition: body_opt_str(&data, "condition"),
            alert_type: kind.as_str().to_string(),
            threshold_price,
            percentage_change,
            notification_method,
            baseline_price,
            notes: body_opt_str(&data, "notes"),
        })
        .await?;

    info!(user_id = user.id, item = %alert.item_identifier, "Price alert created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "alert": alert,
            "message": "Price alert created successfully",
            "status": "success",
        })),
    ))
}

/// GET /api/alerts/:id
pub async fn get_alert(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = super::parse_id(&id, "Alert")?;
    let repo = AlertRepository::new(state.db.pool());
    let alert = repo.get(user.id, id).await?.ok_or_else(alert_not_found)?;

    Ok(Json(json!({
        "alert": alert,
        "status": "success",
    })))
}

/// PUT /api/alerts/:id
pub async fn update_alert(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let id = super::parse_id(&id, "Alert")?;
    let Json(data) = body?;

    let repo = AlertRepository::new(state.db.pool());
    repo.get(user.id, id).await?.ok_or_else(alert_not_found)?;

    if let Some(pct) = data.get("percentage_change").and_then(|v| v.as_f64()) {
        validate_percentage(pct)?;
    }
    if let Some(method) = body_str(&data, "notification_method") {
        if !NOTIFICATION_METHODS.contains(&method.to_lowercase().as_str()) {
            return Err(ApiError::bad_request(
                "Invalid Notification Method",
                "notification_method must be one of: email, push, both",
                "INVALID_NOTIFICATION_METHOD",
            ));
        }
    }

    let changes = PriceAlertChanges {
        platform: body_opt_str(&data, "platform"),
        condition: body_opt_str(&data, "condition"),
        threshold_price: body_price(&data, "threshold_price"),
        percentage_change: data.get("percentage_change").and_then(|v| v.as_f64()),
        notification_method: body_opt_str(&data, "notification_method").map(|m| m.to_lowercase()),
        baseline_price: body_price(&data, "baseline_price"),
        notes: body_opt_str(&data, "notes"),
    };

    let alert = repo.update(user.id, id, changes).await?;

    info!(user_id = user.id, alert_id = id, "Price alert updated");

    Ok(Json(json!({
        "alert": alert,
        "message": "Price alert updated successfully",
        "status": "success",
    })))
}

/// DELETE /api/alerts/:id
pub async fn delete_alert(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = super::parse_id(&id, "Alert")?;
    let repo = AlertRepository::new(state.db.pool());
    repo.delete(user.id, id).await.map_err(|e| match e {
        persistence::DbError::NotFound(_) => alert_not_found(),
        other => ApiError::internal(other),
    })?;

    info!(user_id = user.id, alert_id = id, "Price alert deleted");

    Ok(Json(json!({
        "message": "Price alert deleted successfully",
        "status": "success",
    })))
}

/// POST /api/alerts/:id/toggle
pub async fn toggle_alert(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = super::parse_id(&id, "Alert")?;
    let repo = AlertRepository::new(state.db.pool());
    let alert = repo.get(user.id, id).await?.ok_or_else(alert_not_found)?;
    let toggled = repo.set_active(user.id, id, !alert.is_active).await?;

    info!(
        user_id = user.id,
        alert_id = id,
        active = toggled.is_active,
        "Price alert toggled"
    );

    Ok(Json(json!({
        "alert": toggled,
        "message": if toggled.is_active { "Alert activated" } else { "Alert deactivated" },
        "status": "success",
    })))
}

/// GET /api/alerts/:id/notifications
pub async fn alert_notifications(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = super::parse_id(&id, "Alert")?;
    let repo = AlertRepository::new(state.db.pool());
    repo.get(user.id, id).await?.ok_or_else(alert_not_found)?;
    let notifications = repo.notifications_for_alert(user.id, id).await?;

    Ok(Json(json!({
        "notifications": notifications,
        "total": notifications.len(),
        "status": "success",
    })))
}
