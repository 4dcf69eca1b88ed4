//! Portfolio routes — owned items, market price updates, lifecycle changes

use crate::error::{ApiError, ApiResult};
use crate::extract::AuthUser;
use crate::routes::{body_opt_str, body_price, body_str, page_params, pagination_json, parse_json_column};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::DateTime;
use engine::{alert_triggered, flip_rating, RatingInput};
use persistence::repository::{
    AlertRepository, MarketTrendRepository, NewMarketTrend, NewPortfolioItem,
    PortfolioItemChanges, PortfolioItemRecord, PortfolioRepository,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{error, info};

const CONDITIONS: &[&str] = &["new", "excellent", "very good", "good", "fair", "poor"];

fn item_not_found() -> ApiError {
    ApiError::not_found("Item Not Found", "Portfolio item not found", "ITEM_NOT_FOUND")
}

/// Accept RFC 3339 with or without the trailing `Z`
fn parse_date(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(&raw.replace('Z', "+00:00"))
        .ok()
        .map(|dt| dt.to_rfc3339())
}

/// Portfolio item as the API presents it, with derived profit fields
fn item_json(item: &PortfolioItemRecord) -> Value {
    let mut value = serde_json::to_value(item).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert(
            "rating_factors".to_string(),
            parse_json_column(item.rating_factors.as_deref()),
        );
        map.insert(
            "images".to_string(),
            parse_json_column(item.images.as_deref()),
        );
        map.insert("profit_loss".to_string(), json!(item.profit_loss()));
        map.insert(
            "profit_percentage".to_string(),
            json!(item.profit_percentage()),
        );
        let tags: Vec<&str> = item
            .tags
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        map.insert("tags".to_string(), json!(tags));
    }
    value
}

fn rate_item(
    condition: &str,
    brand: Option<&str>,
    purchase_price: Option<Decimal>,
    market_price: Option<Decimal>,
) -> (f64, String) {
    let (rating, factors) = flip_rating(&RatingInput {
        condition,
        brand,
        purchase_price,
        current_market_price: market_price,
    });
    let factors_json = serde_json::to_string(&factors).unwrap_or_else(|_| "{}".to_string());
    (rating, factors_json)
}

/// GET /api/portfolio
pub async fn list_items(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let (page, per_page, offset) = page_params(&params);
    let status = params.get("status").map(String::as_str);
    let sort_by = params.get("sort_by").map(String::as_str);
    let descending = params
        .get("sort_order")
        .map(|o| o.to_lowercase() != "asc")
        .unwrap_or(true);

    let repo = PortfolioRepository::new(state.db.pool());
    let (items, total) = repo
        .list(user.id, status, sort_by, descending, per_page, offset)
        .await?;
    let summary = repo.summary(user.id).await?;

    let items: Vec<Value> = items.iter().map(item_json).collect();

    Ok(Json(json!({
        "items": items,
        "pagination": pagination_json(page, per_page, total),
        "summary": summary,
        "status": "success",
    })))
}

/// POST /api/portfolio
pub async fn add_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(data) = body?;

    let missing: Vec<&str> = ["item_name", "purchase_price", "purchase_date", "condition"]
        .into_iter()
        .filter(|field| data.get(*field).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::bad_request(
            "Missing Fields",
            format!("Missing required fields: {}", missing.join(", ")),
            "MISSING_FIELDS",
        ));
    }

    let item_name = body_str(&data, "item_name").unwrap_or_default().to_string();
    if item_name.is_empty() || item_name.len() > 500 {
        return Err(ApiError::bad_request(
            "Invalid Item Name",
            "Item name must be between 1 and 500 characters",
            "INVALID_ITEM_NAME",
        ));
    }

    let condition = body_str(&data, "condition").unwrap_or_default().to_lowercase();
    if !CONDITIONS.contains(&condition.as_str()) {
        return Err(ApiError::bad_request(
            "Invalid Condition",
            format!("Condition must be one of: {}", CONDITIONS.join(", ")),
            "INVALID_CONDITION",
        ));
    }

    let purchase_price_raw = body_price(&data, "purchase_price").unwrap_or_default();
    let Ok(purchase_price) = Decimal::from_str(&purchase_price_raw) else {
        return Err(ApiError::bad_request(
            "Invalid Purchase Price",
            "Purchase price must be a valid number.",
            "INVALID_PURCHASE_PRICE",
        ));
    };

    let Some(purchase_date) = body_str(&data, "purchase_date").and_then(parse_date) else {
        return Err(ApiError::bad_request(
            "Invalid Purchase Date",
            "Purchase date must be an ISO 8601 timestamp.",
            "INVALID_PURCHASE_DATE",
        ));
    };

    let brand = body_opt_str(&data, "brand");
    let (rating, factors_json) =
        rate_item(&condition, brand.as_deref(), Some(purchase_price), None);

    let repo = PortfolioRepository::new(state.db.pool());
    let item = repo
        .insert(NewPortfolioItem {
            user_id: user.id,
            item_name,
            brand,
            model: body_opt_str(&data, "model"),
            size: body_opt_str(&data, "size"),
            color: body_opt_str(&data, "color"),
            condition,
            category: body_opt_str(&data, "category"),
            purchase_price: purchase_price.to_string(),
            purchase_date,
            purchase_platform: body_opt_str(&data, "purchase_platform"),
            purchase_location: body_opt_str(&data, "purchase_location"),
            rating: Some(rating),
            rating_factors: Some(factors_json),
            notes: body_opt_str(&data, "notes"),
            tags: body_opt_str(&data, "tags"),
        })
        .await?;

    info!(user_id = user.id, item = %item.item_name, "Portfolio item added");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "item": item_json(&item),
            "message": "Portfolio item added successfully",
            "status": "success",
        })),
    ))
}

/// GET /api/portfolio/:id
pub async fn get_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = super::parse_id(&id, "Portfolio item")?;
    let repo = PortfolioRepository::new(state.db.pool());
    let item = repo.get(user.id, id).await?.ok_or_else(item_not_found)?;

    Ok(Json(json!({
        "item": item_json(&item),
        "status": "success",
    })))
}

/// PUT /api/portfolio/:id
pub async fn update_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let id = super::parse_id(&id, "Portfolio item")?;
    let Json(data) = body?;

    let repo = PortfolioRepository::new(state.db.pool());
    repo.get(user.id, id).await?.ok_or_else(item_not_found)?;

    let mut changes = PortfolioItemChanges {
        item_name: body_opt_str(&data, "item_name").filter(|n| !n.is_empty()),
        brand: body_opt_str(&data, "brand"),
        model: body_opt_str(&data, "model"),
        size: body_opt_str(&data, "size"),
        color: body_opt_str(&data, "color"),
        category: body_opt_str(&data, "category"),
        purchase_platform: body_opt_str(&data, "purchase_platform"),
        purchase_location: body_opt_str(&data, "purchase_location"),
        listing_platform: body_opt_str(&data, "listing_platform"),
        notes: body_opt_str(&data, "notes"),
        tags: body_opt_str(&data, "tags"),
        ..Default::default()
    };

    if let Some(condition) = body_str(&data, "condition") {
        let condition = condition.to_lowercase();
        if !CONDITIONS.contains(&condition.as_str()) {
            return Err(ApiError::bad_request(
                "Invalid Condition",
                format!("Condition must be one of: {}", CONDITIONS.join(", ")),
                "INVALID_CONDITION",
            ));
        }
        changes.condition = Some(condition);
    }
    if let Some(price) = body_price(&data, "purchase_price") {
        changes.purchase_price = Some(price);
    }
    if let Some(date) = body_str(&data, "purchase_date") {
        changes.purchase_date = Some(parse_date(date).ok_or_else(|| {
            ApiError::bad_request(
                "Invalid Purchase Date",
                "Purchase date must be an ISO 8601 timestamp.",
                "INVALID_PURCHASE_DATE",
            )
        })?);
    }
    if let Some(price) = body_price(&data, "listing_price") {
        changes.listing_price = Some(price);
    }

    repo.update(user.id, id, changes).await?;

    // A fresh market price recomputes the rating, records a trend point and
    // runs the matching price alerts
    if let Some(price_raw) = body_price(&data, "current_market_price") {
        let Ok(market_price) = Decimal::from_str(&price_raw) else {
            return Err(ApiError::bad_request(
                "Invalid Market Price",
                "Market price must be a valid number.",
                "INVALID_MARKET_PRICE",
            ));
        };
        apply_market_price(&state, user.id, id, market_price).await?;
    }

    // Status transitions: listed and sold carry their price/platform along
    if let Some(status) = body_str(&data, "status") {
        let current = repo.get(user.id, id).await?.ok_or_else(item_not_found)?;
        match status {
            "listed" => {
                let listing_price = body_price(&data, "listing_price")
                    .or(current.listing_price.clone())
                    .ok_or_else(|| {
                        ApiError::bad_request(
                            "Missing Listing Price",
                            "A listing price is required to mark an item as listed",
                            "MISSING_LISTING_PRICE",
                        )
                    })?;
                let platform = body_opt_str(&data, "listing_platform");
                repo.mark_listed(user.id, id, &listing_price, platform.as_deref())
                    .await?;
            }
            "sold" => {
                let sale_price = body_price(&data, "sale_price").ok_or_else(|| {
                    ApiError::bad_request(
                        "Missing Sale Price",
                        "A sale price is required to mark an item as sold",
                        "MISSING_SALE_PRICE",
                    )
                })?;
                let platform = body_opt_str(&data, "sale_platform");
                repo.mark_sold(user.id, id, &sale_price, platform.as_deref())
                    .await?;
            }
            "owned" => repo.set_status(user.id, id, "owned").await?,
            other => {
                return Err(ApiError::bad_request(
                    "Invalid Status",
                    format!("Unknown status '{other}'"),
                    "INVALID_STATUS",
                ))
            }
        }
    }

    let item = repo.get(user.id, id).await?.ok_or_else(item_not_found)?;

    info!(user_id = user.id, item_id = id, "Portfolio item updated");

    Ok(Json(json!({
        "item": item_json(&item),
        "message": "Portfolio item updated successfully",
        "status": "success",
    })))
}

/// DELETE /api/portfolio/:id
pub async fn delete_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = super::parse_id(&id, "Portfolio item")?;
    let repo = PortfolioRepository::new(state.db.pool());
    repo.delete(user.id, id).await.map_err(|e| match e {
        persistence::DbError::NotFound(_) => item_not_found(),
        other => ApiError::internal(other),
    })?;

    info!(user_id = user.id, item_id = id, "Portfolio item deleted");

    Ok(Json(json!({
        "message": "Portfolio item deleted successfully",
        "status": "success",
    })))
}

/// Store the new market price, recompute the rating, append a market-trend
/// point and evaluate every active alert watching the item
async fn apply_market_price(
    state: &AppState,
    user_id: i64,
    item_id: i64,
    market_price: Decimal,
) -> ApiResult<()> {
    let repo = PortfolioRepository::new(state.db.pool());
    let item = repo.get(user_id, item_id).await?.ok_or_else(item_not_found)?;

    let purchase_price = Decimal::from_str(&item.purchase_price).ok();
    let (rating, factors_json) = rate_item(
        &item.condition,
        item.brand.as_deref(),
        purchase_price,
        Some(market_price),
    );

    repo.update_market_price(
        user_id,
        item_id,
        &market_price.to_string(),
        rating,
        &factors_json,
    )
    .await?;

    let trends = MarketTrendRepository::new(state.db.pool());
    if let Err(e) = trends
        .record(NewMarketTrend {
            item_identifier: item.item_name.clone(),
            platform: item.listing_platform.clone().unwrap_or_else(|| "manual".to_string()),
            condition: item.condition.clone(),
            price: market_price.to_string(),
            currency: "USD".to_string(),
            listing_count: 1,
            sold_count: 0,
            data_source: Some("portfolio_update".to_string()),
            confidence_score: 0.5,
        })
        .await
    {
        error!("Failed to record market trend: {e}");
    }

    check_alerts(state, &item.item_name, market_price).await;

    Ok(())
}

/// Evaluate active alerts for an item at the given price; triggered alerts
/// get a trigger stamp and a notification-log entry
async fn check_alerts(state: &AppState, item_identifier: &str, price: Decimal) {
    let alerts = AlertRepository::new(state.db.pool());
    let watching = match alerts.active_for_item(item_identifier).await {
        Ok(watching) => watching,
        Err(e) => {
            error!("Failed to load alerts for {item_identifier}: {e}");
            return;
        }
    };

    let price_str = price.to_string();
    let mut triggered = 0usize;

    for alert in &watching {
        if alert_triggered(alert, price) {
            triggered += 1;
            if let Err(e) = alerts.record_trigger(alert.id, &price_str).await {
                error!("Failed to record alert trigger: {e}");
                continue;
            }
            let title = format!("Price alert for {item_identifier}");
            let message = format!(
                "{item_identifier} hit {price_str} (alert type: {})",
                alert.alert_type
            );
            if let Err(e) = alerts
                .insert_notification(
                    alert.id,
                    alert.user_id,
                    &alert.notification_method,
                    &title,
                    &message,
                    Some(&price_str),
                )
                .await
            {
                error!("Failed to log alert notification: {e}");
            }
        } else if let Err(e) = alerts.record_checked_price(alert.id, &price_str).await {
            error!("Failed to record checked price: {e}");
        }
    }

    if triggered > 0 {
        info!(item = item_identifier, triggered, "Price alerts triggered");
    }
}
