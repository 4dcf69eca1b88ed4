//! Saved-item routes — bookmarked marketplace listings

use crate::error::{ApiError, ApiResult};
use crate::extract::AuthUser;
use crate::routes::{
    body_opt_str, body_price, body_str, page_params, pagination_json, parse_json_column,
};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use engine::{estimate_profit, FeeModel};
use persistence::repository::{
    NewSavedItem, SavedItemChanges, SavedItemRecord, SavedItemRepository,
};
use persistence::DbError;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::info;

const MAX_TITLE_LEN: usize = 200;
const MAX_NOTES_LEN: usize = 500;
const MAX_LISTING_ID_LEN: usize = 50;

fn truncate(value: &str, max: usize) -> String {
    let mut end = value.len().min(max);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

/// Strip markup-looking characters out of externally-supplied listing ids
fn sanitize_listing_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\''))
        .collect()
}

fn item_not_found() -> ApiError {
    ApiError::not_found("Item Not Found", "Item not found.", "ITEM_NOT_FOUND")
}

/// Saved item as the API presents it: tags split, market data parsed
fn item_json(item: &SavedItemRecord) -> Value {
    let mut value = serde_json::to_value(item).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert("tags".to_string(), json!(item.tags_list()));
        map.insert(
            "market_data".to_string(),
            parse_json_column(item.market_data.as_deref()),
        );
    }
    value
}

/// GET /api/saved-items
pub async fn list_items(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let (page, per_page, offset) = page_params(&params);
    let status = params.get("status").map(String::as_str);
    let favorites_only = params
        .get("favorites")
        .map(|v| v == "true")
        .unwrap_or(false);

    let repo = SavedItemRepository::new(state.db.pool());
    let (items, total) = repo
        .list(user.id, status, favorites_only, per_page, offset)
        .await?;

    let items: Vec<Value> = items.iter().map(item_json).collect();

    Ok(Json(json!({
        "items": items,
        "total": total,
        "pagination": pagination_json(page, per_page, total),
        "status": "success",
    })))
}

/// POST /api/saved-items
pub async fn save_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(data) = body?;

    let missing: Vec<&str> = ["item_id", "title", "price"]
        .into_iter()
        .filter(|field| data.get(*field).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::bad_request(
            "Missing Required Fields",
            format!("Missing required fields: {}", missing.join(", ")),
            "MISSING_FIELDS",
        ));
    }

    let listing_id = sanitize_listing_id(body_str(&data, "item_id").unwrap_or_default());
    if listing_id.is_empty() || listing_id.len() > MAX_LISTING_ID_LEN {
        return Err(ApiError::bad_request(
            "Invalid Item ID",
            "Item ID must be between 1 and 50 characters.",
            "INVALID_ITEM_ID",
        ));
    }

    let title = body_str(&data, "title")
        .map(|t| truncate(t, MAX_TITLE_LEN))
        .unwrap_or_default();
    if title.is_empty() {
        return Err(ApiError::bad_request(
            "Invalid Title",
            "Title must be a non-empty string.",
            "INVALID_TITLE",
        ));
    }

    let price_raw = body_price(&data, "price").unwrap_or_default();
    let Ok(price) = Decimal::from_str(&price_raw) else {
        return Err(ApiError::bad_request(
            "Invalid Price",
            "Price must be a valid number.",
            "INVALID_PRICE",
        ));
    };

    let estimated_profit = estimate_profit(price, &FeeModel::default());

    let new_item = NewSavedItem {
        user_id: user.id,
        listing_id,
        title,
        price: price.to_string(),
        currency: body_opt_str(&data, "currency").unwrap_or_else(|| "USD".to_string()),
        image_url: body_opt_str(&data, "image_url"),
        item_url: body_opt_str(&data, "item_url"),
        condition: body_opt_str(&data, "condition"),
        location: body_opt_str(&data, "location"),
        shipping_cost: body_price(&data, "shipping_cost"),
        estimated_profit: Some(estimated_profit.to_string()),
        confidence_score: data.get("confidence").and_then(|v| v.as_f64()),
        notes: body_opt_str(&data, "notes").map(|n| truncate(&n, MAX_NOTES_LEN)),
    };

    let repo = SavedItemRepository::new(state.db.pool());
    let item = repo.insert(new_item).await.map_err(|e| match e {
        DbError::Conflict(_) => {
            ApiError::conflict("Item Already Saved", "Item already saved.", "ITEM_ALREADY_SAVED")
        }
        other => ApiError::internal(other),
    })?;

    info!(user_id = user.id, listing_id = %item.listing_id, "Item saved");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Item saved successfully",
            "item": item_json(&item),
            "status": "success",
        })),
    ))
}

/// GET /api/saved-items/:id
pub async fn get_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = super::parse_id(&id, "Item")?;
    let repo = SavedItemRepository::new(state.db.pool());
    let item = repo.get(user.id, id).await?.ok_or_else(item_not_found)?;

    Ok(Json(json!({
        "item": item_json(&item),
        "status": "success",
    })))
}

/// PUT /api/saved-items/:id
pub async fn update_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let id = super::parse_id(&id, "Item")?;
    let Json(data) = body?;

    let repo = SavedItemRepository::new(state.db.pool());
    let existing = repo.get(user.id, id).await?.ok_or_else(item_not_found)?;

    let mut changes = SavedItemChanges {
        title: body_str(&data, "title").map(|t| truncate(t, MAX_TITLE_LEN)),
        currency: body_opt_str(&data, "currency"),
        image_url: body_opt_str(&data, "image_url"),
        item_url: body_opt_str(&data, "item_url"),
        condition: body_opt_str(&data, "condition"),
        location: body_opt_str(&data, "location"),
        notes: body_opt_str(&data, "notes").map(|n| truncate(&n, MAX_NOTES_LEN)),
        tags: body_opt_str(&data, "tags"),
        is_favorite: data.get("is_favorite").and_then(|v| v.as_bool()),
        status: body_opt_str(&data, "status"),
        ..Default::default()
    };

    if let Some(price_raw) = body_price(&data, "price") {
        if Decimal::from_str(&price_raw).is_err() {
            return Err(ApiError::bad_request(
                "Invalid Price",
                "Price must be a valid number.",
                "INVALID_PRICE",
            ));
        }
        changes.price = Some(price_raw);
    }
    if let Some(shipping) = body_price(&data, "shipping_cost") {
        changes.shipping_cost = Some(shipping);
    }

    // Price or shipping changes invalidate the stored profit estimate
    if changes.price.is_some() || changes.shipping_cost.is_some() {
        let effective_price = changes.price.as_deref().unwrap_or(&existing.price);
        if let Ok(price) = Decimal::from_str(effective_price) {
            changes.estimated_profit =
                Some(estimate_profit(price, &FeeModel::default()).to_string());
        }
    }

    let item = repo.update(user.id, id, changes).await?;

    info!(user_id = user.id, item_id = id, "Saved item updated");

    Ok(Json(json!({
        "message": "Item updated successfully",
        "item": item_json(&item),
        "status": "success",
    })))
}

/// DELETE /api/saved-items/:id
pub async fn delete_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = super::parse_id(&id, "Item")?;
    let repo = SavedItemRepository::new(state.db.pool());
    let deleted = repo.delete(user.id, id).await.map_err(|e| match e {
        DbError::NotFound(_) => item_not_found(),
        other => ApiError::internal(other),
    })?;

    info!(user_id = user.id, item_id = id, "Saved item deleted");

    Ok(Json(json!({
        "message": "Item deleted successfully",
        "deleted_item": item_json(&deleted),
        "status": "success",
    })))
}
