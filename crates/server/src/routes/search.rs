//! Marketplace search routes

use crate::error::{ApiError, ApiResult};
use crate::extract::MaybeUser;
use crate::routes::body_str;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::Json;
use engine::{EbayClient, Listing, SearchError, SearchOutcome};
use persistence::repository::{NewSearchRecord, SearchHistoryRepository, UserRecord};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{error, info};

fn marketplace_unavailable(err: &SearchError) -> ApiError {
    error!("Marketplace service error: {err}");
    ApiError::upstream("Marketplace Error", err.to_string(), err.code())
}

fn not_configured() -> ApiError {
    ApiError::upstream(
        "Marketplace Error",
        "Marketplace API key not configured",
        "MARKETPLACE_NOT_CONFIGURED",
    )
}

/// POST /api/search
pub async fn search_post(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(data) = body?;

    let Some(query) = body_str(&data, "query") else {
        return Err(ApiError::bad_request(
            "Missing Query",
            "Field 'query' is required.",
            "MISSING_QUERY",
        ));
    };
    let limit = EbayClient::clamp_limit(match data.get("limit") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    });

    run_search(&state, user.as_ref(), query, limit, true).await
}

/// GET /api/search?q=...&limit=...
pub async fn search_get(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let Some(query) = params.get("q").map(|s| s.trim()).filter(|s| !s.is_empty()) else {
        return Err(ApiError::bad_request(
            "Missing Query",
            "Query parameter 'q' is required.",
            "MISSING_QUERY",
        ));
    };

    let limit = match params.get("limit") {
        None => EbayClient::clamp_limit(None),
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(n) if (1..=100).contains(&n) => n as u32,
            Ok(_) => {
                return Err(ApiError::bad_request(
                    "Invalid Limit",
                    "Limit must be between 1 and 100.",
                    "INVALID_LIMIT",
                ))
            }
            Err(_) => {
                return Err(ApiError::bad_request(
                    "Invalid Limit Type",
                    "Limit must be a valid number.",
                    "INVALID_LIMIT_TYPE",
                ))
            }
        },
    };

    run_search(&state, user.as_ref(), query, limit, false).await
}

async fn run_search(
    state: &AppState,
    user: Option<&UserRecord>,
    query: &str,
    limit: u32,
    record_history: bool,
) -> ApiResult<Json<Value>> {
    let Some(ebay) = (*state.ebay).as_ref() else {
        return Err(not_configured());
    };

    info!(query, limit, "Processing search request");
    let started = Instant::now();
    let outcome = ebay.search(query, limit).await;
    let duration = started.elapsed().as_secs_f64();

    match outcome {
        Ok(outcome) => {
            if record_history {
                if let Some(user) = user {
                    record_search(state, user.id, &outcome, duration).await;
                }
            }
            Ok(Json(json!({
                "results": outcome.results,
                "total": outcome.total,
                "query": outcome.query,
                "limit": outcome.limit,
                "status": "success",
            })))
        }
        Err(err) => {
            if record_history {
                if let Some(user) = user {
                    record_failed_search(state, user.id, query, limit, duration, &err).await;
                }
            }
            Err(marketplace_unavailable(&err))
        }
    }
}

/// Persist the analytics snapshot for an authenticated search
async fn record_search(state: &AppState, user_id: i64, outcome: &SearchOutcome, duration: f64) {
    let (avg, min, max) = price_stats(&outcome.results);
    let record = NewSearchRecord {
        user_id,
        query: outcome.query.clone(),
        results_count: outcome.total as i64,
        search_duration: Some(duration),
        limit_requested: outcome.limit as i64,
        avg_price: avg.map(|d| d.to_string()),
        min_price: min.map(|d| d.to_string()),
        max_price: max.map(|d| d.to_string()),
        top_conditions: top_values(&outcome.results, |l| &l.condition),
        top_locations: top_values(&outcome.results, |l| &l.location),
        search_success: true,
        error_message: None,
    };
    if let Err(e) = SearchHistoryRepository::new(state.db.pool()).insert(record).await {
        error!("Failed to record search history: {e}");
    }
}

async fn record_failed_search(
    state: &AppState,
    user_id: i64,
    query: &str,
    limit: u32,
    duration: f64,
    err: &SearchError,
) {
    let record = NewSearchRecord {
        user_id,
        query: query.to_string(),
        results_count: 0,
        search_duration: Some(duration),
        limit_requested: limit as i64,
        avg_price: None,
        min_price: None,
        max_price: None,
        top_conditions: None,
        top_locations: None,
        search_success: false,
        error_message: Some(err.to_string()),
    };
    if let Err(e) = SearchHistoryRepository::new(state.db.pool()).insert(record).await {
        error!("Failed to record search history: {e}");
    }
}

fn price_stats(listings: &[Listing]) -> (Option<Decimal>, Option<Decimal>, Option<Decimal>) {
    let prices: Vec<Decimal> = listings.iter().filter_map(|l| l.price_decimal()).collect();
    if prices.is_empty() {
        return (None, None, None);
    }
    let sum: Decimal = prices.iter().copied().sum();
    let avg = (sum / Decimal::from(prices.len())).round_dp(2);
    (
        Some(avg),
        prices.iter().min().copied(),
        prices.iter().max().copied(),
    )
}

/// Top five value counts for a listing field, serialized as a JSON object
fn top_values(listings: &[Listing], field: impl Fn(&Listing) -> &String) -> Option<String> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for listing in listings {
        let value = field(listing).trim();
        if !value.is_empty() {
            *counts.entry(value).or_default() += 1;
        }
    }
    if counts.is_empty() {
        return None;
    }

    let mut sorted: Vec<(&str, u32)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    sorted.truncate(5);

    let map: serde_json::Map<String, Value> = sorted
        .into_iter()
        .map(|(value, count)| (value.to_string(), json!(count)))
        .collect();
    serde_json::to_string(&Value::Object(map)).ok()
}
