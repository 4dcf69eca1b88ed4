//! Market trend routes

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use persistence::repository::{MarketSummary, MarketTrendRepository};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;

fn days_back(params: &HashMap<String, String>) -> Result<i64, ApiError> {
    let days: i64 = params
        .get("days_back")
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);
    if !(1..=365).contains(&days) {
        return Err(ApiError::bad_request(
            "Invalid Time Range",
            "days_back must be between 1 and 365",
            "INVALID_TIME_RANGE",
        ));
    }
    Ok(days)
}

/// GET /api/market-trends/:item
pub async fn trends(
    State(state): State<AppState>,
    Path(item): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let platform = params.get("platform").map(String::as_str);
    let condition = params.get("condition").map(String::as_str);
    let days = days_back(&params)?;

    info!(item = %item, ?platform, ?condition, days, "Getting market trends");

    let repo = MarketTrendRepository::new(state.db.pool());
    let records = repo.price_trends(&item, platform, condition, days, 1000).await?;

    let (trends, summary) = if records.is_empty() {
        // No recorded data yet: serve deterministic demo data so the charts
        // have something to draw
        let demo = demo_trend_data(&item, platform, condition, days);
        let summary = demo_summary(&demo, days);
        (demo, summary)
    } else {
        let summary = repo.summary(&item, platform, condition, days).await?;
        let trends: Vec<Value> = records
            .iter()
            .map(|r| serde_json::to_value(r).unwrap_or(Value::Null))
            .collect();
        (trends, summary)
    };

    Ok(Json(json!({
        "item_identifier": item,
        "platform": platform,
        "condition": condition,
        "time_range_days": days,
        "trends": trends,
        "summary": summary,
        "status": "success",
    })))
}

/// GET /api/market-trends/:item/summary
pub async fn summary(
    State(state): State<AppState>,
    Path(item): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let platform = params.get("platform").map(String::as_str);
    let condition = params.get("condition").map(String::as_str);
    let days = days_back(&params)?;

    let repo = MarketTrendRepository::new(state.db.pool());
    let summary = match repo.summary(&item, platform, condition, days).await? {
        Some(summary) => Some(summary),
        None => {
            let demo = demo_trend_data(&item, platform, condition, days);
            demo_summary(&demo, days)
        }
    };

    Ok(Json(json!({
        "item_identifier": item,
        "summary": summary,
        "status": "success",
    })))
}

/// GET /api/market-trends/platforms
pub async fn platforms() -> Json<Value> {
    Json(json!({
        "platforms": [
            {"id": "ebay", "name": "eBay", "active": true},
            {"id": "poshmark", "name": "Poshmark", "active": true},
            {"id": "mercari", "name": "Mercari", "active": true},
            {"id": "depop", "name": "Depop", "active": false},
            {"id": "vinted", "name": "Vinted", "active": false},
            {"id": "facebook", "name": "Facebook Marketplace", "active": false},
        ],
        "status": "success",
    }))
}

/// GET /api/market-trends/conditions
pub async fn conditions() -> Json<Value> {
    Json(json!({
        "conditions": [
            {"id": "new", "name": "New", "description": "Brand new with tags"},
            {"id": "excellent", "name": "Excellent", "description": "Like new, no visible wear"},
            {"id": "very good", "name": "Very Good", "description": "Minor signs of wear"},
            {"id": "good", "name": "Good", "description": "Some signs of wear"},
            {"id": "fair", "name": "Fair", "description": "Noticeable wear"},
            {"id": "poor", "name": "Poor", "description": "Significant wear"},
        ],
        "status": "success",
    }))
}

/// Small deterministic hash so demo data is stable per item
fn item_hash(item: &str) -> u64 {
    item.bytes().fold(1469598103934665603u64, |acc, b| {
        (acc ^ b as u64).wrapping_mul(1099511628211)
    })
}

/// Synthetic price series for items with no recorded data: a stable base
/// price per identifier with bounded day-to-day variation and a mild upward
/// drift
fn demo_trend_data(
    item: &str,
    platform: Option<&str>,
    condition: Option<&str>,
    days: i64,
) -> Vec<Value> {
    let hash = item_hash(item);
    let base_price = 50.0 + (hash % 200) as f64;
    let points = days.min(30);

    let now = chrono::Utc::now();
    (0..points)
        .map(|i| {
            let noise = ((hash.wrapping_mul(31).wrapping_add(i as u64 * 17)) % 41) as f64 - 20.0;
            let drift = 1.0 + (i as f64 * 0.002);
            let price = (base_price * (1.0 + noise / 100.0) * drift * 100.0).round() / 100.0;
            let recorded = now - chrono::Duration::days(days - i);

            json!({
                "id": format!("demo-{i}"),
                "item_identifier": item,
                "platform": platform.unwrap_or("ebay"),
                "condition": condition.unwrap_or("good"),
                "price": price,
                "currency": "USD",
                "listing_count": 5 + ((hash.wrapping_add(i as u64 * 13)) % 45),
                "sold_count": 1 + ((hash.wrapping_add(i as u64 * 7)) % 10),
                "confidence_score": 0.7 + ((hash.wrapping_add(i as u64)) % 25) as f64 / 100.0,
                "recorded_at": recorded.to_rfc3339(),
                "created_at": recorded.to_rfc3339(),
            })
        })
        .collect()
}

fn demo_summary(trends: &[Value], days: i64) -> Option<MarketSummary> {
    let mut prices: Vec<f64> = trends
        .iter()
        .filter_map(|t| t.get("price").and_then(|p| p.as_f64()))
        .collect();
    if prices.is_empty() {
        return None;
    }
    prices.sort_by(|a, b| a.total_cmp(b));

    let count = prices.len();
    let average = (prices.iter().sum::<f64>() / count as f64 * 100.0).round() / 100.0;

    Some(MarketSummary {
        average,
        median: prices[count / 2],
        lowest: prices[0],
        highest: prices[count - 1],
        count: count as i64,
        period_days: days,
    })
}
