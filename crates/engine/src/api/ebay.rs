//! eBay Finding API client — keyword search with retry/backoff and scoring
//!
//! Every failure path returns a structured `SearchError` with a stable code;
//! the HTTP layer translates them into 503 responses.

use crate::scoring::{self, FeeModel};
use reqwest::{redirect, Client};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT_SECS: u64 = 15;
const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 1000;
const USER_AGENT: &str = "FlipLens/1.0";

/// Queries longer than this are truncated before hitting the API
const MAX_QUERY_LEN: usize = 100;
/// Characters stripped from queries before they reach the API
const QUERY_DENYLIST: &[char] = &[
    '<', '>', '"', '\'', '&', ';', '|', '`', '$', '(', ')', '{', '}',
];
/// Field values longer than this are truncated when extracted
const MAX_FIELD_LEN: usize = 500;

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Query contains no usable characters")]
    InvalidQuery,

    #[error("Marketplace authentication failed - check API key")]
    AuthenticationFailed,

    #[error("Too many requests to the marketplace API")]
    UpstreamRateLimited,

    #[error("Marketplace server error (HTTP {0})")]
    ServerError(u16),

    #[error("Marketplace API request timed out")]
    Timeout,

    #[error("Unable to connect to the marketplace API")]
    Connection,

    #[error("Marketplace API error (HTTP {0})")]
    UnexpectedStatus(u16),

    #[error("Failed to parse marketplace response: {0}")]
    Parse(String),

    #[error("Marketplace request error: {0}")]
    Request(String),
}

impl SearchError {
    /// Stable machine-readable code for the response body
    pub fn code(&self) -> &'static str {
        match self {
            SearchError::InvalidQuery => "INVALID_QUERY",
            SearchError::AuthenticationFailed => "UPSTREAM_AUTH_FAILED",
            SearchError::UpstreamRateLimited => "UPSTREAM_RATE_LIMITED",
            SearchError::ServerError(_) => "UPSTREAM_SERVER_ERROR",
            SearchError::Timeout => "UPSTREAM_TIMEOUT",
            SearchError::Connection => "UPSTREAM_CONNECTION_ERROR",
            SearchError::UnexpectedStatus(_) => "UPSTREAM_ERROR",
            SearchError::Parse(_) => "RESPONSE_PARSING_ERROR",
            SearchError::Request(_) => "UPSTREAM_REQUEST_ERROR",
        }
    }
}

/// A normalized search result. Field names follow the marketplace's wire
/// format so saved payloads stay interchangeable with raw results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub title: String,
    #[serde(rename = "itemId")]
    pub listing_id: String,
    #[serde(rename = "viewItemURL")]
    pub item_url: String,
    #[serde(rename = "galleryURL")]
    pub image_url: String,
    pub price: String,
    pub currency: String,
    pub location: String,
    pub condition: String,
    pub confidence: f64,
    pub estimated_profit: Option<Decimal>,
}

impl Listing {
    pub fn price_decimal(&self) -> Option<Decimal> {
        Decimal::from_str(&self.price).ok()
    }
}

/// A completed search with its echo of the effective inputs
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<Listing>,
    pub total: usize,
    pub query: String,
    pub limit: u32,
}

/// eBay Finding API client
#[derive(Clone)]
pub struct EbayClient {
    client: Client,
    base_url: String,
    app_id: String,
    fee_model: FeeModel,
}

impl EbayClient {
    pub fn new(base_url: &str, app_id: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .redirect(redirect::Policy::none())
                .user_agent(USER_AGENT)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.to_string(),
            app_id: app_id.to_string(),
            fee_model: FeeModel::default(),
        }
    }

    /// Strip denylisted characters and truncate. Idempotent: sanitizing a
    /// sanitized string returns it unchanged.
    pub fn sanitize_query(query: &str) -> String {
        let cleaned: String = query.chars().filter(|c| !QUERY_DENYLIST.contains(c)).collect();
        let truncated = if cleaned.len() > MAX_QUERY_LEN {
            let mut end = MAX_QUERY_LEN;
            while !cleaned.is_char_boundary(end) {
                end -= 1;
            }
            &cleaned[..end]
        } else {
            &cleaned
        };
        truncated.trim().to_string()
    }

    /// Clamp a requested result count to [1,100]; invalid input falls back
    /// to the default of 20
    pub fn clamp_limit(limit: Option<i64>) -> u32 {
        match limit {
            Some(n) if n < 1 => 1,
            Some(n) if n > MAX_LIMIT as i64 => MAX_LIMIT,
            Some(n) => n as u32,
            None => DEFAULT_LIMIT,
        }
    }

    /// Search the marketplace for listings matching the query
    pub async fn search(&self, query: &str, limit: u32) -> Result<SearchOutcome, SearchError> {
        let query = Self::sanitize_query(query);
        if query.is_empty() {
            return Err(SearchError::InvalidQuery);
        }

        info!(query = %query, limit, "Searching marketplace");

        let limit_str = limit.to_string();
        let params: Vec<(&str, &str)> = vec![
            ("OPERATION-NAME", "findItemsByKeywords"),
            ("SERVICE-VERSION", "1.0.0"),
            ("SECURITY-APPNAME", &self.app_id),
            ("RESPONSE-DATA-FORMAT", "JSON"),
            ("REST-PAYLOAD", ""),
            ("keywords", &query),
            ("paginationInput.entriesPerPage", &limit_str),
        ];

        let payload = self.request_with_retry(&params).await?;
        let mut results = parse_payload(&payload);

        for listing in &mut results {
            listing.confidence = scoring::base_confidence(listing);
            listing.estimated_profit = listing
                .price_decimal()
                .map(|price| scoring::estimate_profit(price, &self.fee_model));
        }
        scoring::refine_confidence(&mut results);

        info!(count = results.len(), "Search completed");

        Ok(SearchOutcome {
            total: results.len(),
            results,
            query,
            limit,
        })
    }

    /// GET with up to three attempts. Server errors, timeouts and connection
    /// failures back off exponentially and retry; auth failures and upstream
    /// rate limits report immediately.
    async fn request_with_retry(&self, params: &[(&str, &str)]) -> Result<Value, SearchError> {
        let mut last_error = SearchError::ServerError(500);

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = RETRY_BASE_DELAY_MS * 2u64.pow(attempt - 1);
                debug!(attempt, delay_ms = delay, "Retrying marketplace request");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let response = match self.client.get(&self.base_url).query(params).send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    warn!(attempt, "Marketplace request timed out");
                    last_error = SearchError::Timeout;
                    continue;
                }
                Err(e) if e.is_connect() => {
                    warn!(attempt, "Marketplace connection error");
                    last_error = SearchError::Connection;
                    continue;
                }
                Err(e) => return Err(SearchError::Request(e.to_string())),
            };

            let status = response.status().as_u16();
            debug!(status, "Marketplace response");

            match status {
                200 => {
                    return response
                        .json::<Value>()
                        .await
                        .map_err(|e| SearchError::Parse(e.to_string()));
                }
                401 => return Err(SearchError::AuthenticationFailed),
                429 => return Err(SearchError::UpstreamRateLimited),
                s if s >= 500 => {
                    warn!(status = s, attempt, "Marketplace server error");
                    last_error = SearchError::ServerError(s);
                }
                s => return Err(SearchError::UnexpectedStatus(s)),
            }
        }

        Err(last_error)
    }
}

/// Extract listings from the finding-service envelope:
/// `findItemsByKeywordsResponse[0].searchResult[0].item[]`.
/// Items missing a title or id are dropped.
fn parse_payload(payload: &Value) -> Vec<Listing> {
    let items = payload
        .get("findItemsByKeywordsResponse")
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("searchResult"))
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("item"))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    items.iter().filter_map(parse_item).collect()
}

fn parse_item(item: &Value) -> Option<Listing> {
    let title = extract_string(item.get("title"));
    let listing_id = extract_string(item.get("itemId"));

    // Title and id are the minimum for a usable result
    if title.is_empty() || listing_id.is_empty() {
        return None;
    }

    let current_price = item
        .get("sellingStatus")
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("currentPrice"))
        .and_then(|v| v.get(0));
    let price = extract_string(current_price.and_then(|v| v.get("__value__")));
    let currency = extract_string(current_price.and_then(|v| v.get("@currencyId")));

    let condition = extract_string(
        item.get("condition")
            .and_then(|v| v.get(0))
            .and_then(|v| v.get("conditionDisplayName")),
    );

    Some(Listing {
        title,
        listing_id,
        item_url: extract_string(item.get("viewItemURL")),
        image_url: extract_string(item.get("galleryURL")),
        price,
        currency,
        location: extract_string(item.get("location")),
        condition,
        confidence: 0.0,
        estimated_profit: None,
    })
}

/// Unwrap the finding API's list-wrapped strings, trim, and cap the length
fn extract_string(value: Option<&Value>) -> String {
    let value = match value {
        Some(Value::Array(items)) => items.first(),
        other => other,
    };
    let Some(Value::String(s)) = value else {
        return String::new();
    };
    let trimmed = s.trim();
    let capped = if trimmed.len() > MAX_FIELD_LEN {
        let mut end = MAX_FIELD_LEN;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        &trimmed[..end]
    } else {
        trimmed
    };
    capped.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RESPONSE: &str = r#"{
        "findItemsByKeywordsResponse": [{
            "ack": ["Success"],
            "searchResult": [{
                "@count": "2",
                "item": [
                    {
                        "itemId": ["1234567890"],
                        "title": ["Apple iPhone 13 128GB Midnight Unlocked"],
                        "viewItemURL": ["https://www.ebay.com/itm/1234567890"],
                        "galleryURL": ["https://i.ebayimg.com/images/g/abc/s-l225.jpg"],
                        "location": ["Austin,TX,USA"],
                        "sellingStatus": [{
                            "currentPrice": [{"@currencyId": "USD", "__value__": "429.99"}]
                        }],
                        "condition": [{"conditionDisplayName": ["Used"]}]
                    },
                    {
                        "itemId": [""],
                        "title": ["Listing without an id gets dropped"]
                    }
                ]
            }]
        }]
    }"#;

    #[test]
    fn sanitize_strips_denylist_and_truncates() {
        assert_eq!(
            EbayClient::sanitize_query("iPhone 13; DROP TABLE users"),
            "iPhone 13 DROP TABLE users"
        );
        assert_eq!(EbayClient::sanitize_query("$(rm -rf)"), "rm -rf");
        let long = "a".repeat(150);
        assert_eq!(EbayClient::sanitize_query(&long).len(), 100);
        assert_eq!(EbayClient::sanitize_query("  plain query  "), "plain query");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = EbayClient::sanitize_query("iPhone 13 (128GB) & \"case\"");
        let twice = EbayClient::sanitize_query(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn limit_clamps_to_range() {
        assert_eq!(EbayClient::clamp_limit(Some(50)), 50);
        assert_eq!(EbayClient::clamp_limit(Some(0)), 1);
        assert_eq!(EbayClient::clamp_limit(Some(-3)), 1);
        assert_eq!(EbayClient::clamp_limit(Some(1000)), 100);
        assert_eq!(EbayClient::clamp_limit(None), 20);
    }

    #[test]
    fn parses_nested_payload_and_drops_incomplete_items() {
        let payload: Value = serde_json::from_str(SAMPLE_RESPONSE).unwrap();
        let listings = parse_payload(&payload);
        assert_eq!(listings.len(), 1);

        let listing = &listings[0];
        assert_eq!(listing.listing_id, "1234567890");
        assert_eq!(listing.price, "429.99");
        assert_eq!(listing.currency, "USD");
        assert_eq!(listing.condition, "Used");
        assert_eq!(listing.location, "Austin,TX,USA");
    }

    #[test]
    fn scored_result_has_bounded_confidence_and_profit() {
        // The post-processing the search path applies, against the fixture
        let payload: Value = serde_json::from_str(SAMPLE_RESPONSE).unwrap();
        let mut listings = parse_payload(&payload);
        let fee_model = FeeModel::default();
        for listing in &mut listings {
            listing.confidence = scoring::base_confidence(listing);
            listing.estimated_profit = listing
                .price_decimal()
                .map(|p| scoring::estimate_profit(p, &fee_model));
        }
        scoring::refine_confidence(&mut listings);

        assert_eq!(listings.len(), 1);
        assert!((0.0..=1.0).contains(&listings[0].confidence));
        assert!(listings[0].estimated_profit.is_some());
    }

    #[test]
    fn empty_envelope_yields_no_results() {
        let payload: Value = serde_json::from_str(r#"{"findItemsByKeywordsResponse": []}"#).unwrap();
        assert!(parse_payload(&payload).is_empty());
    }

    #[test]
    fn extract_string_unwraps_and_caps() {
        let wrapped = serde_json::json!(["  hello  "]);
        assert_eq!(extract_string(Some(&wrapped)), "hello");

        let long = serde_json::json!("x".repeat(600));
        assert_eq!(extract_string(Some(&long)).len(), 500);

        assert_eq!(extract_string(None), "");
        assert_eq!(extract_string(Some(&serde_json::json!(42))), "");
    }
}
