//! Shared application state handed to every route handler

use crate::ratelimit::RateLimiter;
use engine::{AppConfig, EbayClient};
use persistence::Database;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<AppConfig>,
    /// `None` when no marketplace API key is configured (search answers 503)
    pub ebay: Arc<Option<EbayClient>>,
    pub limiter: Arc<RateLimiter>,
}
