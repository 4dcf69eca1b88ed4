//! Per-client, per-endpoint sliding-window rate limiter
//!
//! Owned by `AppState` and lock-guarded; endpoint rules are matched by the
//! longest configured path prefix. Keys whose window has fully drained are
//! evicted during periodic bookkeeping so cardinality stays bounded by live
//! clients.

use crate::state::AppState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::RETRY_AFTER;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

/// Run idle-key eviction every this many admission checks
const EVICTION_INTERVAL: u64 = 256;

#[derive(Debug, Clone, Copy)]
pub struct RateRule {
    pub max_requests: u32,
    pub window: Duration,
}

pub struct RateLimiter {
    enabled: bool,
    /// Path-prefix rules, longest prefix wins
    rules: Vec<(&'static str, RateRule)>,
    default_rule: RateRule,
    windows: Mutex<HashMap<(String, String), VecDeque<Instant>>>,
    checks: AtomicU64,
}

impl RateLimiter {
    /// Build the limiter with the fixed endpoint table plus the configured
    /// default rule
    pub fn new(enabled: bool, default_requests: u32, default_window_secs: u64) -> Self {
        let hour = Duration::from_secs(3600);
        Self {
            enabled,
            rules: vec![
                (
                    "/api/search",
                    RateRule {
                        max_requests: 100,
                        window: hour,
                    },
                ),
                (
                    "/api/saved-items",
                    RateRule {
                        max_requests: 1000,
                        window: hour,
                    },
                ),
            ],
            default_rule: RateRule {
                max_requests: default_requests,
                window: Duration::from_secs(default_window_secs),
            },
            windows: Mutex::new(HashMap::new()),
            checks: AtomicU64::new(0),
        }
    }

    fn rule_for(&self, endpoint: &str) -> RateRule {
        self.rules
            .iter()
            .filter(|(prefix, _)| endpoint.starts_with(prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, rule)| *rule)
            .unwrap_or(self.default_rule)
    }

    /// Admit or reject a request, recording it when admitted
    pub fn is_allowed(&self, endpoint: &str, client: &str) -> bool {
        self.check_at(endpoint, client, Instant::now())
    }

    fn check_at(&self, endpoint: &str, client: &str, now: Instant) -> bool {
        if !self.enabled {
            return true;
        }

        let rule = self.rule_for(endpoint);
        let mut windows = self.windows.lock().expect("rate limiter lock poisoned");

        let key = (client.to_string(), endpoint.to_string());
        let timestamps = windows.entry(key).or_default();

        // Drop timestamps that fell out of the window
        while let Some(front) = timestamps.front() {
            if now.duration_since(*front) >= rule.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        let allowed = (timestamps.len() as u32) < rule.max_requests;
        if allowed {
            timestamps.push_back(now);
        } else {
            warn!(endpoint, client, "Rate limit exceeded");
        }

        // Periodically evict keys whose newest timestamp has aged out of
        // their endpoint's window
        if self.checks.fetch_add(1, Ordering::Relaxed) % EVICTION_INTERVAL == 0 {
            windows.retain(|(_, ep), q| {
                let window = self.rule_for(ep).window;
                q.back()
                    .map_or(false, |newest| now.duration_since(*newest) < window)
            });
        }

        allowed
    }

    /// Requests the client can still issue in the current window
    pub fn remaining(&self, endpoint: &str, client: &str) -> u32 {
        if !self.enabled {
            return self.rule_for(endpoint).max_requests;
        }
        let rule = self.rule_for(endpoint);
        let now = Instant::now();
        let windows = self.windows.lock().expect("rate limiter lock poisoned");
        let used = windows
            .get(&(client.to_string(), endpoint.to_string()))
            .map(|q| {
                q.iter()
                    .filter(|t| now.duration_since(**t) < rule.window)
                    .count() as u32
            })
            .unwrap_or(0);
        rule.max_requests.saturating_sub(used)
    }

    pub fn limit(&self, endpoint: &str) -> u32 {
        self.rule_for(endpoint).max_requests
    }

    pub fn window_secs(&self, endpoint: &str) -> u64 {
        self.rule_for(endpoint).window.as_secs()
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.windows.lock().unwrap().len()
    }
}

/// Axum middleware enforcing the limiter for every `/api` request
pub async fn middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let endpoint = request.uri().path().to_string();
    let client = addr.ip().to_string();

    if !state.limiter.is_allowed(&endpoint, &client) {
        let window = state.limiter.window_secs(&endpoint);
        let body = json!({
            "error": "Too Many Requests",
            "message": "Rate limit exceeded. Please try again later.",
            "retry_after": window,
            "status": "error",
        });
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(RETRY_AFTER, window.to_string())],
            Json(body),
        )
            .into_response();
    }

    let limit = state.limiter.limit(&endpoint);
    let remaining = state.limiter.remaining(&endpoint, &client);
    let reset = chrono::Utc::now().timestamp() + state.limiter.window_secs(&endpoint) as i64;

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    if let Ok(value) = limit.to_string().parse() {
        headers.insert("X-RateLimit-Limit", value);
    }
    if let Ok(value) = remaining.to_string().parse() {
        headers.insert("X-RateLimit-Remaining", value);
    }
    if let Ok(value) = reset.to_string().parse() {
        headers.insert("X-RateLimit-Reset", value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(true, max, window_secs)
    }

    #[test]
    fn rejects_request_over_the_limit() {
        let rl = limiter(3, 60);
        let now = Instant::now();

        for _ in 0..3 {
            assert!(rl.check_at("/api/portfolio", "10.0.0.1", now));
        }
        // The (N+1)th request inside the window is rejected
        assert!(!rl.check_at("/api/portfolio", "10.0.0.1", now));
        // ...and was not recorded: a different client is unaffected
        assert!(rl.check_at("/api/portfolio", "10.0.0.2", now));
    }

    #[test]
    fn window_expiry_readmits_the_client() {
        let rl = limiter(2, 60);
        let start = Instant::now();

        assert!(rl.check_at("/api/alerts", "10.0.0.1", start));
        assert!(rl.check_at("/api/alerts", "10.0.0.1", start));
        assert!(!rl.check_at("/api/alerts", "10.0.0.1", start));

        let later = start + Duration::from_secs(61);
        assert!(rl.check_at("/api/alerts", "10.0.0.1", later));
    }

    #[test]
    fn endpoint_rules_override_the_default() {
        let rl = limiter(5, 60);
        assert_eq!(rl.limit("/api/search"), 100);
        assert_eq!(rl.limit("/api/saved-items"), 1000);
        assert_eq!(rl.limit("/api/saved-items/42"), 1000);
        assert_eq!(rl.limit("/api/portfolio"), 5);
        assert_eq!(rl.window_secs("/api/search"), 3600);
    }

    #[test]
    fn remaining_counts_down() {
        let rl = limiter(10, 60);
        let now = Instant::now();
        assert_eq!(rl.remaining("/api/portfolio", "10.0.0.1"), 10);
        rl.check_at("/api/portfolio", "10.0.0.1", now);
        rl.check_at("/api/portfolio", "10.0.0.1", now);
        assert_eq!(rl.remaining("/api/portfolio", "10.0.0.1"), 8);
    }

    #[test]
    fn disabled_limiter_admits_everything() {
        let rl = RateLimiter::new(false, 1, 60);
        let now = Instant::now();
        for _ in 0..50 {
            assert!(rl.check_at("/api/portfolio", "10.0.0.1", now));
        }
        assert_eq!(rl.tracked_keys(), 0);
    }

    #[test]
    fn drained_keys_are_evicted() {
        let rl = limiter(5, 1);
        let start = Instant::now();
        rl.check_at("/api/portfolio", "10.0.0.1", start);
        rl.check_at("/api/portfolio", "10.0.0.2", start);
        assert_eq!(rl.tracked_keys(), 2);

        // Both windows drain; enough later checks trigger the eviction sweep
        let later = start + Duration::from_secs(2);
        for _ in 0..(EVICTION_INTERVAL + 1) {
            rl.check_at("/api/health", "10.0.0.3", later);
        }
        // Only the live health key survives the sweep
        assert_eq!(rl.tracked_keys(), 1);
    }
}
