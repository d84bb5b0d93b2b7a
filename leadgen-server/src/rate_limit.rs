//! Per-client fixed-window rate limiting
//!
//! Each route group owns one [`FixedWindowLimiter`]. State lives in a map keyed
//! by client identifier behind a single mutex; an entry whose window has
//! passed is reset lazily on its next access. The limiter is per process and
//! therefore best-effort when several instances run behind a balancer.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use leadgen_common::config::WindowLimit;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::ApiError;

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

/// Outcome of one limiter check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Wall-clock time at which the client's window resets
    pub reset_at: DateTime<Utc>,
}

impl RateLimitStatus {
    /// Set the `X-RateLimit-*` response headers
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(HEADER_LIMIT, HeaderValue::from(self.limit));
        headers.insert(HEADER_REMAINING, HeaderValue::from(self.remaining));
        let reset = self
            .reset_at
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        if let Ok(value) = HeaderValue::from_str(&reset) {
            headers.insert(HEADER_RESET, value);
        }
    }
}

#[derive(Debug)]
struct WindowEntry {
    count: u32,
    reset_at: Instant,
}

#[derive(Debug)]
pub struct FixedWindowLimiter {
    name: &'static str,
    max_requests: u32,
    window: Duration,
    entries: Mutex<HashMap<String, WindowEntry>>,
}

impl FixedWindowLimiter {
    pub fn new(name: &'static str, max_requests: u32, window: Duration) -> Self {
        Self {
            name,
            max_requests,
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(name: &'static str, limit: WindowLimit) -> Self {
        Self::new(name, limit.max_requests, Duration::from_secs(limit.window_secs))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Count one request for `key` at the current instant
    pub fn check(&self, key: &str) -> RateLimitStatus {
        self.check_at(key, Instant::now())
    }

    /// Count one request for `key` at `now`
    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitStatus {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        if entries.get(key).is_some_and(|entry| now > entry.reset_at) {
            entries.remove(key);
        }

        let entry = entries.entry(key.to_string()).or_insert_with(|| WindowEntry {
            count: 0,
            reset_at: now + self.window,
        });

        let reset_at = Utc::now()
            + chrono::Duration::from_std(entry.reset_at.saturating_duration_since(now))
                .unwrap_or_else(|_| chrono::Duration::zero());

        if entry.count >= self.max_requests {
            return RateLimitStatus {
                allowed: false,
                limit: self.max_requests,
                remaining: 0,
                reset_at,
            };
        }

        let remaining = self.max_requests.saturating_sub(entry.count + 1);
        entry.count += 1;

        RateLimitStatus {
            allowed: true,
            limit: self.max_requests,
            remaining,
            reset_at,
        }
    }

    /// Drop entries whose window has passed; returns how many were removed
    pub fn purge_expired(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| now <= entry.reset_at);
        before - entries.len()
    }

    /// Number of tracked clients
    pub fn tracked_clients(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Client key: first `X-Forwarded-For` hop, else the peer address
pub fn client_identifier(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware applying a limiter to every request of a route group
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<FixedWindowLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_identifier(&request);
    let status = limiter.check(&client);

    if !status.allowed {
        warn!(
            limiter = limiter.name(),
            client = %client,
            limit = status.limit,
            "Rate limit exceeded"
        );
        return Err(ApiError::RateLimited(status));
    }

    debug!(limiter = limiter.name(), client = %client, remaining = status.remaining, "Rate limit check passed");
    let mut response = next.run(request).await;
    status.apply_headers(response.headers_mut());
    Ok(response)
}

/// Periodically purge expired entries from the given limiters
pub fn spawn_sweeper(limiters: Vec<Arc<FixedWindowLimiter>>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let now = Instant::now();
            for limiter in &limiters {
                let removed = limiter.purge_expired(now);
                if removed > 0 {
                    debug!(limiter = limiter.name(), removed, "Purged expired rate-limit entries");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_allows_up_to_limit_then_rejects() {
        let limiter = FixedWindowLimiter::new("test", 3, Duration::from_secs(60));
        let t0 = Instant::now();

        let remaining: Vec<u32> = (0..3)
            .map(|_| {
                let status = limiter.check_at("1.2.3.4", t0);
                assert!(status.allowed);
                status.remaining
            })
            .collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        let rejected = limiter.check_at("1.2.3.4", t0 + Duration::from_secs(1));
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        assert_eq!(rejected.limit, 3);
    }

    #[test]
    fn test_window_expiry_resets_counter() {
        let limiter = FixedWindowLimiter::new("test", 1, Duration::from_secs(10));
        let t0 = Instant::now();

        assert!(limiter.check_at("client", t0).allowed);
        assert!(!limiter.check_at("client", t0 + Duration::from_secs(10)).allowed);

        let after = limiter.check_at("client", t0 + Duration::from_secs(11));
        assert!(after.allowed);
        assert_eq!(after.remaining, 0);
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = FixedWindowLimiter::new("test", 1, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(limiter.check_at("a", t0).allowed);
        assert!(limiter.check_at("b", t0).allowed);
        assert!(!limiter.check_at("a", t0).allowed);
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_purge_expired() {
        let limiter = FixedWindowLimiter::new("test", 5, Duration::from_secs(5));
        let t0 = Instant::now();
        limiter.check_at("old", t0);
        limiter.check_at("new", t0 + Duration::from_secs(4));

        assert_eq!(limiter.purge_expired(t0 + Duration::from_secs(6)), 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_headers_applied() {
        let limiter = FixedWindowLimiter::new("test", 2, Duration::from_secs(60));
        let status = limiter.check("x");
        let mut headers = HeaderMap::new();
        status.apply_headers(&mut headers);

        assert_eq!(headers.get(HEADER_LIMIT).unwrap(), "2");
        assert_eq!(headers.get(HEADER_REMAINING).unwrap(), "1");
        let reset = headers.get(HEADER_RESET).unwrap().to_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(reset).is_ok());
    }

    #[test]
    fn test_client_identifier_prefers_forwarded_for() {
        let request = Request::builder()
            .uri("/")
            .header("x-forwarded-for", " 10.0.0.1 , 172.16.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_identifier(&request), "10.0.0.1");

        let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(client_identifier(&request), "unknown");

        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 9], 4000))));
        assert_eq!(client_identifier(&request), "192.168.1.9");
    }
}
