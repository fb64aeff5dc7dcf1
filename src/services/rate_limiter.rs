//! Request rate limiter
//!
//! Sliding window per client IP: at most `max_requests` requests within the
//! last `window`. Rejected requests are not counted.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Outcome of one rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the oldest counted request leaves the window
    pub reset_seconds: u64,
}

/// Per-IP request rate limiter
pub struct RequestRateLimiter {
    /// Request times by client IP
    requests: Arc<RwLock<HashMap<String, Vec<DateTime<Utc>>>>>,
    max_requests: u32,
    window: Duration,
}

impl RequestRateLimiter {
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window: Duration::seconds(i64::try_from(window_seconds).unwrap_or(i64::MAX / 1000).max(1)),
        }
    }

    /// Window length in seconds
    pub fn window_seconds(&self) -> u64 {
        u64::try_from(self.window.num_seconds()).unwrap_or(0)
    }

    /// Count a request from `ip` if it fits in the window
    pub async fn check(&self, ip: &str) -> RateLimitDecision {
        self.check_at(ip, Utc::now()).await
    }

    async fn check_at(&self, ip: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let mut requests = self.requests.write().await;
        let cutoff = now - self.window;

        let times = requests.entry(ip.to_string()).or_default();
        times.retain(|time| *time > cutoff);

        let allowed = (times.len() as u64) < u64::from(self.max_requests);
        if allowed {
            times.push(now);
        }

        let used = u32::try_from(times.len()).unwrap_or(u32::MAX);
        let reset_seconds = times
            .first()
            .map(|oldest| (*oldest + self.window - now).num_seconds().max(0))
            .and_then(|secs| u64::try_from(secs).ok())
            .unwrap_or_else(|| self.window_seconds());

        RateLimitDecision {
            allowed,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(used),
            reset_seconds,
        }
    }

    /// Drop expired timestamps and idle clients (called periodically)
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - self.window;
        let mut requests = self.requests.write().await;
        requests.retain(|_, times| {
            times.retain(|time| *time > cutoff);
            !times.is_empty()
        });
    }

    /// Number of clients currently tracked
    pub async fn tracked_clients(&self) -> usize {
        self.requests.read().await.len()
    }
}
