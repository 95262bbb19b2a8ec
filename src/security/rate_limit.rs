//! Fixed-window rate limiting keyed by API key identity.
//!
//! A bucket's window starts at its first request (or the first request after
//! expiry), so windows are not aligned to wall-clock minutes. Every call to
//! [`RateLimitStore::check_and_consume`] counts, including rejected ones.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use dashmap::DashMap;

/// Window length in milliseconds. Fixed, not configurable.
pub const WINDOW_MS: u64 = 60_000;

pub static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Usage of one identity within its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitBucket {
    pub count: u64,
    /// Epoch milliseconds after which the next request opens a new window.
    pub window_reset_at: u64,
}

impl RateLimitBucket {
    fn fresh(now: u64, window_ms: u64) -> Self {
        Self {
            count: 0,
            window_reset_at: now + window_ms,
        }
    }

    fn is_expired(&self, now: u64) -> bool {
        now > self.window_reset_at
    }
}

/// Outcome of consuming one unit of quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Attempts in the current window, this one included.
    pub count: u64,
    pub window_reset_at: u64,
}

impl RateLimitDecision {
    /// Whole seconds until the window rolls over, never less than 1.
    pub fn retry_after_secs(&self, now: u64) -> u64 {
        self.window_reset_at.saturating_sub(now).div_ceil(1000).max(1)
    }
}

/// Values for the `X-RateLimit-*` response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitHeaders {
    pub limit: u32,
    pub remaining: u64,
    pub reset_epoch_secs: u64,
}

impl RateLimitHeaders {
    fn from_bucket(quota: u32, bucket: &RateLimitBucket) -> Self {
        Self {
            limit: quota,
            remaining: u64::from(quota).saturating_sub(bucket.count),
            reset_epoch_secs: bucket.window_reset_at.div_ceil(1000),
        }
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING.clone(), HeaderValue::from(self.remaining));
        headers.insert(X_RATELIMIT_RESET.clone(), HeaderValue::from(self.reset_epoch_secs));
    }
}

/// Storage for per-identity quota usage.
///
/// The in-process [`FixedWindowLimiter`] is the default; a shared store can
/// implement this trait to enforce quotas across several instances.
pub trait RateLimitStore: Send + Sync {
    /// Count one request for `identity` and report whether it fits `quota`.
    fn check_and_consume(&self, identity: &str, quota: u32, now: u64) -> RateLimitDecision;

    /// Current header values for `identity` without recording anything.
    fn headers_for(&self, identity: &str, quota: u32, now: u64) -> RateLimitHeaders;

    /// Drop buckets whose window has ended. Returns how many were removed.
    fn purge_expired(&self, now: u64) -> usize;

    /// Number of tracked identities.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory fixed-window limiter.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    buckets: DashMap<String, RateLimitBucket>,
    window_ms: u64,
}

impl FixedWindowLimiter {
    pub fn new() -> Self {
        Self::with_window(WINDOW_MS)
    }

    pub(crate) fn with_window(window_ms: u64) -> Self {
        Self {
            buckets: DashMap::new(),
            window_ms,
        }
    }

    /// Snapshot of one bucket, if it exists.
    pub fn bucket(&self, identity: &str) -> Option<RateLimitBucket> {
        self.buckets.get(identity).map(|b| *b)
    }
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitStore for FixedWindowLimiter {
    fn check_and_consume(&self, identity: &str, quota: u32, now: u64) -> RateLimitDecision {
        // The entry guard holds the shard lock across expiry check, reset and
        // increment, so concurrent requests for one identity cannot overrun.
        let mut bucket = self
            .buckets
            .entry(identity.to_string())
            .or_insert_with(|| RateLimitBucket::fresh(now, self.window_ms));

        if bucket.is_expired(now) {
            *bucket = RateLimitBucket::fresh(now, self.window_ms);
        }
        bucket.count += 1;

        RateLimitDecision {
            allowed: bucket.count <= u64::from(quota),
            count: bucket.count,
            window_reset_at: bucket.window_reset_at,
        }
    }

    fn headers_for(&self, identity: &str, quota: u32, now: u64) -> RateLimitHeaders {
        let bucket = self
            .bucket(identity)
            .unwrap_or_else(|| RateLimitBucket::fresh(now, self.window_ms));
        RateLimitHeaders::from_bucket(quota, &bucket)
    }

    fn purge_expired(&self, now: u64) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.is_expired(now));
        before.saturating_sub(self.buckets.len())
    }

    fn len(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_request_is_allowed() {
        let limiter = FixedWindowLimiter::new();
        let decision = limiter.check_and_consume("key-1", 1, 0);
        assert!(decision.allowed);
        assert_eq!(decision.count, 1);
        assert_eq!(decision.window_reset_at, WINDOW_MS);
    }

    #[test]
    fn quota_then_reject() {
        let limiter = FixedWindowLimiter::new();
        for i in 0..5 {
            assert!(limiter.check_and_consume("key-1", 5, i * 100).allowed);
        }
        let over = limiter.check_and_consume("key-1", 5, 600);
        assert!(!over.allowed);
        assert_eq!(over.count, 6);

        // Rejected attempts keep counting.
        let again = limiter.check_and_consume("key-1", 5, 700);
        assert_eq!(again.count, 7);
    }

    #[test]
    fn identities_are_independent() {
        let limiter = FixedWindowLimiter::new();
        assert!(limiter.check_and_consume("a", 1, 0).allowed);
        assert!(!limiter.check_and_consume("a", 1, 1).allowed);
        assert!(limiter.check_and_consume("b", 1, 2).allowed);
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn window_rolls_from_first_request_after_expiry() {
        let limiter = FixedWindowLimiter::new();
        // quota=2: t=0,1s,2s → allow, allow, reject
        assert!(limiter.check_and_consume("k", 2, 0).allowed);
        assert!(limiter.check_and_consume("k", 2, 1_000).allowed);
        let third = limiter.check_and_consume("k", 2, 2_000);
        assert!(!third.allowed);
        assert_eq!(third.retry_after_secs(2_000), 58);

        // Exactly at the boundary the old window still applies.
        assert!(!limiter.check_and_consume("k", 2, 60_000).allowed);

        let fresh = limiter.check_and_consume("k", 2, 61_000);
        assert!(fresh.allowed);
        assert_eq!(fresh.count, 1);
        assert_eq!(fresh.window_reset_at, 121_000);
    }

    #[test]
    fn remaining_never_negative() {
        let limiter = FixedWindowLimiter::new();
        for t in 0..10 {
            limiter.check_and_consume("k", 3, t);
        }
        let headers = limiter.headers_for("k", 3, 10);
        assert_eq!(headers.limit, 3);
        assert_eq!(headers.remaining, 0);
        assert_eq!(headers.reset_epoch_secs, 60);
    }

    #[test]
    fn headers_for_unknown_identity_does_not_store() {
        let limiter = FixedWindowLimiter::new();
        let headers = limiter.headers_for("ghost", 100, 1_500);
        assert_eq!(headers.remaining, 100);
        assert_eq!(headers.reset_epoch_secs, 62); // ceil(61_500 / 1000)
        assert!(limiter.is_empty());
        assert!(limiter.bucket("ghost").is_none());
    }

    #[test]
    fn headers_apply_to_map() {
        let mut map = HeaderMap::new();
        RateLimitHeaders {
            limit: 100,
            remaining: 42,
            reset_epoch_secs: 1_700_000_000,
        }
        .apply(&mut map);
        assert_eq!(map.get("X-RateLimit-Limit").unwrap(), "100");
        assert_eq!(map.get("X-RateLimit-Remaining").unwrap(), "42");
        assert_eq!(map.get("X-RateLimit-Reset").unwrap(), "1700000000");
    }

    #[test]
    fn retry_after_is_at_least_one_second() {
        let decision = RateLimitDecision {
            allowed: false,
            count: 3,
            window_reset_at: 5_000,
        };
        assert_eq!(decision.retry_after_secs(5_000), 1);
        assert_eq!(decision.retry_after_secs(4_999), 1);
        assert_eq!(decision.retry_after_secs(3_999), 2);
    }

    #[test]
    fn purge_drops_only_expired_buckets() {
        let limiter = FixedWindowLimiter::with_window(1_000);
        limiter.check_and_consume("old", 10, 0);
        limiter.check_and_consume("new", 10, 900);

        assert_eq!(limiter.purge_expired(1_001), 1);
        assert!(limiter.bucket("old").is_none());
        assert_eq!(limiter.bucket("new").unwrap().count, 1);
    }

    #[test]
    fn concurrent_consumers_never_overrun() {
        let limiter = Arc::new(FixedWindowLimiter::new());
        let quota = 50;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || {
                    (0..25)
                        .filter(|_| limiter.check_and_consume("shared", quota, 10).allowed)
                        .count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, quota as usize);
        assert_eq!(limiter.bucket("shared").unwrap().count, 200);
    }
}
