//! Rate limiting tracking and management
//!
//! One tracker is shared by every operation that talks to a provider. All
//! state is held in atomics so concurrent poll loops never block on it.

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::providers::ClientError;

/// Snapshot of a tracker's counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitInfo {
    /// Calls currently on the wire
    pub in_flight: u32,

    /// Calls started since the tracker was created
    pub requests_total: u64,

    /// Requests remaining in the provider's current window
    pub requests_remaining: Option<u64>,

    /// When the provider's current window resets
    pub reset_at: Option<DateTime<Utc>>,
}

const UNKNOWN: i64 = -1;

/// Tracks provider rate limits and local concurrency
#[derive(Debug)]
pub struct RateLimitTracker {
    max_concurrent: Option<u32>,
    in_flight: AtomicU32,
    requests_total: AtomicU64,
    remaining: AtomicI64,
    reset_at: AtomicI64,
}

/// Releases an in-flight slot when dropped
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    tracker: &'a RateLimitTracker,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.tracker.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

impl RateLimitTracker {
    /// Create a new rate limit tracker
    pub fn new(max_concurrent: Option<u32>) -> Self {
        Self {
            max_concurrent,
            in_flight: AtomicU32::new(0),
            requests_total: AtomicU64::new(0),
            remaining: AtomicI64::new(UNKNOWN),
            reset_at: AtomicI64::new(UNKNOWN),
        }
    }

    /// Reserve a slot for one call
    ///
    /// Fails with a transient [`ClientError::RateLimit`] when the provider
    /// reported an exhausted window or the local concurrency cap is reached.
    pub fn acquire(&self, now: DateTime<Utc>) -> Result<InFlightGuard<'_>, ClientError> {
        if let Some(wait) = self.window_wait(now) {
            return Err(ClientError::RateLimit {
                retry_after: Some(wait),
            });
        }

        let limit = self.max_concurrent.unwrap_or(u32::MAX);
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < limit).then_some(current + 1)
            })
            .map_err(|_| ClientError::RateLimit { retry_after: None })?;

        self.requests_total.fetch_add(1, Ordering::Relaxed);
        Ok(InFlightGuard { tracker: self })
    }

    fn window_wait(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.remaining.load(Ordering::Acquire) != 0 {
            return None;
        }
        let reset = DateTime::from_timestamp(self.reset_at.load(Ordering::Acquire), 0)?;
        (reset - now).to_std().ok().filter(|d| !d.is_zero())
    }

    /// Update rate limit information from response headers
    ///
    /// Accepts single values and comma separated per-window lists
    /// (`x-ratelimit-remaining: 1, 15000`); the tightest window wins. Reset
    /// values are seconds from now, or a unix timestamp when large enough to
    /// be one; relative values count from `now`.
    pub fn update_from_headers(&self, headers: &HeaderMap, now: DateTime<Utc>) {
        let remaining = header_list(headers, "x-ratelimit-remaining");
        let Some((index, tightest)) = remaining
            .iter()
            .copied()
            .enumerate()
            .min_by_key(|(_, value)| *value)
        else {
            return;
        };
        self.remaining.store(tightest, Ordering::Release);

        let resets = header_list(headers, "x-ratelimit-reset");
        if let Some(reset) = resets.get(index).or(resets.first()).copied() {
            let at = if reset > 1_000_000_000 {
                reset
            } else {
                now.timestamp() + reset
            };
            self.reset_at.store(at, Ordering::Release);
        }

        debug!("rate limit window: {} remaining", tightest);
    }

    /// Get current rate limit information
    pub fn info(&self) -> RateLimitInfo {
        let remaining = self.remaining.load(Ordering::Acquire);
        let reset_at = self.reset_at.load(Ordering::Acquire);
        RateLimitInfo {
            in_flight: self.in_flight.load(Ordering::Acquire),
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_remaining: u64::try_from(remaining).ok(),
            reset_at: (reset_at != UNKNOWN)
                .then(|| DateTime::from_timestamp(reset_at, 0))
                .flatten(),
        }
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new(None)
    }
}

fn header_list(headers: &HeaderMap, name: &str) -> Vec<i64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .filter_map(|part| part.trim().parse::<i64>().ok())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_concurrency_cap() {
        let tracker = RateLimitTracker::new(Some(2));

        let first = tracker.acquire(Utc::now()).unwrap();
        let _second = tracker.acquire(Utc::now()).unwrap();
        assert!(matches!(
            tracker.acquire(Utc::now()),
            Err(ClientError::RateLimit { retry_after: None })
        ));

        drop(first);
        assert!(tracker.acquire(Utc::now()).is_ok());
        assert_eq!(tracker.info().requests_total, 3);
    }

    #[test]
    fn test_exhausted_window_blocks_without_network() {
        let tracker = RateLimitTracker::default();
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0, 14000"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("30, 86400"));
        tracker.update_from_headers(&headers, Utc::now());

        let info = tracker.info();
        assert_eq!(info.requests_remaining, Some(0));

        match tracker.acquire(Utc::now()) {
            Err(ClientError::RateLimit {
                retry_after: Some(wait),
            }) => assert!(wait <= Duration::from_secs(30)),
            other => panic!("expected rate limit, got {:?}", other),
        };
    }

    #[test]
    fn test_missing_headers_leave_state_unknown() {
        let tracker = RateLimitTracker::default();
        tracker.update_from_headers(&HeaderMap::new(), Utc::now());
        assert_eq!(tracker.info().requests_remaining, None);
        assert!(tracker.acquire(Utc::now()).is_ok());
    }

    #[test]
    fn test_window_reopens_at_reset() {
        let tracker = RateLimitTracker::default();
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("20"));
        tracker.update_from_headers(&headers, start);

        match tracker.acquire(start + chrono::Duration::seconds(5)) {
            Err(ClientError::RateLimit {
                retry_after: Some(wait),
            }) => assert_eq!(wait, Duration::from_secs(15)),
            other => panic!("expected rate limit, got {:?}", other),
        }
        assert!(tracker.acquire(start + chrono::Duration::seconds(20)).is_ok());
    }
}
