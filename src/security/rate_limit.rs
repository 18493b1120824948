//! Sliding-window rate limiting per API key.
//!
//! The window store is behind a trait so it can be backed by an in-memory
//! map or a distributed keyed store; either way the per-key record-and-count
//! is an atomic read-modify-write, never enumerate-then-modify.

use crate::{Error, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Keys exempt from limiting.
    pub skip_keys: HashSet<String>,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl RateLimiterConfig {
    /// 100 requests per minute.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            max_requests: 100,
            window_ms: 60_000,
            skip_keys: HashSet::new(),
        }
    }

    /// 20 requests per minute.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            max_requests: 20,
            window_ms: 60_000,
            skip_keys: HashSet::new(),
        }
    }

    /// 300 requests per minute.
    #[must_use]
    pub fn relaxed() -> Self {
        Self {
            max_requests: 300,
            window_ms: 60_000,
            skip_keys: HashSet::new(),
        }
    }

    /// 1000 requests per hour.
    #[must_use]
    pub fn hourly() -> Self {
        Self {
            max_requests: 1_000,
            window_ms: 3_600_000,
            skip_keys: HashSet::new(),
        }
    }

    /// 10000 requests per day.
    #[must_use]
    pub fn daily() -> Self {
        Self {
            max_requests: 10_000,
            window_ms: 86_400_000,
            skip_keys: HashSet::new(),
        }
    }

    /// Adds a key that bypasses limiting.
    #[must_use]
    pub fn with_skip_key(mut self, key: impl Into<String>) -> Self {
        self.skip_keys.insert(key.into());
        self
    }
}

/// Trait for sliding-window stores.
pub trait RateLimitStore: Send + Sync {
    /// Atomically prunes timestamps older than the window, optionally
    /// records `now`, and returns the in-window count *before* recording.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    fn prune_and_count(&self, key: &str, now_ms: u64, window_ms: u64, record: bool)
    -> Result<u32>;
}

/// In-memory sliding-window store.
#[derive(Default)]
pub struct InMemoryRateLimitStore {
    windows: Mutex<HashMap<String, VecDeque<u64>>>,
}

impl InMemoryRateLimitStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn prune_and_count(
        &self,
        key: &str,
        now_ms: u64,
        window_ms: u64,
        record: bool,
    ) -> Result<u32> {
        let mut windows = self
            .windows
            .lock()
            .map_err(|_| Error::Fatal("rate limit store lock poisoned".to_string()))?;
        let window = windows.entry(key.to_string()).or_default();
        let cutoff = now_ms.saturating_sub(window_ms);
        while window.front().is_some_and(|&t| t <= cutoff) {
            window.pop_front();
        }
        #[allow(clippy::cast_possible_truncation)]
        let count = window.len() as u32;
        if record {
            window.push_back(now_ms);
        }
        Ok(count)
    }
}

/// Sliding-window rate limiter.
pub struct RateLimiter<S: RateLimitStore> {
    config: RateLimiterConfig,
    store: S,
}

impl<S: RateLimitStore> RateLimiter<S> {
    /// Creates a limiter over a window store.
    #[must_use]
    pub const fn new(config: RateLimiterConfig, store: S) -> Self {
        Self { config, store }
    }

    /// Consumes one request slot for the key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RateLimited`] when the key has exhausted its window,
    /// carrying the window length as the retry delay.
    pub fn consume(&self, key: &str) -> Result<()> {
        self.consume_at(key, now_ms())
    }

    /// Checks whether a request would be admitted, without consuming a slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn check(&self, key: &str) -> Result<bool> {
        self.check_at(key, now_ms())
    }

    /// Clock-injected variant of [`RateLimiter::consume`] for tests.
    ///
    /// # Errors
    ///
    /// See [`RateLimiter::consume`].
    pub fn consume_at(&self, key: &str, now_ms: u64) -> Result<()> {
        if self.config.skip_keys.contains(key) {
            return Ok(());
        }
        let count = self
            .store
            .prune_and_count(key, now_ms, self.config.window_ms, true)?;
        if count >= self.config.max_requests {
            metrics::counter!("yagokoro_rate_limit_rejections").increment(1);
            return Err(Error::RateLimited {
                retry_after_seconds: Some(self.config.window_ms.div_ceil(1000)),
            });
        }
        Ok(())
    }

    /// Clock-injected variant of [`RateLimiter::check`] for tests.
    ///
    /// # Errors
    ///
    /// See [`RateLimiter::check`].
    pub fn check_at(&self, key: &str, now_ms: u64) -> Result<bool> {
        if self.config.skip_keys.contains(key) {
            return Ok(true);
        }
        let count = self
            .store
            .prune_and_count(key, now_ms, self.config.window_ms, false)?;
        Ok(count < self.config.max_requests)
    }
}

fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn limiter(max: u32, window_ms: u64) -> RateLimiter<InMemoryRateLimitStore> {
        RateLimiter::new(
            RateLimiterConfig {
                max_requests: max,
                window_ms,
                skip_keys: HashSet::new(),
            },
            InMemoryRateLimitStore::new(),
        )
    }

    #[test]
    fn test_consume_up_to_limit() {
        let limiter = limiter(3, 1000);
        assert!(limiter.consume_at("k", 0).is_ok());
        assert!(limiter.consume_at("k", 10).is_ok());
        assert!(limiter.consume_at("k", 20).is_ok());
        let err = limiter.consume_at("k", 30).unwrap_err();
        assert!(matches!(err, Error::RateLimited { .. }));
        assert_eq!(err.retry_after_seconds(), Some(1));
    }

    #[test]
    fn test_window_slides() {
        let limiter = limiter(2, 1000);
        assert!(limiter.consume_at("k", 0).is_ok());
        assert!(limiter.consume_at("k", 100).is_ok());
        assert!(limiter.consume_at("k", 200).is_err());
        // After the first two fall out of the window, requests pass again.
        assert!(limiter.consume_at("k", 1500).is_ok());
    }

    #[test]
    fn test_check_does_not_consume() {
        let limiter = limiter(1, 1000);
        assert!(limiter.check_at("k", 0).unwrap());
        assert!(limiter.check_at("k", 0).unwrap());
        assert!(limiter.consume_at("k", 0).is_ok());
        assert!(!limiter.check_at("k", 10).unwrap());
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter(1, 1000);
        assert!(limiter.consume_at("a", 0).is_ok());
        assert!(limiter.consume_at("b", 0).is_ok());
        assert!(limiter.consume_at("a", 10).is_err());
    }

    #[test]
    fn test_skip_keys_bypass() {
        let limiter = RateLimiter::new(
            RateLimiterConfig::strict().with_skip_key("internal"),
            InMemoryRateLimitStore::new(),
        );
        for i in 0..100 {
            assert!(limiter.consume_at("internal", i).is_ok());
        }
    }

    #[test_case(RateLimiterConfig::standard(), 100, 60_000; "standard")]
    #[test_case(RateLimiterConfig::strict(), 20, 60_000; "strict")]
    #[test_case(RateLimiterConfig::relaxed(), 300, 60_000; "relaxed")]
    #[test_case(RateLimiterConfig::hourly(), 1_000, 3_600_000; "hourly")]
    #[test_case(RateLimiterConfig::daily(), 10_000, 86_400_000; "daily")]
    fn test_presets(config: RateLimiterConfig, max: u32, window_ms: u64) {
        assert_eq!(config.max_requests, max);
        assert_eq!(config.window_ms, window_ms);
    }
}
