//! Rate Limiting Infrastructure
//!
//! Fixed-window counters behind a storage trait. The check and the
//! increment happen in one step, so concurrent callers can never both
//! observe remaining quota for the last slot of a window.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;

/// Rate limit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn window_ms(&self) -> i64 {
        (self.window.as_millis() as i64).max(1)
    }

    /// Start of the window containing `now_ms`
    pub fn window_start_ms(&self, now_ms: i64) -> i64 {
        now_ms.div_euclid(self.window_ms()) * self.window_ms()
    }
}

/// Outcome of a single check-and-increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Derive a decision from the post-increment counter value
    pub fn from_count(count: u32, config: &RateLimitConfig, window_start_ms: i64) -> Self {
        let reset_ms = window_start_ms + config.window_ms();
        Self {
            allowed: count <= config.max_requests,
            limit: config.max_requests,
            remaining: config.max_requests.saturating_sub(count),
            reset_at: Utc
                .timestamp_millis_opt(reset_ms)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }

    /// Seconds until the window resets, rounded up, never below one
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> i64 {
        let ms = (self.reset_at - now).num_milliseconds();
        ((ms + 999) / 1000).max(1)
    }
}

/// Rate limit store failure
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Rate limit store unavailable: {0}")]
    Store(String),
}

/// Trait for rate limit storage backends
#[trait_variant::make(RateLimitStore: Send)]
pub trait LocalRateLimitStore {
    /// Atomically increment the counter for `key` and report the decision
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitDecision, RateLimitError>;
}

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    window_start_ms: i64,
    count: u32,
}

/// In-process counter store
///
/// Each key lives in one DashMap shard; the entry guard serialises
/// concurrent increments on the same key.
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    counters: DashMap<String, WindowCounter>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check-and-increment at an explicit instant
    pub fn check_and_increment_at(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> RateLimitDecision {
        let window_start_ms = config.window_start_ms(now_ms);

        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert(WindowCounter {
                window_start_ms,
                count: 0,
            });

        if entry.window_start_ms != window_start_ms {
            entry.window_start_ms = window_start_ms;
            entry.count = 0;
        }
        entry.count = entry.count.saturating_add(1);

        RateLimitDecision::from_count(entry.count, config, window_start_ms)
    }

    /// Drop counters whose window started before `older_than_ms`
    pub fn purge_before(&self, older_than_ms: i64) -> usize {
        let before = self.counters.len();
        self.counters
            .retain(|_, counter| counter.window_start_ms >= older_than_ms);
        before - self.counters.len()
    }
}

impl RateLimitStore for MemoryRateLimitStore {
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitDecision, RateLimitError> {
        Ok(self.check_and_increment_at(key, config, Utc::now().timestamp_millis()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const T0: i64 = 1_700_000_000_000;

    #[test]
    fn test_allows_up_to_limit_then_blocks() {
        let store = MemoryRateLimitStore::new();
        let config = RateLimitConfig::new(3, 60);
        let now = config.window_start_ms(T0);

        for expected_remaining in [2, 1, 0] {
            let decision = store.check_and_increment_at("k", &config, now);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }

        let blocked = store.check_and_increment_at("k", &config, now + 10);
        assert!(!blocked.allowed);
        assert_eq!(blocked.remaining, 0);
        assert_eq!(blocked.limit, 3);
    }

    #[test]
    fn test_window_rollover_resets_counter() {
        let store = MemoryRateLimitStore::new();
        let config = RateLimitConfig::new(1, 60);
        let now = config.window_start_ms(T0);

        assert!(store.check_and_increment_at("k", &config, now).allowed);
        assert!(!store.check_and_increment_at("k", &config, now + 1).allowed);
        assert!(
            store
                .check_and_increment_at("k", &config, now + config.window_ms())
                .allowed
        );
    }

    #[test]
    fn test_keys_are_independent() {
        let store = MemoryRateLimitStore::new();
        let config = RateLimitConfig::new(1, 60);

        assert!(store.check_and_increment_at("a", &config, T0).allowed);
        assert!(store.check_and_increment_at("b", &config, T0).allowed);
    }

    #[test]
    fn test_reset_at_and_retry_after() {
        let config = RateLimitConfig::new(5, 60);
        let start = config.window_start_ms(T0);
        let decision = RateLimitDecision::from_count(6, &config, start);

        assert_eq!(decision.reset_at.timestamp_millis(), start + 60_000);
        let now = Utc.timestamp_millis_opt(start + 59_500).single().unwrap();
        assert_eq!(decision.retry_after_secs(now), 1);
        let now = Utc.timestamp_millis_opt(start).single().unwrap();
        assert_eq!(decision.retry_after_secs(now), 60);
    }

    #[test]
    fn test_purge_before() {
        let store = MemoryRateLimitStore::new();
        let config = RateLimitConfig::new(5, 60);
        store.check_and_increment_at("old", &config, T0);
        store.check_and_increment_at("new", &config, T0 + 3_600_000);

        assert_eq!(store.purge_before(T0 + 60_000), 1);
    }

    #[test]
    fn test_concurrent_increments_never_exceed_limit() {
        let store = Arc::new(MemoryRateLimitStore::new());
        let config = RateLimitConfig::new(10, 60);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..5)
                        .filter(|_| store.check_and_increment_at("k", &config, T0).allowed)
                        .count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 10);
    }
}
