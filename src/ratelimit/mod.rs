//! Fixed-window rate limiting
//!
//! [`RateLimiter`] owns the policy (how many requests per window) while the
//! counters live behind [`RateLimitStore`], so the in-process
//! [`MemoryStore`] can be replaced by a shared store without touching the
//! HTTP layer. Counters in [`MemoryStore`] are per-process: several server
//! instances each enforce the limit on their own.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::RateLimitConfig;

/// Counter state of one key's current window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowEntry {
    /// Requests seen in this window, including the current one
    pub count: u32,
    /// When the window closes
    pub reset_at: DateTime<Utc>,
}

/// Storage for rate-limit counters
pub trait RateLimitStore: Send + Sync {
    /// Count one request for `key` at `now` and return the updated window.
    ///
    /// A new window of length `window` starts when the key is unknown or its
    /// previous window has closed (`now >= reset_at`). Must be atomic per key.
    fn record(&self, key: &str, now: DateTime<Utc>, window: Duration) -> WindowEntry;

    /// Forget windows that closed before `now`
    fn purge_expired(&self, now: DateTime<Utc>);
}

/// Process-local counter store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, WindowEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, WindowEntry>> {
        // Counters stay usable after a panic in another holder
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RateLimitStore for MemoryStore {
    fn record(&self, key: &str, now: DateTime<Utc>, window: Duration) -> WindowEntry {
        let reset_at = now
            .checked_add_signed(window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut entries = self.lock();
        let entry = entries
            .entry(key.to_string())
            .and_modify(|e| {
                if now >= e.reset_at {
                    *e = WindowEntry { count: 1, reset_at };
                } else {
                    e.count = e.count.saturating_add(1);
                }
            })
            .or_insert(WindowEntry { count: 1, reset_at });
        *entry
    }

    fn purge_expired(&self, now: DateTime<Utc>) {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| e.reset_at > now);
        let purged = before - entries.len();
        if purged > 0 {
            tracing::debug!("Purged {} expired rate-limit windows", purged);
        }
    }
}

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed {
        limit: u32,
        remaining: u32,
        reset_at: DateTime<Utc>,
    },
    Limited {
        limit: u32,
        /// Whole seconds until the window closes, at least 1
        retry_after: u64,
        reset_at: DateTime<Utc>,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// Allows `max_requests` per key in each fixed window
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    /// Create a limiter over the given store
    pub fn new(store: Arc<dyn RateLimitStore>, max_requests: u32, window: Duration) -> Self {
        Self {
            store,
            max_requests,
            window,
        }
    }

    /// Create a limiter backed by a fresh [`MemoryStore`]
    pub fn in_memory(max_requests: u32, window: Duration) -> Self {
        Self::new(Arc::new(MemoryStore::new()), max_requests, window)
    }

    /// Build from configuration; `None` when rate limiting is disabled
    pub fn from_config(config: &RateLimitConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let window_secs = config
            .window_secs
            .clamp(1, RateLimitConfig::MAX_WINDOW_SECS);
        // Bounded by MAX_WINDOW_SECS, well inside chrono's range
        let window_secs = i64::try_from(window_secs).unwrap_or(1);
        Some(Self::in_memory(
            config.max_requests,
            Duration::seconds(window_secs),
        ))
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a request for `key` and decide whether it may proceed
    pub fn check(&self, key: &str, now: DateTime<Utc>) -> Decision {
        let entry = self.store.record(key, now, self.window);

        if entry.count <= self.max_requests {
            Decision::Allowed {
                limit: self.max_requests,
                remaining: self.max_requests - entry.count,
                reset_at: entry.reset_at,
            }
        } else {
            let millis = (entry.reset_at - now).num_milliseconds().max(0);
            let retry_after = u64::try_from((millis + 999) / 1000).unwrap_or(0).max(1);
            Decision::Limited {
                limit: self.max_requests,
                retry_after,
                reset_at: entry.reset_at,
            }
        }
    }

    /// Drop closed windows from the store
    pub fn purge_expired(&self, now: DateTime<Utc>) {
        self.store.purge_expired(now);
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.max_requests)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_allows_up_to_limit_then_limits() {
        let limiter = RateLimiter::in_memory(3, Duration::seconds(60));
        let now = t0();

        let remaining: Vec<u32> = (0..3)
            .map(|_| match limiter.check("1.2.3.4", now) {
                Decision::Allowed { remaining, .. } => remaining,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        assert_eq!(
            limiter.check("1.2.3.4", now + Duration::seconds(15)),
            Decision::Limited {
                limit: 3,
                retry_after: 45,
                reset_at: now + Duration::seconds(60),
            }
        );
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::in_memory(1, Duration::seconds(10));
        let now = t0();

        assert!(limiter.check("k", now).is_allowed());
        assert!(!limiter.check("k", now + Duration::seconds(9)).is_allowed());
        assert!(limiter.check("k", now + Duration::seconds(10)).is_allowed());
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::in_memory(1, Duration::seconds(10));
        let now = t0();

        assert!(limiter.check("a", now).is_allowed());
        assert!(limiter.check("b", now).is_allowed());
        assert!(!limiter.check("a", now).is_allowed());
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let limiter = RateLimiter::in_memory(0, Duration::seconds(10));
        let now = t0();

        match limiter.check("k", now + Duration::milliseconds(0)) {
            Decision::Limited { retry_after, .. } => assert_eq!(retry_after, 10),
            other => panic!("unexpected {:?}", other),
        }
        match limiter.check("k", now + Duration::milliseconds(9_500)) {
            Decision::Limited { retry_after, .. } => assert_eq!(retry_after, 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_purge_expired() {
        let store = Arc::new(MemoryStore::new());
        let limiter = RateLimiter::new(store.clone(), 5, Duration::seconds(10));
        let now = t0();

        limiter.check("old", now);
        limiter.check("new", now + Duration::seconds(8));
        assert_eq!(store.len(), 2);

        limiter.purge_expired(now + Duration::seconds(12));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_custom_store_is_used() {
        /// Store that reports every key as already over any limit
        struct Saturated;

        impl RateLimitStore for Saturated {
            fn record(&self, _key: &str, now: DateTime<Utc>, window: Duration) -> WindowEntry {
                WindowEntry {
                    count: u32::MAX,
                    reset_at: now + window,
                }
            }

            fn purge_expired(&self, _now: DateTime<Utc>) {}
        }

        let limiter = RateLimiter::new(Arc::new(Saturated), 100, Duration::seconds(5));
        assert!(!limiter.check("anyone", t0()).is_allowed());
    }

    #[test]
    fn test_from_config() {
        let config = RateLimitConfig {
            enabled: true,
            max_requests: 7,
            window_secs: 30,
        };
        let limiter = RateLimiter::from_config(&config).unwrap();
        assert_eq!(limiter.max_requests(), 7);
        assert_eq!(limiter.window(), Duration::seconds(30));

        let disabled = RateLimitConfig {
            enabled: false,
            ..config
        };
        assert!(RateLimiter::from_config(&disabled).is_none());
    }

    #[test]
    fn test_from_config_clamps_window() {
        let config = RateLimitConfig {
            enabled: true,
            max_requests: 1,
            window_secs: 10_000_000_000_000_000,
        };
        let limiter = RateLimiter::from_config(&config).unwrap();
        assert_eq!(
            limiter.window(),
            Duration::seconds(RateLimitConfig::MAX_WINDOW_SECS as i64)
        );
        assert!(limiter.check("k", t0()).is_allowed());
    }

    #[test]
    fn test_window_past_end_of_time_saturates() {
        let limiter = RateLimiter::in_memory(1, Duration::days(365 * 300_000));
        let now = t0();

        assert!(limiter.check("k", now).is_allowed());
        match limiter.check("k", now) {
            Decision::Limited { reset_at, .. } => assert_eq!(reset_at, DateTime::<Utc>::MAX_UTC),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_concurrent_counting() {
        let limiter = RateLimiter::in_memory(1000, Duration::seconds(60));
        let now = t0();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        limiter.check("shared", now);
                    }
                });
            }
        });

        match limiter.check("shared", now) {
            Decision::Allowed { remaining, .. } => assert_eq!(remaining, 1000 - 401),
            other => panic!("unexpected {:?}", other),
        }
    }
}
