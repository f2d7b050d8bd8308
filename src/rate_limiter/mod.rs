use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::config::RateLimitConfig;
use crate::errors::ServiceError;

/// Counter backend for the fixed-window limiter. In-memory by default; the
/// trait seam exists so a shared store can back multi-instance deployments.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Increments the counter for `key` and returns the new count within the
    /// current window of length `window`.
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, ServiceError>;
}

/// Keys map to `(window deadline, count)`. Lapsed windows are swept out on
/// every increment, so the map only ever holds callers active within the
/// current window.
#[derive(Default)]
pub struct InMemoryRateLimitStore {
    windows: DashMap<String, (Instant, u64)>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, ServiceError> {
        let now = Instant::now();
        self.windows.retain(|_, (deadline, _)| *deadline > now);
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert((now + window, 0));
        let (deadline, count) = *entry;
        if now >= deadline {
            *entry = (now + window, 1);
            Ok(1)
        } else {
            *entry = (deadline, count + 1);
            Ok(count + 1)
        }
    }
}

/// Fixed-window request limiter, keyed per caller identity and action.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    max_requests: u64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, config: &RateLimitConfig) -> Self {
        Self {
            store,
            max_requests: u64::from(config.requests_per_window),
            window: Duration::from_secs(config.window_secs),
        }
    }

    pub async fn check(&self, identity: &str, action: &str) -> Result<(), ServiceError> {
        let key = format!("{}:{}", action, identity);
        let count = self.store.increment(&key, self.window).await?;
        if count > self.max_requests {
            warn!(identity, action, count, "Rate limit exceeded");
            return Err(ServiceError::RateLimitExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(requests_per_window: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(
            Arc::new(InMemoryRateLimitStore::new()),
            &RateLimitConfig {
                requests_per_window,
                window_secs,
            },
        )
    }

    #[tokio::test]
    async fn allows_up_to_the_limit_then_rejects() {
        let limiter = limiter(3, 60);
        for _ in 0..3 {
            limiter.check("10.0.0.1", "checkout").await.unwrap();
        }
        let err = limiter.check("10.0.0.1", "checkout").await.unwrap_err();
        assert!(matches!(err, ServiceError::RateLimitExceeded));
    }

    #[tokio::test]
    async fn identities_are_counted_independently() {
        let limiter = limiter(1, 60);
        limiter.check("10.0.0.1", "checkout").await.unwrap();
        limiter.check("10.0.0.2", "checkout").await.unwrap();
        assert!(limiter.check("10.0.0.1", "checkout").await.is_err());
    }

    #[tokio::test]
    async fn actions_are_counted_independently() {
        let limiter = limiter(1, 60);
        limiter.check("10.0.0.1", "checkout").await.unwrap();
        limiter.check("10.0.0.1", "webhook").await.unwrap();
    }

    #[tokio::test]
    async fn window_expiry_resets_the_counter() {
        let limiter = limiter(1, 0);
        limiter.check("10.0.0.1", "checkout").await.unwrap();
        limiter.check("10.0.0.1", "checkout").await.unwrap();
    }

    #[tokio::test]
    async fn lapsed_windows_are_evicted_from_the_store() {
        let store = InMemoryRateLimitStore::new();
        // A zero-length window lapses immediately, so the next increment for
        // any caller must sweep the stale key out entirely
        store
            .increment("checkout:10.0.0.1", Duration::ZERO)
            .await
            .unwrap();
        assert!(store.windows.contains_key("checkout:10.0.0.1"));

        store
            .increment("checkout:10.0.0.2", Duration::ZERO)
            .await
            .unwrap();
        assert!(!store.windows.contains_key("checkout:10.0.0.1"));
        assert_eq!(store.windows.len(), 1);
    }
}
