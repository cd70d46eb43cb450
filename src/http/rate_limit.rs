//! Client-side request pacing
//!
//! A token bucket (governor) that spaces calls to one provider. Pacing is
//! optional and never retries: a 429 from the provider is still surfaced
//! as `RateLimited`.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Pacing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimiterConfig {
    /// Sustained requests per second
    pub requests_per_second: u32,
    /// Requests allowed back to back before pacing kicks in
    pub burst_size: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
            burst_size: 10,
        }
    }
}

impl RateLimiterConfig {
    /// Create a pacing config
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size,
        }
    }

    fn quota(&self) -> Quota {
        let rate = NonZeroU32::new(self.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(self.burst_size).unwrap_or(NonZeroU32::MIN);
        Quota::per_second(rate).allow_burst(burst)
    }
}

/// Shared token bucket; clones pace against the same bucket
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
    config: RateLimiterConfig,
}

impl RateLimiter {
    /// Create a limiter. Zero rates are clamped to one.
    pub fn new(config: &RateLimiterConfig) -> Self {
        Self {
            limiter: Arc::new(Governor::direct(config.quota())),
            config: *config,
        }
    }

    /// Wait for a permit
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Take a permit if one is available right now
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// The configuration this limiter was built from
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("requests_per_second", &self.config.requests_per_second)
            .field("burst_size", &self.config.burst_size)
            .finish()
    }
}
