//! Rate limiting for outbound lookup calls.
//!
//! Each external source gets its own [`ThrottlingQueue`] sized from a
//! [`SourcePolicy`]. When budget is exhausted the acquire fails with
//! the recommended backoff delay; the resolver treats that as a
//! rate-limit outcome and stops burning further variants against the
//! same source.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Exponential backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            max_retries: 3,
        }
    }
}

/// Rate budget for one external source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePolicy {
    pub quota_window: Duration,
    pub quota_limit: u32,
    pub retry_backoff: BackoffPolicy,
}

impl SourcePolicy {
    /// Conservative free-tier default: 30 calls per minute.
    pub fn free_tier_default() -> Self {
        Self {
            quota_window: Duration::from_secs(60),
            quota_limit: 30,
            retry_backoff: BackoffPolicy::default(),
        }
    }
}

impl Default for SourcePolicy {
    fn default() -> Self {
        Self::free_tier_default()
    }
}

/// In-memory rate limiter with backoff recommendations.
#[derive(Clone)]
pub struct ThrottlingQueue {
    limiter: Arc<DirectRateLimiter>,
    retry_backoff: BackoffPolicy,
}

impl ThrottlingQueue {
    pub fn new(quota_window: Duration, quota_limit: u32, retry_backoff: BackoffPolicy) -> Self {
        let quota = quota_from_window(quota_window, quota_limit);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            retry_backoff,
        }
    }

    pub fn from_policy(policy: &SourcePolicy) -> Self {
        Self::new(
            policy.quota_window,
            policy.quota_limit,
            policy.retry_backoff.clone(),
        )
    }

    /// Tries to acquire rate budget; when budget is unavailable the
    /// recommended backoff delay is returned instead.
    pub fn acquire(&self) -> Result<(), Duration> {
        if self.limiter.check().is_ok() {
            return Ok(());
        }
        Err(self.retry_delay(0).unwrap_or(self.retry_backoff.max_delay))
    }

    /// Backoff delay for the given retry count, capped at the policy
    /// maximum; `None` once retries are exhausted.
    pub fn retry_delay(&self, retry_count: u32) -> Option<Duration> {
        if retry_count > self.retry_backoff.max_retries {
            return None;
        }

        let scale = self.retry_backoff.multiplier.powf(f64::from(retry_count));
        let seconds = self.retry_backoff.initial_delay.as_secs_f64() * scale;
        let capped_seconds = seconds.min(self.retry_backoff.max_delay.as_secs_f64());
        Some(Duration::from_secs_f64(capped_seconds))
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let safe_limit = quota_limit.max(1);
    let burst = NonZeroU32::new(safe_limit).expect("safe limit must be non-zero");

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(safe_limit)).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .expect("period is always greater than zero")
        .allow_burst(burst)
}
