//! Process-wide rate limiting for NCBI E-utilities requests.
//!
//! The E-utilities ceiling is per API account, not per discovery run, so one
//! limiter instance is shared across every concurrent run in the process and
//! serializes outbound request pacing.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use nonzero_ext::nonzero;
use std::sync::Arc;
use std::time::Duration;

type DirectLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default spacing: 110ms between requests, ~9 req/s, a safe buffer under
/// NCBI's 10 req/s keyed ceiling.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(110);

/// Minimum-interval limiter over the governor direct rate limiter.
///
/// One cell per period with no burst, so consecutive `acquire` calls are
/// never spaced closer than the configured interval.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<DirectLimiter>,
    interval: Duration,
}

impl RateLimiter {
    /// Create a limiter with the given minimum inter-request interval.
    /// Sub-nanosecond intervals are clamped to one nanosecond.
    pub fn new(min_interval: Duration) -> Self {
        let quota = Quota::with_period(min_interval)
            .unwrap_or_else(|| Quota::per_second(nonzero!(1_000_000_000u32)));
        Self {
            inner: Arc::new(governor::RateLimiter::direct(quota)),
            interval: min_interval.max(Duration::from_nanos(1)),
        }
    }

    /// Suspend the caller until the minimum interval since the previous
    /// acquisition has elapsed. This is the only blocking point in the layer.
    pub async fn acquire(&self) {
        self.inner.until_ready().await;
    }

    /// The configured minimum inter-request interval.
    pub fn min_interval(&self) -> Duration {
        self.interval
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}
