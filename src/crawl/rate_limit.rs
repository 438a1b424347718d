//! Rate limiting for web crawling

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Per-host rate limiter
///
/// Clones share the same budget, so one limiter per host is enough for
/// every task fetching from it.
#[derive(Clone)]
pub struct HostRateLimiter {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl HostRateLimiter {
    /// Create a new rate limiter for the given requests per second
    pub fn new(requests_per_second: f64) -> Self {
        let quota = if requests_per_second.is_finite() && requests_per_second > 0.0 {
            Quota::with_period(Duration::from_secs_f64(1.0 / requests_per_second))
        } else {
            None
        }
        .unwrap_or_else(|| Quota::per_second(nonzero!(1u32)));

        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Wait until the next request is allowed
    pub async fn wait(&self) {
        if self.limiter.check().is_err() {
            trace!("Rate limiting: waiting for the next slot");
            self.limiter.until_ready().await;
        }
    }
}
