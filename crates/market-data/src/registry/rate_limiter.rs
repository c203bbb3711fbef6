//! Token bucket rate limiter for market data providers.
//!
//! Each provider id gets its own bucket. Capacity and refill come from the
//! provider's `requests_per_minute` setting, falling back to defaults.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};

/// Default rate limit: 60 requests per minute.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;

/// Burst allowance per provider.
const BUCKET_CAPACITY: f64 = 10.0;

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
    /// Tokens per second.
    rate: f64,
    capacity: f64,
}

impl TokenBucket {
    fn new(requests_per_minute: u32) -> Self {
        let per_minute = requests_per_minute.max(1) as f64;
        let capacity = BUCKET_CAPACITY.min(per_minute);
        Self {
            tokens: capacity,
            last_update: Instant::now(),
            rate: per_minute / 60.0,
            capacity,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn time_until_available(&mut self) -> Duration {
        self.refill();
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        }
    }
}

/// Per-provider token buckets, safe to share across tasks.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    limits: Mutex<HashMap<String, u32>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            limits: Mutex::new(HashMap::new()),
        }
    }

    /// A poisoned lock only means slightly wrong pacing; recover instead of
    /// panicking.
    fn lock_buckets(&self) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter buckets mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_limits(&self) -> MutexGuard<'_, HashMap<String, u32>> {
        self.limits.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter limits mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Set the limit for a provider. Resets its bucket when the limit changed.
    pub fn configure(&self, provider: &str, requests_per_minute: u32) {
        let previous = self
            .lock_limits()
            .insert(provider.to_string(), requests_per_minute);
        if previous != Some(requests_per_minute) {
            self.lock_buckets().remove(provider);
        }
    }

    /// Wait until a token is available for the provider.
    pub async fn acquire(&self, provider: &str) {
        loop {
            let wait_time = {
                let limit = self.limit_for(provider);
                let mut buckets = self.lock_buckets();
                let bucket = buckets
                    .entry(provider.to_string())
                    .or_insert_with(|| TokenBucket::new(limit));

                if bucket.try_acquire() {
                    return;
                }
                bucket.time_until_available()
            };

            debug!("Rate limiter: waiting {:?} for provider '{}'", wait_time, provider);
            tokio::time::sleep(wait_time).await;
        }
    }

    /// Take a token without waiting.
    pub fn try_acquire(&self, provider: &str) -> bool {
        let limit = self.limit_for(provider);
        let mut buckets = self.lock_buckets();
        buckets
            .entry(provider.to_string())
            .or_insert_with(|| TokenBucket::new(limit))
            .try_acquire()
    }

    fn limit_for(&self, provider: &str) -> u32 {
        self.lock_limits()
            .get(provider)
            .copied()
            .unwrap_or(DEFAULT_REQUESTS_PER_MINUTE)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
