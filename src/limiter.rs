//! Per-key admission control for outbound requests.
//!
//! Every upstream host gets its own token bucket. A bucket starts full,
//! spends one token per operation, and earns tokens back continuously at the
//! configured rate (never above capacity). When a bucket is empty the caller
//! waits, it never gets an error: upstream politeness is enforced by delay,
//! not refusal.
//!
//! Tokens are tracked as `f64` so fractional refill credit survives between
//! polls and a slow bucket cannot get starved by rounding.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};
use tracing::trace;

#[derive(Debug, Clone, Copy)]
struct BucketLimits {
    capacity: f64,
    refill_per_sec: f64,
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    limits: BucketLimits,
}

impl TokenBucket {
    fn new(limits: BucketLimits, now: Instant) -> Self {
        Self {
            tokens: limits.capacity,
            last_refill: now,
            limits,
        }
    }

    /// Credit tokens for the time elapsed since the last refill, clamped to
    /// capacity, and advance the refill mark.
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed <= 0.0 {
            return;
        }
        self.tokens =
            (self.tokens + elapsed * self.limits.refill_per_sec).min(self.limits.capacity);
        self.last_refill = now;
    }

    /// Take one token if available, otherwise report how long until the
    /// deficit refills.
    fn try_take(&mut self, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return Ok(());
        }
        let deficit = 1.0 - self.tokens;
        let wait = deficit / self.limits.refill_per_sec;
        // Floor at 1ms so float dust near a full token cannot busy-loop.
        Err(Duration::from_secs_f64(wait.max(0.001)))
    }
}

/// Keyed token-bucket limiter.
///
/// All buckets created by one limiter share the same capacity and refill
/// rate; buckets are lazily created the first time a key is seen and never
/// interfere with each other.
pub struct RateLimiter {
    limits: Option<BucketLimits>,
    buckets: Mutex<HashMap<String, Arc<Mutex<TokenBucket>>>>,
}

impl RateLimiter {
    /// Limiter where each key's bucket holds `capacity` tokens and refills at
    /// `refill_per_sec` tokens per second.
    ///
    /// Capacity is clamped to at least 1 and the refill rate to a small
    /// positive value, since a bucket that can never refill would block its
    /// key forever.
    #[must_use]
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        let limits = BucketLimits {
            capacity: f64::from(capacity.max(1)),
            refill_per_sec: if refill_per_sec > 0.0 { refill_per_sec } else { 0.001 },
        };
        Self {
            limits: Some(limits),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Limiter that admits everything immediately. Useful in tests and for
    /// trusted upstreams.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            limits: None,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Run `operation` once a token is available for `key`.
    ///
    /// The token is consumed immediately before `operation` starts, so a
    /// caller that gives up while waiting has spent nothing. The operation's
    /// output is returned untouched; the limiter adds no failure mode of its
    /// own.
    pub async fn execute<T, F, Fut>(&self, key: &str, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.acquire(key).await;
        operation().await
    }

    /// Wait until a token is available for `key` and consume it.
    pub async fn acquire(&self, key: &str) {
        let Some(bucket) = self.bucket(key).await else {
            return; // unlimited
        };
        loop {
            let wait = {
                let mut bucket = bucket.lock().await;
                match bucket.try_take(Instant::now()) {
                    Ok(()) => return,
                    Err(wait) => wait,
                }
            };
            trace!(key, wait_ms = wait.as_millis() as u64, "bucket empty, waiting");
            sleep(wait).await;
        }
    }

    async fn bucket(&self, key: &str) -> Option<Arc<Mutex<TokenBucket>>> {
        let limits = self.limits?;
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::new(limits, Instant::now()))));
        Some(Arc::clone(bucket))
    }

    /// Number of keys with a bucket allocated.
    pub async fn tracked_keys(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

impl Default for RateLimiter {
    /// Conservative per-host default: bursts of 5, two requests per second
    /// sustained.
    fn default() -> Self {
        Self::new(5, 2.0)
    }
}
