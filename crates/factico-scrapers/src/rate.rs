//! Token-bucket rate limiting, keyed by adapter.
//!
//! Each adapter gets a bucket with a capacity and a refill rate. A fetch
//! consumes one token; an empty bucket means the adapter sits out the
//! current tick and the next schedule retries.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// A single token bucket.
#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token buckets keyed by adapter name.
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    /// Create a limiter where every bucket holds `capacity` tokens and
    /// refills at `refill_per_sec`.
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            capacity: f64::from(capacity),
            refill_per_sec: refill_per_sec.max(0.0),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Try to take one token from the adapter's bucket.
    pub fn try_acquire(&self, adapter: &str) -> bool {
        let Ok(mut buckets) = self.buckets.lock() else {
            return false;
        };
        let now = Instant::now();
        let bucket = buckets.entry(adapter.to_owned()).or_insert(Bucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = self
            .refill_per_sec
            .mul_add(elapsed, bucket.tokens)
            .min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_starts_full_and_drains() {
        let limiter = RateLimiter::new(2, 0.0);
        assert!(limiter.try_acquire("rss"));
        assert!(limiter.try_acquire("rss"));
        assert!(!limiter.try_acquire("rss"), "third acquire must fail");
    }

    #[test]
    fn buckets_are_independent_per_adapter() {
        let limiter = RateLimiter::new(1, 0.0);
        assert!(limiter.try_acquire("rss"));
        assert!(limiter.try_acquire("social"), "other adapter has its own bucket");
        assert!(!limiter.try_acquire("rss"));
    }

    #[test]
    fn bucket_refills_over_time() {
        let limiter = RateLimiter::new(1, 1000.0);
        assert!(limiter.try_acquire("video"));
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(limiter.try_acquire("video"), "fast refill should restore a token");
    }
}
