//! Token bucket rate limiting for provider requests.
//!
//! Catalogs such as ASSRT meter requests per API token, so buckets are keyed
//! by a digest of the token rather than by provider.

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use super::ProviderError;

/// One token bucket. Starts full and refills continuously.
struct TokenBucket {
    capacity: f64,
    available: f64,
    /// Tokens added per second.
    per_second: f64,
    refilled_at: Instant,
}

impl TokenBucket {
    fn new(requests_per_minute: u32) -> Self {
        let capacity = f64::from(requests_per_minute.max(1));
        Self {
            capacity,
            available: capacity,
            per_second: capacity / 60.0,
            refilled_at: Instant::now(),
        }
    }

    /// Take one token, or return how long until one is available.
    fn take(&mut self) -> Result<(), Duration> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.refilled_at).as_secs_f64();
        self.available = (self.available + elapsed * self.per_second).min(self.capacity);
        self.refilled_at = now;

        if self.available >= 1.0 {
            self.available -= 1.0;
            return Ok(());
        }
        Err(Duration::from_secs_f64(
            (1.0 - self.available) / self.per_second,
        ))
    }
}

/// Buckets per API token, created on first use with the pool's rate.
pub struct RateLimiterPool {
    requests_per_minute: u32,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiterPool {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Spend one request for `api_token`.
    ///
    /// Fails with `ProviderError::RateLimited` when the bucket is empty.
    pub async fn try_acquire(&self, api_token: &str) -> Result<(), ProviderError> {
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(bucket_key(api_token))
            .or_insert_with(|| TokenBucket::new(self.requests_per_minute))
            .take()
            .map_err(|wait| ProviderError::RateLimited {
                retry_after_ms: u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
            })
    }
}

/// Buckets never hold the raw token.
fn bucket_key(api_token: &str) -> String {
    let digest = Sha256::digest(api_token.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
