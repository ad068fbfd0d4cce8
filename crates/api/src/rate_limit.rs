//! Fixed-window rate limiting for status checks.
//!
//! Counts requests per key (`ip:video_id`) over a rolling fixed window.
//! State is in-memory and process-local, matching the scope of the polling
//! registry it protects.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Length of the counting window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Maximum requests per key per window (1 per second on average).
pub const MAX_REQUESTS_PER_WINDOW: u32 = 60;

/// Expired windows are pruned once the table grows past this.
const PRUNE_THRESHOLD: usize = 1024;

struct Window {
    count: u32,
    reset_at: Instant,
}

/// In-memory fixed-window request counter.
pub struct FixedWindowLimiter {
    window: Duration,
    max_requests: u32,
    windows: Mutex<HashMap<String, Window>>,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record a request for `key` and report whether it is allowed.
    ///
    /// The first request for a key (or the first after its window expired)
    /// opens a fresh window.
    pub async fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, w| w.reset_at > now);
        }

        match windows.get_mut(key) {
            Some(window) if window.reset_at > now => {
                window.count += 1;
                if window.count > self.max_requests {
                    tracing::warn!(key = %key, "Rate limit exceeded");
                    return false;
                }
                true
            }
            _ => {
                windows.insert(
                    key.to_string(),
                    Window {
                        count: 1,
                        reset_at: now + self.window,
                    },
                );
                true
            }
        }
    }
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::new(RATE_LIMIT_WINDOW, MAX_REQUESTS_PER_WINDOW)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn allows_up_to_the_limit_then_rejects() {
        let limiter = FixedWindowLimiter::default();

        for _ in 0..MAX_REQUESTS_PER_WINDOW {
            assert!(limiter.allow("ip:vid-1").await);
        }
        assert!(!limiter.allow("ip:vid-1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn window_expiry_readmits_the_key() {
        let limiter = FixedWindowLimiter::default();

        for _ in 0..=MAX_REQUESTS_PER_WINDOW {
            limiter.allow("ip:vid-1").await;
        }
        assert!(!limiter.allow("ip:vid-1").await);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.allow("ip:vid-1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_counted_independently() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 1);

        assert!(limiter.allow("a:vid-1").await);
        assert!(!limiter.allow("a:vid-1").await);
        assert!(limiter.allow("b:vid-1").await);
        assert!(limiter.allow("a:vid-2").await);
    }
}
