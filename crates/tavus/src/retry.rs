//! Linear-backoff retry policy for generation-service requests.
//!
//! The wait between attempts grows linearly (`base_delay × attempt`), i.e.
//! 1s, 2s, 3s with the default base. The schedule is deliberately linear,
//! not exponential.

use std::time::Duration;

/// Tunable parameters for the retry strategy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure. The total number of
    /// attempts is `max_retries + 1`.
    pub max_retries: u32,
    /// Budget for a single attempt; an attempt that exceeds it counts as a
    /// failure for that attempt.
    pub attempt_timeout: Duration,
    /// Unit of the linear backoff between attempts.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            attempt_timeout: Duration::from_secs(30),
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with an explicit retry count and per-attempt timeout.
    ///
    /// # Panics
    ///
    /// Panics if `attempt_timeout` is zero; that is a programmer error, not
    /// a runtime condition.
    pub fn new(max_retries: u32, attempt_timeout: Duration) -> Self {
        assert!(
            !attempt_timeout.is_zero(),
            "attempt_timeout must be greater than zero"
        );
        Self {
            max_retries,
            attempt_timeout,
            ..Default::default()
        }
    }

    /// Use a different backoff unit (shrunk in tests to keep them fast).
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }
}

/// Delay to wait after the `attempt`-th failed attempt (1-based).
pub fn next_retry_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    policy.base_delay.saturating_mul(attempt)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
