//! Polling policy constants and configuration.
//!
//! A single [`PollingConfig`] is shared by the reconciliation loop, the
//! session registry, and the staleness sweeper so that every timing decision
//! comes from one place.

use std::time::Duration;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Interval between status-check ticks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Maximum total time a video may be polled before the loop gives up.
///
/// The loop stops polling at this point; it does not force the stored record
/// into a terminal status.
pub const MAX_POLLING_DURATION: Duration = Duration::from_secs(120);

/// A session that has not been checked within this window is considered
/// leaked and is removed by the sweeper.
pub const STALE_SESSION_AFTER: Duration = Duration::from_secs(5);

/// How often the sweeper scans the registry for leaked sessions.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// A non-terminal stored record older than this triggers a direct upstream
/// check instead of being served as-is.
pub const RECORD_STALENESS: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunable timing parameters for one polling deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    /// Delay between consecutive status checks.
    pub interval: Duration,
    /// Wall-clock budget for a single video before the loop times out.
    pub max_duration: Duration,
    /// Sweeper removes sessions unchecked for longer than this.
    pub stale_after: Duration,
    /// Cadence of the sweeper task.
    pub sweep_interval: Duration,
    /// Age at which a stored non-terminal record is re-checked upstream.
    pub record_staleness: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            max_duration: MAX_POLLING_DURATION,
            stale_after: STALE_SESSION_AFTER,
            sweep_interval: SWEEP_INTERVAL,
            record_staleness: RECORD_STALENESS,
        }
    }
}

impl PollingConfig {
    /// Validate the configuration.
    ///
    /// Zero durations are programmer errors and are rejected synchronously
    /// rather than producing a busy-loop or a poller that can never finish.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.interval.is_zero() {
            return Err(CoreError::Validation(
                "Polling interval must be greater than zero".to_string(),
            ));
        }
        if self.max_duration.is_zero() {
            return Err(CoreError::Validation(
                "Maximum polling duration must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(CoreError::Validation(
                "Sweep interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Override the maximum polling duration, keeping everything else.
    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PollingConfig::default().validate().is_ok());
    }

    #[test]
    fn default_max_duration_is_at_least_a_minute() {
        assert!(PollingConfig::default().max_duration >= Duration::from_secs(60));
    }

    #[test]
    fn zero_interval_rejected() {
        let config = PollingConfig {
            interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_duration_rejected() {
        let config = PollingConfig {
            max_duration: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn with_max_duration_overrides_only_that_field() {
        let config = PollingConfig::default().with_max_duration(Duration::from_secs(10));
        assert_eq!(config.max_duration, Duration::from_secs(10));
        assert_eq!(config.interval, POLL_INTERVAL);
    }
}
