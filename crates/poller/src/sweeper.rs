//! Periodic registry sweep.
//!
//! A second, independent timer that force-unregisters leaked sessions
//! (loops that died without cleaning up, or sessions past the maximum
//! polling duration). Runs for the lifetime of the process and is stopped
//! through its cancellation token during shutdown.

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::registry::PollingRegistry;

/// Spawn the sweep task for `registry`.
///
/// Sweeps every [`PollingConfig::sweep_interval`](ghostwriters_core::polling::PollingConfig)
/// until `cancel` is triggered.
pub fn spawn_sweeper(
    registry: PollingRegistry,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(registry.config().sweep_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The zeroth tick fires immediately; skip it so a freshly started
        // service does not sweep before any session had a chance to check in.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Sweeper stopped");
                    return;
                }
                _ = interval.tick() => {}
            }

            let removed = registry.sweep().await;
            if !removed.is_empty() {
                tracing::info!(count = removed.len(), ids = ?removed, "Swept leaked polling sessions");
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ghostwriters_core::polling::PollingConfig;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sweeper_removes_stale_sessions() {
        let registry = PollingRegistry::new(PollingConfig::default()).unwrap();
        registry.register("vid-leaked").await.unwrap();

        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(registry.clone(), cancel.clone());

        // Nothing touches the session; the 5s staleness threshold passes
        // well before the first sweep at t=10s.
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(!registry.is_polling("vid-leaked").await);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_leaves_fresh_sessions_alone() {
        let registry = PollingRegistry::new(PollingConfig::default()).unwrap();
        registry.register("vid-live").await.unwrap();

        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(registry.clone(), cancel.clone());

        // Touch the session more often than the staleness threshold.
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_secs(3)).await;
            registry.touch("vid-live").await;
        }

        assert!(registry.is_polling("vid-live").await);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_sweeper_exits() {
        let registry = PollingRegistry::new(PollingConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(registry, cancel.clone());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should exit promptly")
            .unwrap();
    }
}
