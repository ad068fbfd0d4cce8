//! Registry of active polling sessions.
//!
//! Tracks one [`PollingSession`] per video id. Registration rejects
//! duplicates so a video can never be polled by two timers at once;
//! unregistration is idempotent. [`PollingRegistry::sweep`] force-removes
//! sessions that exceeded the maximum polling duration or have not been
//! checked recently, the safety net run by the [`sweeper`](crate::sweeper)
//! task.
//!
//! The registry is an explicit, constructor-injected handle (cheaply
//! cloneable) rather than process-global state, so tests can each use their
//! own instance.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use ghostwriters_core::error::CoreError;
use ghostwriters_core::polling::PollingConfig;

/// Bookkeeping for one active polling loop.
struct PollingSession {
    started_at: Instant,
    last_checked_at: Instant,
    /// Cancelling this token stops the owning loop.
    cancel: CancellationToken,
}

/// Shared registry of active polling sessions, keyed by video id.
#[derive(Clone)]
pub struct PollingRegistry {
    sessions: Arc<Mutex<HashMap<String, PollingSession>>>,
    config: PollingConfig,
}

impl PollingRegistry {
    /// Create a registry with the given polling configuration.
    ///
    /// Fails on invalid configuration (zero durations).
    pub fn new(config: PollingConfig) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            config,
        })
    }

    /// Timing configuration shared by every session in this registry.
    pub fn config(&self) -> &PollingConfig {
        &self.config
    }

    /// Register a new polling session for `video_id`.
    ///
    /// Returns the session's cancellation token, or `None` when a session
    /// for this id is already active (the existing timer is untouched).
    pub async fn register(&self, video_id: &str) -> Option<CancellationToken> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(video_id) {
            tracing::debug!(video_id = %video_id, "Polling already registered, rejecting duplicate");
            return None;
        }

        let now = Instant::now();
        let cancel = CancellationToken::new();
        sessions.insert(
            video_id.to_string(),
            PollingSession {
                started_at: now,
                last_checked_at: now,
                cancel: cancel.clone(),
            },
        );

        tracing::debug!(
            video_id = %video_id,
            active = sessions.len(),
            "Registered polling session",
        );
        Some(cancel)
    }

    /// Record that a status check completed for `video_id`.
    pub async fn touch(&self, video_id: &str) {
        if let Some(session) = self.sessions.lock().await.get_mut(video_id) {
            session.last_checked_at = Instant::now();
        }
    }

    /// Remove the session for `video_id`, cancelling its loop.
    ///
    /// Idempotent: returns `false` (not an error) when no session exists.
    pub async fn unregister(&self, video_id: &str) -> bool {
        let removed = self.sessions.lock().await.remove(video_id);
        match removed {
            Some(session) => {
                session.cancel.cancel();
                tracing::debug!(video_id = %video_id, "Unregistered polling session");
                true
            }
            None => false,
        }
    }

    /// Whether a session is currently active for `video_id`.
    pub async fn is_polling(&self, video_id: &str) -> bool {
        self.sessions.lock().await.contains_key(video_id)
    }

    /// Elapsed wall-clock time since the session started, if one is active.
    pub async fn elapsed(&self, video_id: &str) -> Option<Duration> {
        self.sessions
            .lock()
            .await
            .get(video_id)
            .map(|s| s.started_at.elapsed())
    }

    /// Number of active sessions.
    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Ids of all active sessions.
    pub async fn active_video_ids(&self) -> Vec<String> {
        self.sessions.lock().await.keys().cloned().collect()
    }

    /// Force-remove leaked sessions, returning the removed ids.
    ///
    /// A session is leaked when it has run past the maximum polling
    /// duration, or when nothing has checked in within the staleness
    /// threshold (its loop has died without unregistering).
    pub async fn sweep(&self) -> Vec<String> {
        let mut sessions = self.sessions.lock().await;
        let mut removed = Vec::new();

        sessions.retain(|video_id, session| {
            let elapsed = session.started_at.elapsed();
            let since_check = session.last_checked_at.elapsed();

            if elapsed > self.config.max_duration {
                tracing::warn!(
                    video_id = %video_id,
                    elapsed_secs = elapsed.as_secs(),
                    "Sweeping session past maximum polling duration",
                );
            } else if since_check > self.config.stale_after {
                tracing::warn!(
                    video_id = %video_id,
                    since_check_ms = since_check.as_millis() as u64,
                    "Sweeping stale session",
                );
            } else {
                return true;
            }

            session.cancel.cancel();
            removed.push(video_id.clone());
            false
        });

        removed
    }

    /// Cancel and remove every session (used during shutdown).
    pub async fn shutdown(&self) {
        let mut sessions = self.sessions.lock().await;
        for (video_id, session) in sessions.drain() {
            tracing::debug!(video_id = %video_id, "Cancelling polling session on shutdown");
            session.cancel.cancel();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PollingRegistry {
        PollingRegistry::new(PollingConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn register_rejects_duplicates() {
        let registry = registry();

        assert!(registry.register("vid-1").await.is_some());
        assert!(registry.register("vid-1").await.is_none());
        assert_eq!(registry.active_count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_register_keeps_the_original_token() {
        let registry = registry();

        let token = registry.register("vid-1").await.unwrap();
        registry.register("vid-1").await;
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let registry = registry();
        registry.register("vid-1").await.unwrap();

        assert!(registry.unregister("vid-1").await);
        assert!(!registry.unregister("vid-1").await);
        assert!(!registry.is_polling("vid-1").await);
    }

    #[tokio::test]
    async fn unregister_cancels_the_session_token() {
        let registry = registry();
        let token = registry.register("vid-1").await.unwrap();

        registry.unregister("vid-1").await;
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_follows_the_clock() {
        let registry = registry();
        registry.register("vid-1").await.unwrap();

        tokio::time::advance(Duration::from_secs(7)).await;
        assert_eq!(registry.elapsed("vid-1").await, Some(Duration::from_secs(7)));
        assert_eq!(registry.elapsed("other").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_sessions_past_max_duration() {
        let config = PollingConfig::default().with_max_duration(Duration::from_secs(10));
        let registry = PollingRegistry::new(config).unwrap();
        let token = registry.register("vid-old").await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        let removed = registry.sweep().await;

        assert_eq!(removed, vec!["vid-old".to_string()]);
        assert!(token.is_cancelled());
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_unchecked_sessions_but_keeps_fresh_ones() {
        let registry = registry();
        registry.register("vid-stale").await.unwrap();
        registry.register("vid-fresh").await.unwrap();

        // Past the 5s staleness threshold; only vid-fresh gets touched.
        tokio::time::advance(Duration::from_secs(4)).await;
        registry.touch("vid-fresh").await;
        tokio::time::advance(Duration::from_secs(2)).await;

        let removed = registry.sweep().await;
        assert_eq!(removed, vec!["vid-stale".to_string()]);
        assert!(registry.is_polling("vid-fresh").await);
    }

    #[tokio::test]
    async fn shutdown_cancels_everything() {
        let registry = registry();
        let t1 = registry.register("vid-1").await.unwrap();
        let t2 = registry.register("vid-2").await.unwrap();

        registry.shutdown().await;

        assert!(t1.is_cancelled());
        assert!(t2.is_cancelled());
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn zero_interval_config_is_rejected() {
        let config = PollingConfig {
            interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(PollingRegistry::new(config).is_err());
    }
}
