//! The per-video reconciliation loop.
//!
//! [`VideoPoller::run`] owns the full lifecycle of one polling session:
//! register, tick on a fixed interval, classify each probe result, stop on a
//! terminal condition or when the wall-clock budget runs out, unregister.
//! Transient failures never stop the loop: they are logged and the next
//! tick tries again.

use std::sync::Arc;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use ghostwriters_core::block_list::is_blocked;
use ghostwriters_core::status::VideoStatus;
use ghostwriters_events::{EventBus, VideoEvent};

use crate::probe::{ProbeError, StatusProbe};
use crate::registry::PollingRegistry;

/// Where a polling session ended up.
///
/// Every variant is terminal: the session is out of the registry by the
/// time a caller sees one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Playback URL resolved (may still be absent if the service reported
    /// `ready` without one).
    Ready { url: Option<String> },
    /// The service reported the job failed.
    Failed,
    /// The wall-clock budget elapsed without resolution. One best-effort
    /// force-check was made before giving up; the caller may offer a manual
    /// retry.
    TimedOut,
    /// Block-listed id or HTTP 410 from the status check.
    Blocked,
    /// HTTP 404: nobody knows this video.
    NotFound,
    /// HTTP 429: the session stops rather than hammer the service.
    RateLimited,
    /// The owning context tore the session down.
    Cancelled,
}

/// Failure to start a polling session.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// A session for this video is already active; the existing timer is
    /// left untouched.
    #[error("polling already active for video {0}")]
    AlreadyPolling(String),
}

/// Drives reconciliation loops against a shared registry and probe.
pub struct VideoPoller<P: StatusProbe> {
    probe: Arc<P>,
    registry: PollingRegistry,
    events: Arc<EventBus>,
}

impl<P: StatusProbe> VideoPoller<P> {
    pub fn new(probe: Arc<P>, registry: PollingRegistry, events: Arc<EventBus>) -> Self {
        Self {
            probe,
            registry,
            events,
        }
    }

    /// The registry this poller registers sessions in.
    pub fn registry(&self) -> &PollingRegistry {
        &self.registry
    }

    /// Poll `video_id` until a terminal condition.
    ///
    /// Block-listed ids return [`PollOutcome::Blocked`] immediately without
    /// touching the network or the registry. Otherwise the session is
    /// registered for the duration of the loop; a duplicate start fails with
    /// [`StartError::AlreadyPolling`].
    pub async fn run(&self, video_id: &str) -> Result<PollOutcome, StartError> {
        if is_blocked(video_id) {
            tracing::warn!(video_id = %video_id, "Refusing to poll block-listed video id");
            self.events.publish(VideoEvent::PollingBlocked {
                video_id: video_id.to_string(),
                reason: "block-listed".to_string(),
            });
            return Ok(PollOutcome::Blocked);
        }

        let cancel = self
            .registry
            .register(video_id)
            .await
            .ok_or_else(|| StartError::AlreadyPolling(video_id.to_string()))?;

        let outcome = self.poll_until_terminal(video_id, &cancel).await;
        self.registry.unregister(video_id).await;
        self.publish_outcome(video_id, &outcome);

        Ok(outcome)
    }

    /// One immediate status check, bypassing the timer and any cache.
    ///
    /// Used for the manual retry path after a timeout; persists status/URL
    /// changes through the probe.
    pub async fn force_check(
        &self,
        video_id: &str,
    ) -> Result<crate::probe::StatusSnapshot, ProbeError> {
        self.probe.force(video_id).await
    }

    async fn poll_until_terminal(
        &self,
        video_id: &str,
        cancel: &CancellationToken,
    ) -> PollOutcome {
        let config = self.registry.config().clone();
        let started = Instant::now();

        let mut interval = tokio::time::interval(config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(video_id = %video_id, "Polling cancelled");
                    return PollOutcome::Cancelled;
                }
                _ = interval.tick() => {}
            }

            // The block list is consulted before every tick, not just at start.
            if is_blocked(video_id) {
                return PollOutcome::Blocked;
            }

            // Timeout is judged on elapsed wall-clock time, not tick count,
            // so delivery jitter cannot extend the budget.
            let elapsed = started.elapsed();
            if elapsed >= config.max_duration {
                tracing::warn!(
                    video_id = %video_id,
                    elapsed_secs = elapsed.as_secs(),
                    "Polling budget exhausted, making one final direct check",
                );
                match self.probe.force(video_id).await {
                    Ok(snapshot) => tracing::info!(
                        video_id = %video_id,
                        status = %snapshot.status,
                        "Final check completed after timeout",
                    ),
                    Err(e) => tracing::warn!(
                        video_id = %video_id,
                        error = %e,
                        "Final check after timeout failed",
                    ),
                }
                return PollOutcome::TimedOut;
            }

            match self.probe.check(video_id).await {
                Ok(snapshot) => match snapshot.status {
                    VideoStatus::Ready => {
                        return PollOutcome::Ready {
                            url: snapshot.resolved_url(),
                        };
                    }
                    VideoStatus::Failed => return PollOutcome::Failed,
                    _ => {
                        // Still queued/generating (or an unknown status):
                        // keep the session fresh and wait for the next tick.
                        self.registry.touch(video_id).await;
                    }
                },
                Err(ProbeError::NotFound) => return PollOutcome::NotFound,
                Err(ProbeError::Gone) => return PollOutcome::Blocked,
                Err(ProbeError::RateLimited) => return PollOutcome::RateLimited,
                Err(e) => {
                    // Transient: a single flaky check must not kill the loop.
                    tracing::warn!(
                        video_id = %video_id,
                        error = %e,
                        "Status check failed, will retry on next tick",
                    );
                }
            }
        }
    }

    fn publish_outcome(&self, video_id: &str, outcome: &PollOutcome) {
        let video_id = video_id.to_string();
        let event = match outcome {
            PollOutcome::Ready { url } => VideoEvent::VideoReady {
                video_id,
                url: url.clone(),
            },
            PollOutcome::Failed => VideoEvent::VideoFailed { video_id },
            PollOutcome::TimedOut => VideoEvent::PollingTimedOut {
                video_id,
                elapsed_secs: self.registry.config().max_duration.as_secs(),
            },
            PollOutcome::Blocked => VideoEvent::PollingBlocked {
                video_id,
                reason: "blocked".to_string(),
            },
            PollOutcome::NotFound => VideoEvent::PollingBlocked {
                video_id,
                reason: "not found".to_string(),
            },
            PollOutcome::RateLimited => VideoEvent::PollingBlocked {
                video_id,
                reason: "rate limited".to_string(),
            },
            // Teardown must not produce further side effects.
            PollOutcome::Cancelled => return,
        };
        self.events.publish(event);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use ghostwriters_core::playback::ReportedUrls;
    use ghostwriters_core::polling::PollingConfig;

    use crate::probe::StatusSnapshot;

    use super::*;

    /// Probe that replays a scripted sequence of check results, then keeps
    /// returning `queued` forever.
    struct ScriptedProbe {
        checks: Mutex<VecDeque<Result<StatusSnapshot, ProbeError>>>,
        check_calls: AtomicUsize,
        force_calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(checks: Vec<Result<StatusSnapshot, ProbeError>>) -> Arc<Self> {
            Arc::new(Self {
                checks: Mutex::new(checks.into()),
                check_calls: AtomicUsize::new(0),
                force_calls: AtomicUsize::new(0),
            })
        }

        fn check_calls(&self) -> usize {
            self.check_calls.load(Ordering::SeqCst)
        }

        fn force_calls(&self) -> usize {
            self.force_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusProbe for ScriptedProbe {
        async fn check(&self, video_id: &str) -> Result<StatusSnapshot, ProbeError> {
            self.check_calls.fetch_add(1, Ordering::SeqCst);
            self.checks
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(snap(video_id, VideoStatus::Queued, None, None)))
        }

        async fn force(&self, video_id: &str) -> Result<StatusSnapshot, ProbeError> {
            self.force_calls.fetch_add(1, Ordering::SeqCst);
            Ok(snap(video_id, VideoStatus::Queued, None, None))
        }
    }

    fn snap(
        video_id: &str,
        status: VideoStatus,
        stream_url: Option<&str>,
        hosted_url: Option<&str>,
    ) -> StatusSnapshot {
        StatusSnapshot {
            video_id: video_id.to_string(),
            status,
            urls: ReportedUrls {
                stream_url: stream_url.map(String::from),
                download_url: None,
                hosted_url: hosted_url.map(String::from),
            },
            stored_url: None,
            generation_progress: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn poller(
        probe: Arc<ScriptedProbe>,
        max_duration: Duration,
    ) -> VideoPoller<ScriptedProbe> {
        let config = PollingConfig::default().with_max_duration(max_duration);
        let registry = PollingRegistry::new(config).unwrap();
        VideoPoller::new(probe, registry, Arc::new(EventBus::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn polls_through_queued_and_generating_to_ready() {
        let probe = ScriptedProbe::new(vec![
            Ok(snap("vid-1", VideoStatus::Queued, None, None)),
            Ok(snap("vid-1", VideoStatus::Generating, None, None)),
            Ok(snap("vid-1", VideoStatus::Ready, None, Some("https://x/vid-1"))),
        ]);
        let poller = poller(Arc::clone(&probe), Duration::from_secs(120));

        let outcome = poller.run("vid-1").await.unwrap();

        assert_eq!(
            outcome,
            PollOutcome::Ready {
                url: Some("https://x/vid-1".to_string())
            }
        );
        assert_eq!(probe.check_calls(), 3);
        // The session is gone: no further polling can happen.
        assert!(!poller.registry().is_polling("vid-1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn ready_event_is_published() {
        let probe = ScriptedProbe::new(vec![Ok(snap(
            "vid-1",
            VideoStatus::Ready,
            Some("https://x/s"),
            None,
        ))]);
        let poller = poller(probe, Duration::from_secs(120));
        let mut rx = poller.events.subscribe();

        poller.run("vid-1").await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_matches!(event, VideoEvent::VideoReady { video_id, url }
            if video_id == "vid-1" && url.as_deref() == Some("https://x/s"));
    }

    #[tokio::test(start_paused = true)]
    async fn stream_url_wins_over_hosted_url() {
        let probe = ScriptedProbe::new(vec![Ok(snap(
            "vid-1",
            VideoStatus::Ready,
            Some("https://x/stream"),
            Some("https://x/hosted"),
        ))]);
        let poller = poller(probe, Duration::from_secs(120));

        let outcome = poller.run("vid-1").await.unwrap();
        assert_eq!(
            outcome,
            PollOutcome::Ready {
                url: Some("https://x/stream".to_string())
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_status_stops_the_loop() {
        let probe = ScriptedProbe::new(vec![
            Ok(snap("vid-1", VideoStatus::Queued, None, None)),
            Ok(snap("vid-1", VideoStatus::Failed, None, None)),
        ]);
        let poller = poller(Arc::clone(&probe), Duration::from_secs(120));

        let outcome = poller.run("vid-1").await.unwrap();
        assert_eq!(outcome, PollOutcome::Failed);
        assert_eq!(probe.check_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_terminal_within_one_tick() {
        let probe = ScriptedProbe::new(vec![
            Ok(snap("vid-1", VideoStatus::Generating, None, None)),
            Err(ProbeError::NotFound),
        ]);
        let poller = poller(Arc::clone(&probe), Duration::from_secs(120));

        let outcome = poller.run("vid-1").await.unwrap();

        assert_eq!(outcome, PollOutcome::NotFound);
        assert_eq!(probe.check_calls(), 2);
        assert!(!poller.registry().is_polling("vid-1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn gone_maps_to_blocked_and_rate_limit_to_its_own_state() {
        let probe = ScriptedProbe::new(vec![Err(ProbeError::Gone)]);
        let outcome = poller(probe, Duration::from_secs(120))
            .run("vid-1")
            .await
            .unwrap();
        assert_eq!(outcome, PollOutcome::Blocked);

        let probe = ScriptedProbe::new(vec![Err(ProbeError::RateLimited)]);
        let outcome = poller(probe, Duration::from_secs(120))
            .run("vid-2")
            .await
            .unwrap();
        assert_eq!(outcome, PollOutcome::RateLimited);
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_are_transient() {
        let probe = ScriptedProbe::new(vec![
            Err(ProbeError::Server(500)),
            Err(ProbeError::Network("connection reset".into())),
            Ok(snap("vid-1", VideoStatus::Ready, None, Some("https://x/h"))),
        ]);
        let poller = poller(Arc::clone(&probe), Duration::from_secs(120));

        let outcome = poller.run("vid-1").await.unwrap();
        assert_matches!(outcome, PollOutcome::Ready { .. });
        assert_eq!(probe.check_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_at_the_budget_with_exactly_one_force_check() {
        let probe = ScriptedProbe::new(vec![]);
        let poller = poller(Arc::clone(&probe), Duration::from_secs(10));

        let started = Instant::now();
        let outcome = poller.run("vid-1").await.unwrap();

        assert_eq!(outcome, PollOutcome::TimedOut);
        // Not before the deadline.
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert_eq!(probe.force_calls(), 1);
        // Ticks at t=0..=9 each probed; the t=10 tick hit the deadline.
        assert_eq!(probe.check_calls(), 10);
        assert!(!poller.registry().is_polling("vid-1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn block_listed_id_short_circuits_without_any_probe_call() {
        let probe = ScriptedProbe::new(vec![]);
        let poller = poller(Arc::clone(&probe), Duration::from_secs(120));

        let outcome = poller.run("rf4703150052-1746344163874").await.unwrap();

        assert_eq!(outcome, PollOutcome::Blocked);
        assert_eq!(probe.check_calls(), 0);
        assert_eq!(probe.force_calls(), 0);
        assert!(!poller.registry().is_polling("rf4703150052-1746344163874").await);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_start_is_rejected() {
        let probe = ScriptedProbe::new(vec![]);
        let poller = Arc::new(poller(probe, Duration::from_secs(120)));

        let background = Arc::clone(&poller);
        let handle = tokio::spawn(async move { background.run("vid-1").await });

        // Let the first loop register itself.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(poller.registry().is_polling("vid-1").await);

        let err = poller.run("vid-1").await.expect_err("second start must fail");
        assert_matches!(err, StartError::AlreadyPolling(id) if id == "vid-1");

        poller.registry().unregister("vid-1").await;
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome, PollOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_loop_without_events() {
        let probe = ScriptedProbe::new(vec![]);
        let poller = Arc::new(poller(probe, Duration::from_secs(120)));
        let mut rx = poller.events.subscribe();

        let background = Arc::clone(&poller);
        let handle = tokio::spawn(async move { background.run("vid-1").await });

        tokio::time::sleep(Duration::from_secs(3)).await;
        poller.registry().unregister("vid-1").await;

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome, PollOutcome::Cancelled);
        assert_matches!(
            rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        );
    }

    /// The worked example: `queued → queued → ready` with a hosted URL on
    /// the final check and a 10 second budget.
    #[tokio::test(start_paused = true)]
    async fn example_scenario_abc_123() {
        let probe = ScriptedProbe::new(vec![
            Ok(snap("abc-123", VideoStatus::Queued, None, None)),
            Ok(snap("abc-123", VideoStatus::Queued, None, None)),
            Ok(snap("abc-123", VideoStatus::Ready, None, Some("https://x/abc-123"))),
        ]);
        let poller = poller(Arc::clone(&probe), Duration::from_secs(10));

        let started = Instant::now();
        let outcome = poller.run("abc-123").await.unwrap();

        assert_eq!(
            outcome,
            PollOutcome::Ready {
                url: Some("https://x/abc-123".to_string())
            }
        );
        assert_eq!(probe.check_calls(), 3);
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
