//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] fans [`VideoEvent`]s out to any number of subscribers (the
//! UI notification layer, future audit sinks). It is designed to be shared
//! via `Arc<EventBus>` across the application.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use ghostwriters_core::types::DbId;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// A video lifecycle event.
///
/// Published by the reconciliation loop on every terminal transition and by
/// the webhook/creation paths on externally driven changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VideoEvent {
    /// A generation request was accepted and recorded.
    VideoQueued {
        video_id: String,
        project_id: Option<DbId>,
    },
    /// The stored status changed (webhook push or reconciliation).
    StatusChanged { video_id: String, status: String },
    /// A playback URL is available.
    VideoReady {
        video_id: String,
        url: Option<String>,
    },
    /// The external service gave up on the job.
    VideoFailed { video_id: String },
    /// The polling loop exhausted its wall-clock budget.
    PollingTimedOut { video_id: String, elapsed_secs: u64 },
    /// Polling stopped on a blocking condition (blocked id, 404, 410, 429).
    PollingBlocked { video_id: String, reason: String },
    /// Polling was cancelled by its owner before resolution.
    PollingCancelled { video_id: String },
}

impl VideoEvent {
    /// The video this event concerns.
    pub fn video_id(&self) -> &str {
        match self {
            Self::VideoQueued { video_id, .. }
            | Self::StatusChanged { video_id, .. }
            | Self::VideoReady { video_id, .. }
            | Self::VideoFailed { video_id }
            | Self::PollingTimedOut { video_id, .. }
            | Self::PollingBlocked { video_id, .. }
            | Self::PollingCancelled { video_id } => video_id,
        }
    }
}

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`VideoEvent`].
pub struct EventBus {
    sender: broadcast::Sender<VideoEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are dropped
    /// and slow receivers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: VideoEvent) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<VideoEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
