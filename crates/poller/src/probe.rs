//! Status probes: how the reconciliation loop asks "is my video ready?".
//!
//! [`StatusProbe`] is the seam between the loop and the outside world.
//! Production uses [`DirectProbe`], which reconciles the stored record
//! against a live check of the external service once the record is stale;
//! tests script the trait directly.

use async_trait::async_trait;

use ghostwriters_core::playback::{resolve_playback_url, ReportedUrls};
use ghostwriters_core::polling::PollingConfig;
use ghostwriters_core::status::VideoStatus;
use ghostwriters_core::types::Timestamp;
use ghostwriters_db::models::video_request::VideoRequest;
use ghostwriters_db::repositories::VideoRequestRepo;
use ghostwriters_db::DbPool;
use ghostwriters_tavus::{TavusApi, TavusApiError};

/// Point-in-time view of a video's lifecycle state.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub video_id: String,
    pub status: VideoStatus,
    /// URLs reported by the external service on the most recent check.
    pub urls: ReportedUrls,
    /// URL already persisted on the record, used as the fallback.
    pub stored_url: Option<String>,
    pub generation_progress: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl StatusSnapshot {
    /// Best playback URL under the `stream > download > hosted > stored`
    /// precedence.
    pub fn resolved_url(&self) -> Option<String> {
        resolve_playback_url(&self.urls, self.stored_url.as_deref())
    }
}

/// A status check failure, classified the way the loop needs it.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// No record of this video exists (HTTP 404). Terminal.
    #[error("video not found")]
    NotFound,

    /// The id is permanently blocked (HTTP 410). Terminal.
    #[error("video id is blocked")]
    Gone,

    /// Status checks are being rate limited (HTTP 429). Terminal for the
    /// current session.
    #[error("status checks rate limited")]
    RateLimited,

    /// Upstream server error (HTTP 5xx). Transient; retried next tick.
    #[error("transient server error ({0})")]
    Server(u16),

    /// The check never produced an HTTP response. Transient.
    #[error("network error: {0}")]
    Network(String),

    /// The local store failed. Transient.
    #[error("database error: {0}")]
    Database(String),
}

impl ProbeError {
    /// Whether the loop should keep polling after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Server(_) | Self::Network(_) | Self::Database(_))
    }
}

/// Classify a client error into the loop's terminal/transient taxonomy.
fn classify(err: TavusApiError) -> ProbeError {
    match err {
        TavusApiError::Api { status: 404, .. } => ProbeError::NotFound,
        TavusApiError::Api { status: 410, .. } => ProbeError::Gone,
        TavusApiError::Api { status: 429, .. } => ProbeError::RateLimited,
        TavusApiError::Api { status, .. } => ProbeError::Server(status),
        other => ProbeError::Network(other.to_string()),
    }
}

/// How the loop observes a video's status.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    /// Regular per-tick check. Implementations may serve a cached/stored
    /// view while it is fresh.
    async fn check(&self, video_id: &str) -> Result<StatusSnapshot, ProbeError>;

    /// Out-of-band immediate check that must bypass any cache.
    async fn force(&self, video_id: &str) -> Result<StatusSnapshot, ProbeError> {
        self.check(video_id).await
    }
}

/// Production probe: stored record first, live upstream check once stale.
///
/// A non-terminal record older than [`PollingConfig::record_staleness`] is
/// reconciled against the external service; status or URL changes are
/// written back so every observer sees them.
pub struct DirectProbe {
    pool: DbPool,
    api: std::sync::Arc<TavusApi>,
    record_staleness: chrono::Duration,
}

impl DirectProbe {
    pub fn new(pool: DbPool, api: std::sync::Arc<TavusApi>, config: &PollingConfig) -> Self {
        Self {
            pool,
            api,
            record_staleness: chrono::Duration::from_std(config.record_staleness)
                .unwrap_or_else(|_| chrono::Duration::seconds(30)),
        }
    }

    async fn load_row(&self, video_id: &str) -> Result<VideoRequest, ProbeError> {
        VideoRequestRepo::find_by_video_id(&self.pool, video_id)
            .await
            .map_err(|e| ProbeError::Database(e.to_string()))?
            .ok_or(ProbeError::NotFound)
    }

    fn snapshot_from_row(row: &VideoRequest) -> StatusSnapshot {
        StatusSnapshot {
            video_id: row.video_id.clone(),
            status: row.status(),
            urls: ReportedUrls::default(),
            stored_url: row.hosted_url.clone(),
            generation_progress: None,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    /// Ask the external service directly and fold the answer back into the
    /// stored record.
    async fn reconcile_upstream(
        &self,
        row: &VideoRequest,
        live: bool,
    ) -> Result<StatusSnapshot, ProbeError> {
        let details = if live {
            self.api.check_video(&row.video_id).await
        } else {
            self.api.get_video(&row.video_id).await
        }
        .map_err(classify)?;

        let status = details
            .status
            .as_deref()
            .map(VideoStatus::parse)
            .unwrap_or_else(|| row.status());

        let urls = ReportedUrls {
            stream_url: details.stream_url,
            download_url: details.download_url,
            hosted_url: details.hosted_url,
        };
        let resolved = resolve_playback_url(&urls, row.hosted_url.as_deref());

        let mut updated_at = row.updated_at;
        let status_changed = status != row.status();
        let url_changed = resolved.is_some() && resolved != row.hosted_url;
        if status_changed || url_changed {
            tracing::info!(
                video_id = %row.video_id,
                from = %row.status,
                to = %status,
                "Reconciled video record against external service",
            );
            VideoRequestRepo::update_status_and_url(
                &self.pool,
                &row.video_id,
                status.as_str(),
                resolved.as_deref(),
            )
            .await
            .map_err(|e| ProbeError::Database(e.to_string()))?;
            updated_at = chrono::Utc::now();
        }

        Ok(StatusSnapshot {
            video_id: row.video_id.clone(),
            status,
            urls,
            stored_url: row.hosted_url.clone(),
            generation_progress: details.generation_progress,
            created_at: row.created_at,
            updated_at,
        })
    }
}

#[async_trait]
impl StatusProbe for DirectProbe {
    async fn check(&self, video_id: &str) -> Result<StatusSnapshot, ProbeError> {
        let row = self.load_row(video_id).await?;

        // Terminal records never change again; serve them as stored.
        if row.status().is_terminal() {
            return Ok(Self::snapshot_from_row(&row));
        }

        let age = chrono::Utc::now() - row.updated_at;
        if age < self.record_staleness {
            return Ok(Self::snapshot_from_row(&row));
        }

        tracing::debug!(
            video_id = %video_id,
            age_secs = age.num_seconds(),
            "Record stale, checking external service",
        );
        self.reconcile_upstream(&row, false).await
    }

    async fn force(&self, video_id: &str) -> Result<StatusSnapshot, ProbeError> {
        let row = self.load_row(video_id).await?;
        self.reconcile_upstream(&row, true).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_terminal_statuses() {
        let gone = classify(TavusApiError::Api {
            status: 410,
            body: String::new(),
        });
        assert!(matches!(gone, ProbeError::Gone));
        assert!(!gone.is_transient());

        let missing = classify(TavusApiError::Api {
            status: 404,
            body: String::new(),
        });
        assert!(matches!(missing, ProbeError::NotFound));

        let limited = classify(TavusApiError::Api {
            status: 429,
            body: String::new(),
        });
        assert!(matches!(limited, ProbeError::RateLimited));
    }

    #[test]
    fn classifies_server_errors_as_transient() {
        let err = classify(TavusApiError::Api {
            status: 500,
            body: String::new(),
        });
        assert!(matches!(err, ProbeError::Server(500)));
        assert!(err.is_transient());
    }

    #[test]
    fn classifies_timeouts_as_transient_network_failures() {
        let err = classify(TavusApiError::Timeout {
            after: std::time::Duration::from_secs(10),
        });
        assert!(matches!(err, ProbeError::Network(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn snapshot_resolves_urls_with_stored_fallback() {
        let snapshot = StatusSnapshot {
            video_id: "vid-1".into(),
            status: VideoStatus::Ready,
            urls: ReportedUrls::default(),
            stored_url: Some("https://x/stored".into()),
            generation_progress: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert_eq!(
            snapshot.resolved_url(),
            Some("https://x/stored".to_string())
        );
    }
}
