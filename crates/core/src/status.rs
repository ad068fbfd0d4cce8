//! Video lifecycle status.
//!
//! The external generation service reports status as a free-form string.
//! The four values below are the ones the reconciliation loop special-cases;
//! anything else round-trips verbatim through [`VideoStatus::Other`] so an
//! unanticipated upstream value never becomes a parse failure.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an externally generated video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VideoStatus {
    /// Accepted by the service, not yet being rendered.
    Queued,
    /// Actively rendering.
    Generating,
    /// Playback URL available.
    Ready,
    /// The service gave up on this job.
    Failed,
    /// Any status string this crate does not recognise.
    Other(String),
}

impl VideoStatus {
    /// Parse a status string. Matching is case-insensitive on the four
    /// known values; unknown values are preserved as-is.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "queued" => Self::Queued,
            "generating" => Self::Generating,
            "ready" => Self::Ready,
            "failed" => Self::Failed,
            _ => Self::Other(s.to_string()),
        }
    }

    /// Canonical string form, as stored in the database.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Generating => "generating",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Other(s) => s,
        }
    }

    /// Whether the polling loop stops on this status.
    ///
    /// Only `ready` and `failed` are terminal; unknown statuses are treated
    /// like `queued`/`generating` and keep the loop alive until it times out.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}

impl std::fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for VideoStatus {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<VideoStatus> for String {
    fn from(status: VideoStatus) -> Self {
        status.as_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
