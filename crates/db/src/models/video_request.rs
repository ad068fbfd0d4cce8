//! Video request lifecycle record.

use serde::Serialize;
use sqlx::FromRow;

use ghostwriters_core::status::VideoStatus;
use ghostwriters_core::types::{DbId, Timestamp};

/// One externally requested video-generation job.
///
/// `video_id` is assigned by the external service at creation time (or
/// synthesized locally on fallback) and never changes. `hosted_url` may be
/// absent while the job is still in a non-terminal status.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VideoRequest {
    pub id: DbId,
    pub video_id: String,
    pub status: String,
    pub hosted_url: Option<String>,
    /// Owning project, when the request was made from inside one.
    pub project_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl VideoRequest {
    /// Parsed form of the stored status string.
    pub fn status(&self) -> VideoStatus {
        VideoStatus::parse(&self.status)
    }
}
