//! Repository for the `video_requests` table.

use sqlx::PgPool;

use ghostwriters_core::types::DbId;

use crate::models::video_request::VideoRequest;

/// Column list for `video_requests` queries.
const COLUMNS: &str = "\
    id, video_id, status, hosted_url, project_id, created_at, updated_at";

/// Provides query operations for video lifecycle records.
///
/// Creation is strict: inserting an existing `video_id` violates the
/// `uq_video_requests_video_id` constraint and surfaces as a database error
/// for the caller to classify. Updates are lenient: an unknown `video_id`
/// returns `false` rather than an error.
pub struct VideoRequestRepo;

impl VideoRequestRepo {
    // ── Queries ──────────────────────────────────────────────────────

    /// Insert a new record, returning the inserted row.
    ///
    /// `created_at` and `updated_at` both default to `NOW()` in the schema.
    pub async fn create(
        pool: &PgPool,
        video_id: &str,
        status: &str,
        hosted_url: Option<&str>,
        project_id: Option<DbId>,
    ) -> Result<VideoRequest, sqlx::Error> {
        let query = format!(
            "INSERT INTO video_requests (video_id, status, hosted_url, project_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, VideoRequest>(&query)
            .bind(video_id)
            .bind(status)
            .bind(hosted_url)
            .bind(project_id)
            .fetch_one(pool)
            .await
    }

    /// Find a record by its external video id.
    pub async fn find_by_video_id(
        pool: &PgPool,
        video_id: &str,
    ) -> Result<Option<VideoRequest>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM video_requests WHERE video_id = $1");
        sqlx::query_as::<_, VideoRequest>(&query)
            .bind(video_id)
            .fetch_optional(pool)
            .await
    }

    // ── Status mutations ─────────────────────────────────────────────

    /// Update the status, refreshing `updated_at`.
    ///
    /// Returns `false` when no record with the given id exists.
    pub async fn update_status(
        pool: &PgPool,
        video_id: &str,
        status: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE video_requests \
             SET status = $2, updated_at = NOW() \
             WHERE video_id = $1",
        )
        .bind(video_id)
        .bind(status)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update the status and the best-known playback URL in one statement.
    ///
    /// A `None` URL leaves the stored URL untouched (the last reported
    /// non-null URL wins). Returns `false` when the id is unknown.
    pub async fn update_status_and_url(
        pool: &PgPool,
        video_id: &str,
        status: &str,
        hosted_url: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE video_requests \
             SET status = $2, hosted_url = COALESCE($3, hosted_url), updated_at = NOW() \
             WHERE video_id = $1",
        )
        .bind(video_id)
        .bind(status)
        .bind(hosted_url)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
