//! Video lifecycle handlers: creation, status polling, force-check, and
//! polling-session management.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use ghostwriters_core::block_list::is_blocked;
use ghostwriters_core::error::CoreError;
use ghostwriters_core::status::VideoStatus;
use ghostwriters_core::types::{DbId, Timestamp};
use ghostwriters_db::models::video_request::VideoRequest;
use ghostwriters_db::repositories::VideoRequestRepo;
use ghostwriters_events::VideoEvent;
use ghostwriters_poller::{ProbeError, StatusProbe, StatusSnapshot};
use ghostwriters_tavus::{fallback_video_id, CreateVideoRequest};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateVideoInput {
    pub genre: String,
    pub personality: String,
    pub script: String,
    /// Owning project; requests made outside any project omit it.
    #[serde(default)]
    pub project_id: Option<DbId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVideoResponse {
    pub video_id: String,
    pub status: String,
}

/// Status payload returned by the status and check endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatusResponse {
    pub video_id: String,
    pub status: String,
    pub hosted_url: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(rename = "generation_progress", skip_serializing_if = "Option::is_none")]
    pub generation_progress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_check_success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_check_failed: Option<bool>,
}

impl VideoStatusResponse {
    /// Response from the stored record only (no upstream data).
    fn from_record(record: &VideoRequest) -> Self {
        Self {
            video_id: record.video_id.clone(),
            status: record.status.clone(),
            hosted_url: record.hosted_url.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            generation_progress: None,
            direct_check_success: None,
            direct_check_failed: None,
        }
    }

    /// Response from a probe snapshot (URL precedence already applied).
    fn from_snapshot(snapshot: &StatusSnapshot) -> Self {
        Self {
            video_id: snapshot.video_id.clone(),
            status: snapshot.status.to_string(),
            hosted_url: snapshot.resolved_url(),
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            generation_progress: snapshot.generation_progress.clone(),
            direct_check_success: None,
            direct_check_failed: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActivePollingResponse {
    pub active: Vec<String>,
    pub count: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/videos
///
/// Submit a generation request to the external service, record it, and
/// start the reconciliation loop unless the service already reported a
/// terminal status.
pub async fn create_video(
    State(state): State<AppState>,
    Json(input): Json<CreateVideoInput>,
) -> AppResult<impl IntoResponse> {
    if input.genre.trim().is_empty() {
        return Err(AppError::BadRequest("genre must not be empty".into()));
    }
    if input.script.trim().is_empty() {
        return Err(AppError::BadRequest("script must not be empty".into()));
    }

    let request = CreateVideoRequest {
        genre: input.genre.trim().to_string(),
        personality: input.personality.trim().to_string(),
        script: input.script.clone(),
    };
    let created = state.tavus.create_video(&request).await?;

    // The record needs a key even when the service answered without one.
    let video_id = created
        .video_id
        .clone()
        .unwrap_or_else(|| fallback_video_id(&request.genre));
    let status = created
        .status
        .as_deref()
        .map(VideoStatus::parse)
        .unwrap_or(VideoStatus::Queued);

    VideoRequestRepo::create(
        &state.pool,
        &video_id,
        status.as_str(),
        created.video_url.as_deref(),
        input.project_id,
    )
    .await?;

    state.events.publish(VideoEvent::VideoQueued {
        video_id: video_id.clone(),
        project_id: input.project_id,
    });

    tracing::info!(
        video_id = %video_id,
        status = %status,
        project_id = ?input.project_id,
        "Video generation requested",
    );

    if !status.is_terminal() {
        let poller = Arc::clone(&state.poller);
        let id = video_id.clone();
        tokio::spawn(async move {
            match poller.run(&id).await {
                Ok(outcome) => {
                    tracing::info!(video_id = %id, outcome = ?outcome, "Polling finished")
                }
                Err(e) => tracing::warn!(video_id = %id, error = %e, "Polling not started"),
            }
        });
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateVideoResponse {
            video_id,
            status: status.to_string(),
        }),
    ))
}

/// GET /api/v1/videos/{video_id}/status
///
/// Current lifecycle state of a video. Rate limited per client-IP+video
/// pair; block-listed ids answer 410 without any lookups. A stale
/// non-terminal record is refreshed from the external service first, but an
/// unreachable service degrades to the stored record rather than an error.
pub async fn get_status(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
) -> AppResult<Json<VideoStatusResponse>> {
    let ip = client_ip(&headers);
    if !state.limiter.allow(&format!("{ip}:{video_id}")).await {
        return Err(AppError::RateLimited(
            "Rate limit exceeded. Please slow down your requests.".into(),
        ));
    }

    if is_blocked(&video_id) {
        tracing::warn!(video_id = %video_id, "Refusing status check for block-listed id");
        return Err(AppError::Gone(
            "This video ID is blocked due to known issues".into(),
        ));
    }

    match state.probe.check(&video_id).await {
        Ok(snapshot) => Ok(Json(VideoStatusResponse::from_snapshot(&snapshot))),
        Err(ProbeError::NotFound) => Err(not_found(&video_id)),
        Err(ProbeError::Gone) => Err(AppError::Gone(
            "This video ID is blocked due to known issues".into(),
        )),
        Err(e) => {
            // Upstream trouble must not break the polling UI; serve the
            // stored record instead.
            tracing::warn!(video_id = %video_id, error = %e, "Status check degraded to stored record");
            let record = load_record(&state, &video_id).await?;
            Ok(Json(VideoStatusResponse::from_record(&record)))
        }
    }
}

/// GET /api/v1/videos/{video_id}/check
///
/// Force-check: one immediate status query against the external service,
/// bypassing the staleness threshold. Falls back to the stored record
/// (flagged `directCheckFailed`) when the service cannot be reached.
pub async fn check_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> AppResult<Json<VideoStatusResponse>> {
    // 404 for ids we have no record of, before any upstream call.
    let record = load_record(&state, &video_id).await?;

    match state.poller.force_check(&video_id).await {
        Ok(snapshot) => {
            let mut response = VideoStatusResponse::from_snapshot(&snapshot);
            response.direct_check_success = Some(true);
            Ok(Json(response))
        }
        Err(e) => {
            tracing::warn!(video_id = %video_id, error = %e, "Direct check failed");
            let mut response = VideoStatusResponse::from_record(&record);
            response.direct_check_failed = Some(true);
            Ok(Json(response))
        }
    }
}

/// DELETE /api/v1/videos/{video_id}/polling
///
/// Cancel the active polling session, if any. Idempotent: cancelling a
/// video that is not being polled is a successful no-op.
pub async fn cancel_polling(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> AppResult<StatusCode> {
    let removed = state.poller.registry().unregister(&video_id).await;
    tracing::info!(video_id = %video_id, removed, "Polling cancellation requested");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/videos/polling
///
/// Introspection: ids currently being polled.
pub async fn list_polling(State(state): State<AppState>) -> Json<ActivePollingResponse> {
    let registry = state.poller.registry();
    let active = registry.active_video_ids().await;
    let count = active.len();
    Json(ActivePollingResponse { active, count })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn load_record(state: &AppState, video_id: &str) -> AppResult<VideoRequest> {
    VideoRequestRepo::find_by_video_id(&state.pool, video_id)
        .await?
        .ok_or_else(|| not_found(video_id))
}

fn not_found(video_id: &str) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Video",
        id: video_id.to_string(),
    })
}

/// Best-effort client address for rate-limit keying, taken from proxy
/// headers (`x-forwarded-for`, then `x-real-ip`).
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
        .unwrap_or_else(|| "unknown-ip".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "198.51.100.2".parse().unwrap());
        assert_eq!(client_ip(&headers), "203.0.113.9");
    }

    #[test]
    fn client_ip_falls_back_to_real_ip_then_unknown() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "198.51.100.2".parse().unwrap());
        assert_eq!(client_ip(&headers), "198.51.100.2");

        assert_eq!(client_ip(&HeaderMap::new()), "unknown-ip");
    }
}
