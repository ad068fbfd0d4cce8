//! Webhook ingest from the external generation service.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use ghostwriters_core::error::CoreError;
use ghostwriters_core::status::VideoStatus;
use ghostwriters_db::repositories::VideoRequestRepo;
use ghostwriters_events::VideoEvent;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Payload the service pushes when a video's status changes.
#[derive(Debug, Deserialize)]
pub struct TavusWebhookPayload {
    pub video_id: String,
    pub status: String,
    #[serde(default)]
    pub hosted_url: Option<String>,
}

/// POST /api/v1/webhooks/tavus
///
/// Apply a pushed status change to the stored record. Unknown video ids
/// answer 404 so the service stops re-delivering for them.
pub async fn tavus_webhook(
    State(state): State<AppState>,
    Json(payload): Json<TavusWebhookPayload>,
) -> AppResult<impl IntoResponse> {
    if payload.video_id.trim().is_empty() || payload.status.trim().is_empty() {
        return Err(AppError::BadRequest("Invalid webhook payload".into()));
    }

    let status = VideoStatus::parse(&payload.status);
    let updated = VideoRequestRepo::update_status_and_url(
        &state.pool,
        &payload.video_id,
        status.as_str(),
        payload.hosted_url.as_deref(),
    )
    .await?;

    if !updated {
        tracing::warn!(video_id = %payload.video_id, "Webhook for unknown video");
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Video",
            id: payload.video_id,
        }));
    }

    state.events.publish(VideoEvent::StatusChanged {
        video_id: payload.video_id.clone(),
        status: status.to_string(),
    });

    tracing::info!(
        video_id = %payload.video_id,
        status = %status,
        "Webhook status update applied",
    );

    Ok(Json(json!({ "success": true })))
}
