//! Route definitions for the video lifecycle endpoints.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::{videos, webhooks};
use crate::state::AppState;

/// Routes mounted under `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/videos", post(videos::create_video))
        .route("/videos/polling", get(videos::list_polling))
        .route("/videos/{video_id}/status", get(videos::get_status))
        .route("/videos/{video_id}/check", get(videos::check_video))
        .route("/videos/{video_id}/polling", delete(videos::cancel_polling))
        .route("/webhooks/tavus", post(webhooks::tavus_webhook))
}
