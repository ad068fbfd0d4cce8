pub mod health;
pub mod videos;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /videos                          create (starts polling)
/// /videos/polling                  active polling sessions
/// /videos/{video_id}/status        rate-limited status check
/// /videos/{video_id}/check         force-check against the service
/// /videos/{video_id}/polling       cancel polling (DELETE)
///
/// /webhooks/tavus                  status push from the service
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(videos::router())
}
