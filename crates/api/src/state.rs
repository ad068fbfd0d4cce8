use std::sync::Arc;

use ghostwriters_events::EventBus;
use ghostwriters_poller::{DirectProbe, VideoPoller};
use ghostwriters_tavus::TavusApi;

use crate::config::ServerConfig;
use crate::rate_limit::FixedWindowLimiter;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: ghostwriters_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Generation-service client used for creation requests.
    pub tavus: Arc<TavusApi>,
    /// Status probe shared with the reconciliation loops.
    pub probe: Arc<DirectProbe>,
    /// Reconciliation-loop driver (owns the polling registry).
    pub poller: Arc<VideoPoller<DirectProbe>>,
    /// Lifecycle event bus.
    pub events: Arc<EventBus>,
    /// Status-check rate limiter.
    pub limiter: Arc<FixedWindowLimiter>,
}
