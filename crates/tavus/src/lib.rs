//! HTTP client for the external video-generation service.
//!
//! [`TavusApi`] wraps the service's REST endpoints with per-attempt
//! timeouts and a bounded linear-backoff retry ([`RetryPolicy`]).

pub mod api;
pub mod retry;

pub use api::{
    fallback_video_id, CreateVideoRequest, TavusApi, TavusApiError, VideoCreated, VideoDetails,
};
pub use retry::RetryPolicy;
