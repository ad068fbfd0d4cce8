//! REST API client for the external generation service.
//!
//! Wraps the service's creation and status endpoints using [`reqwest`].
//! Every call goes through [`TavusApi::request_with_retry`], which applies
//! the per-attempt timeout and linear backoff from [`RetryPolicy`]. A
//! received HTTP response (success or error status) is never retried; only
//! network failures and timeouts are.

use serde::{Deserialize, Serialize};

use crate::retry::{next_retry_delay, RetryPolicy};

/// HTTP client for the generation service.
pub struct TavusApi {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    retry: RetryPolicy,
}

/// Request body for the creation endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CreateVideoRequest {
    pub genre: String,
    pub personality: String,
    pub script: String,
}

/// Response returned by `POST /generate` after queuing a job.
///
/// Field names tolerate both the documented camelCase shape and the
/// snake_case shape the service has been observed to send.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoCreated {
    #[serde(rename = "videoId", alias = "video_id", default)]
    pub video_id: Option<String>,
    #[serde(rename = "videoUrl", alias = "hosted_url", default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Response returned by the status and force-check endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoDetails {
    #[serde(rename = "videoId", alias = "video_id")]
    pub video_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "hostedUrl", alias = "hosted_url", default)]
    pub hosted_url: Option<String>,
    #[serde(default)]
    pub stream_url: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    /// Free-form progress indicator, e.g. `"42/100"`.
    #[serde(default)]
    pub generation_progress: Option<String>,
}

/// Errors from the generation-service client.
#[derive(Debug, thiserror::Error)]
pub enum TavusApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.) on every
    /// attempt.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// No attempt completed within the per-attempt timeout.
    #[error("Request timed out after {after:?}")]
    Timeout { after: std::time::Duration },

    /// The service returned a non-2xx status code.
    #[error("Generation API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl TavusApiError {
    /// HTTP status of an [`Api`](Self::Api) error, if that is what this is.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl TavusApi {
    /// Create a client for the generation service.
    ///
    /// * `api_url` - Base URL, e.g. `https://tavusapi.com/v2`.
    /// * `api_key` - Sent as the `x-api-key` header on every request.
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            retry: RetryPolicy::default(),
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling across differently configured
    /// clients).
    pub fn with_client(client: reqwest::Client, api_url: String, api_key: String) -> Self {
        Self {
            client,
            api_url,
            api_key,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the default retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Base URL this client targets.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a generation request.
    ///
    /// Sends `POST /generate`. The service may answer with just an id, or,
    /// for cached renditions, with a terminal status and URL.
    pub async fn create_video(
        &self,
        request: &CreateVideoRequest,
    ) -> Result<VideoCreated, TavusApiError> {
        let url = format!("{}/generate", self.api_url);
        let response = self
            .request_with_retry(|| {
                self.client
                    .post(&url)
                    .header("x-api-key", &self.api_key)
                    .json(request)
            })
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the current status of a video.
    ///
    /// Sends `GET /status/{video_id}`. Error statuses are returned as
    /// [`TavusApiError::Api`] for the caller to classify (404 unknown,
    /// 410 blocked, 429 rate limited, 5xx transient).
    pub async fn get_video(&self, video_id: &str) -> Result<VideoDetails, TavusApiError> {
        let url = format!("{}/status/{}", self.api_url, video_id);
        let response = self
            .request_with_retry(|| self.client.get(&url).header("x-api-key", &self.api_key))
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the live status of a video, bypassing any service-side cache.
    ///
    /// Sends `GET /check/{video_id}`; same shape as [`get_video`](Self::get_video).
    pub async fn check_video(&self, video_id: &str) -> Result<VideoDetails, TavusApiError> {
        let url = format!("{}/check/{}", self.api_url, video_id);
        let response = self
            .request_with_retry(|| self.client.get(&url).header("x-api-key", &self.api_key))
            .await?;

        Self::parse_response(response).await
    }

    /// Issue a request with the configured timeout and retry policy.
    ///
    /// Makes `max_retries + 1` attempts in total. An attempt fails on a
    /// network error or when it exceeds the per-attempt timeout; any
    /// received HTTP response is returned immediately, whatever its status.
    /// The wait before retry `n` is `base_delay × n`.
    pub async fn request_with_retry<F>(
        &self,
        make_request: F,
    ) -> Result<reqwest::Response, TavusApiError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let error = match tokio::time::timeout(
                self.retry.attempt_timeout,
                make_request().send(),
            )
            .await
            {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(e)) => TavusApiError::Request(e),
                Err(_) => TavusApiError::Timeout {
                    after: self.retry.attempt_timeout,
                },
            };

            if attempt > self.retry.max_retries {
                return Err(error);
            }

            let delay = next_retry_delay(&self.retry, attempt);
            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Generation API request failed, retrying",
            );
            tokio::time::sleep(delay).await;
        }
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the response
    /// unchanged on success, or a [`TavusApiError::Api`] containing the
    /// status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, TavusApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TavusApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, TavusApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Synthesize a local video id when the creation response carried none.
///
/// The record still needs a unique key so the rest of the lifecycle can
/// proceed; the `local-` prefix makes these ids recognisable in logs.
pub fn fallback_video_id(genre: &str) -> String {
    format!("local-{}-{}", genre, uuid::Uuid::new_v4())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
