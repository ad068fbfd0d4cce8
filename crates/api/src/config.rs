use std::time::Duration;

use ghostwriters_core::polling::PollingConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `4000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Base URL of the external generation service.
    pub tavus_api_url: String,
    /// API key sent on every generation-service request.
    pub tavus_api_key: String,
    /// Polling timings; only the maximum duration is env-tunable, the rest
    /// follow the defaults in `ghostwriters_core::polling`.
    pub polling: PollingConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                   |
    /// |-----------------------------|---------------------------|
    /// | `HOST`                      | `0.0.0.0`                 |
    /// | `PORT`                      | `4000`                    |
    /// | `CORS_ORIGINS`              | `http://localhost:3000`   |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                      |
    /// | `TAVUS_API_URL`             | `https://tavusapi.com/v2` |
    /// | `TAVUS_API_KEY`             | (empty)                   |
    /// | `MAX_POLLING_DURATION_SECS` | `120`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "4000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let tavus_api_url = std::env::var("TAVUS_API_URL")
            .unwrap_or_else(|_| "https://tavusapi.com/v2".into());

        let tavus_api_key = std::env::var("TAVUS_API_KEY").unwrap_or_default();

        let max_polling_secs: u64 = std::env::var("MAX_POLLING_DURATION_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("MAX_POLLING_DURATION_SECS must be a valid u64");

        let polling =
            PollingConfig::default().with_max_duration(Duration::from_secs(max_polling_secs));

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            tavus_api_url,
            tavus_api_key,
            polling,
        }
    }
}
