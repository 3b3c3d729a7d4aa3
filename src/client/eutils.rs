//! Retrying HTTP client for NCBI E-utilities endpoints.

use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;

use crate::client::{ApiError, RateLimiter};

/// Configuration for the E-utilities client
#[derive(Debug, Clone)]
pub struct EutilsConfig {
    /// NCBI API key; raises the account ceiling from 3 to 10 req/s
    pub api_key: Option<String>,

    /// Minimum spacing between outbound requests
    pub min_interval: Duration,

    /// Attempt bound for transient failures (429/5xx/network)
    pub max_retries: u32,

    /// Base backoff delay; doubles before each retry (1s, 2s, 4s, ...)
    pub backoff_base: Duration,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for EutilsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            min_interval: crate::client::DEFAULT_MIN_INTERVAL,
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP client for E-utilities with shared rate limiting and retry on
/// transient failures.
#[derive(Debug, Clone)]
pub struct EutilsClient {
    client: Client,
    limiter: RateLimiter,
    config: EutilsConfig,
}

impl EutilsClient {
    pub fn new(config: EutilsConfig) -> Self {
        let limiter = RateLimiter::new(config.min_interval);
        Self::with_limiter(config, limiter)
    }

    /// Create a client sharing an existing limiter. Concurrent runs must
    /// share one limiter since the NCBI ceiling is per account, not per run.
    pub fn with_limiter(config: EutilsConfig, limiter: RateLimiter) -> Self {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            limiter,
            config,
        }
    }

    /// The limiter used by this client
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Issue a GET request with rate limiting and retry.
    ///
    /// 429, 5xx, and network-level failures (timeouts included) are retried
    /// with exponential backoff up to the configured bound; any other 4xx is
    /// a permanent caller error and fails immediately. Exhausting the bound
    /// surfaces as [`ApiError::RetriesExhausted`].
    pub async fn get(&self, url: &str, params: &[(&str, String)]) -> Result<String, ApiError> {
        let mut params: Vec<(&str, String)> = params.to_vec();
        if let Some(key) = &self.config.api_key {
            params.push(("api_key", key.clone()));
        }

        let mut last_error: Option<ApiError> = None;

        for attempt in 0..self.config.max_retries {
            if attempt > 0 {
                let delay = self.config.backoff_base * 2u32.pow(attempt - 1);
                tracing::warn!(
                    attempt = attempt + 1,
                    max = self.config.max_retries,
                    ?delay,
                    error = %last_error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
                    "transient E-utilities failure, backing off before retry"
                );
                sleep(delay).await;
            }

            self.limiter.acquire().await;

            let response = match self.client.get(url).query(&params).send().await {
                Ok(response) => response,
                Err(err) => {
                    last_error = Some(ApiError::Network(err.to_string()));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                match response.text().await {
                    Ok(body) => return Ok(body),
                    Err(err) => {
                        last_error = Some(ApiError::Network(err.to_string()));
                        continue;
                    }
                }
            }

            if status.as_u16() == 429 || status.is_server_error() {
                last_error = Some(ApiError::Status {
                    status: status.as_u16(),
                    retriable: true,
                });
                continue;
            }

            // Other 4xx: bad query syntax, auth. Not retriable.
            return Err(ApiError::Status {
                status: status.as_u16(),
                retriable: false,
            });
        }

        Err(ApiError::RetriesExhausted {
            attempts: self.config.max_retries,
            source: Box::new(
                last_error.unwrap_or_else(|| ApiError::Network("no attempts made".to_string())),
            ),
        })
    }
}
