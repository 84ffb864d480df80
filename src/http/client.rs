//! Harvest API client
//!
//! Authenticated GET requests against the Harvest v2 API with rate
//! limiting, retries, and typed status mapping.

use crate::auth::Authenticator;
use crate::config::TapConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::rate_limit::RateLimiter;

/// Production Harvest API base URL
pub const BASE_API_URL: &str = "https://api.harvestapp.com/v2/";

/// Retry policy for API requests
///
/// Delays double on every attempt, capped at `max_backoff`. A 429
/// response that carries a `Retry-After` header uses that value instead.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts before giving up
    pub max_tries: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: 5,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with explicit limits
    pub fn new(max_tries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_tries,
            initial_backoff,
            max_backoff,
        }
    }

    /// Delay to sleep after a failed attempt (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(multiplier)
            .min(self.max_backoff)
    }
}

/// Interface the sync engine uses to fetch API pages.
///
/// Implemented by [`HarvestClient`] for real traffic and by in-memory
/// doubles in engine tests.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// GET `path` (relative to the API base) with query parameters and
    /// return the parsed JSON body.
    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value>;
}

/// HTTP client for the Harvest v2 API
///
/// Each request waits on the shared rate limiter, attaches the OAuth
/// bearer token and account id from the [`Authenticator`], and maps
/// non-success statuses onto [`Error`] variants. Rate-limit responses,
/// server errors, timeouts, and connect failures are retried per the
/// [`RetryPolicy`]; other client errors fail the request immediately.
pub struct HarvestClient {
    http: reqwest::Client,
    auth: Arc<Authenticator>,
    rate_limiter: RateLimiter,
    retry: RetryPolicy,
    base_url: Url,
    user_agent: String,
    timeout: Duration,
}

impl HarvestClient {
    /// Create a client from tap configuration
    pub fn new(config: &TapConfig) -> Result<Self> {
        let http = build_http_client(config)?;
        let auth = Authenticator::with_client(config, http.clone());
        Self::assemble(config, http, auth)
    }

    /// Create a client with a pre-built authenticator
    pub fn with_authenticator(config: &TapConfig, auth: Authenticator) -> Result<Self> {
        let http = build_http_client(config)?;
        Self::assemble(config, http, auth)
    }

    fn assemble(config: &TapConfig, http: reqwest::Client, auth: Authenticator) -> Result<Self> {
        Ok(Self {
            http,
            auth: Arc::new(auth),
            rate_limiter: RateLimiter::default(),
            retry: RetryPolicy::default(),
            base_url: Url::parse(BASE_API_URL)?,
            user_agent: config.user_agent.clone(),
            timeout: config.request_timeout(),
        })
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, url: &str) -> Result<Self> {
        // A trailing slash keeps Url::join from eating the last path segment.
        let normalized = if url.ends_with('/') {
            url.to_string()
        } else {
            format!("{url}/")
        };
        self.base_url = Url::parse(&normalized)?;
        Ok(self)
    }

    /// Override the retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the rate limiter
    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Access the authenticator backing this client
    pub fn authenticator(&self) -> &Authenticator {
        &self.auth
    }

    fn endpoint_url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn timeout_error(&self) -> Error {
        Error::Timeout {
            timeout_ms: self.timeout.as_millis().try_into().unwrap_or(u64::MAX),
        }
    }

    async fn request(&self, url: &Url, params: &[(String, String)]) -> Result<Value> {
        let mut attempt: u32 = 0;
        let mut last_error: Option<Error> = None;

        while attempt < self.retry.max_tries {
            self.rate_limiter.wait().await;

            let token = self.auth.access_token().await?;
            let account_id = self.auth.account_id().await?;

            debug!(url = %url, attempt, "requesting");

            let request = self
                .http
                .get(url.clone())
                .query(params)
                .header("Accept", "application/json")
                .header("Harvest-Account-Id", &account_id)
                .header("User-Agent", &self.user_agent)
                .bearer_auth(token);

            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();

                    if response.status().is_success() {
                        return response.json().await.map_err(Error::Http);
                    }

                    if status == 429 {
                        let wait = extract_retry_after(&response)
                            .unwrap_or_else(|| self.retry.delay_for(attempt));
                        warn!(url = %url, attempt, wait_secs = wait.as_secs(), "rate limited");
                        last_error = Some(error_from_response(status, response).await);
                        attempt += 1;
                        if attempt < self.retry.max_tries {
                            tokio::time::sleep(wait).await;
                        }
                        continue;
                    }

                    if status >= 500 {
                        let delay = self.retry.delay_for(attempt);
                        warn!(url = %url, status, attempt, "server error, retrying");
                        last_error = Some(error_from_response(status, response).await);
                        attempt += 1;
                        if attempt < self.retry.max_tries {
                            tokio::time::sleep(delay).await;
                        }
                        continue;
                    }

                    // Remaining client errors are not retryable.
                    return Err(error_from_response(status, response).await);
                }
                Err(err) if err.is_timeout() || err.is_connect() => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(url = %url, attempt, error = %err, "transport error, retrying");
                    last_error = Some(if err.is_timeout() {
                        self.timeout_error()
                    } else {
                        Error::Http(err)
                    });
                    attempt += 1;
                    if attempt < self.retry.max_tries {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => return Err(Error::Http(err)),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Other("retry budget exhausted".to_string())))
    }
}

#[async_trait]
impl ApiClient for HarvestClient {
    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value> {
        let url = self.endpoint_url(path)?;
        self.request(&url, params).await
    }
}

impl fmt::Debug for HarvestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarvestClient")
            .field("base_url", &self.base_url.as_str())
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn build_http_client(config: &TapConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(Error::Http)
}

/// Build the typed error for a non-success response, preferring the
/// description Harvest put in the body over the documented default.
async fn error_from_response(status: u16, response: reqwest::Response) -> Error {
    let body = response.text().await.unwrap_or_default();
    Error::from_status(status, server_message(&body))
}

/// Pull the error description out of a response body, if present.
///
/// Harvest API errors carry `message`; the identity service uses
/// `error_description` or `error`.
fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_string))
}

/// Parse the Retry-After header from a 429 response
fn extract_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
