//! Authenticator for the Harvest identity service
//!
//! Exchanges the configured refresh token for access tokens and resolves
//! the account id every API request must carry.

use super::types::{AccountsResponse, CachedToken, TokenResponse};
use crate::config::TapConfig;
use crate::error::{Error, Result};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Production Harvest identity service base URL
pub const BASE_ID_URL: &str = "https://id.getharvest.com/api/v2/";

/// Handles token refresh and account resolution
///
/// Tokens and the resolved account id are cached behind `RwLock`s so a
/// single authenticator can be shared across concurrent requests.
pub struct Authenticator {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    user_agent: String,
    account_override: Option<String>,
    base_url: String,
    http_client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    cached_account: Arc<RwLock<Option<String>>>,
}

impl Authenticator {
    /// Create an authenticator from tap configuration
    pub fn new(config: &TapConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    /// Create an authenticator with a custom HTTP client
    pub fn with_client(config: &TapConfig, http_client: Client) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_token: config.refresh_token.clone(),
            user_agent: config.user_agent.clone(),
            account_override: config.account_id.clone(),
            base_url: BASE_ID_URL.to_string(),
            http_client,
            cached_token: Arc::new(RwLock::new(None)),
            cached_account: Arc::new(RwLock::new(None)),
        }
    }

    /// Override the identity service base URL
    #[must_use]
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = if url.ends_with('/') {
            url.to_string()
        } else {
            format!("{url}/")
        };
        self
    }

    /// Get a valid access token, refreshing if necessary
    pub async fn access_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expired() {
                    return Ok(token.token.clone());
                }
            }
        }

        let mut cached = self.cached_token.write().await;

        // Double-check after acquiring the write lock (another task might
        // have refreshed).
        if let Some(token) = cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.token.clone());
            }
        }

        let fresh = self.refresh_access_token().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);

        Ok(token)
    }

    /// Resolve the account id for this credential set.
    ///
    /// A configured account id wins; otherwise the first account listed by
    /// the identity service is used and cached for the rest of the run.
    pub async fn account_id(&self) -> Result<String> {
        if let Some(id) = &self.account_override {
            return Ok(id.clone());
        }

        {
            let cached = self.cached_account.read().await;
            if let Some(id) = cached.as_ref() {
                return Ok(id.clone());
            }
        }

        let token = self.access_token().await?;

        let mut cached = self.cached_account.write().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let id = self.fetch_account_id(&token).await?;
        *cached = Some(id.clone());

        Ok(id)
    }

    /// Drop the cached token and account id (forces re-auth)
    pub async fn clear_cache(&self) {
        *self.cached_token.write().await = None;
        *self.cached_account.write().await = None;
    }

    async fn refresh_access_token(&self) -> Result<CachedToken> {
        let url = format!("{}oauth2/token", self.base_url);
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", self.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        debug!(url = %url, "refreshing access token");

        let response = self
            .http_client
            .post(&url)
            .header("User-Agent", &self.user_agent)
            .form(&form)
            .send()
            .await
            .map_err(Error::Http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::token_refresh(format!(
                "token request failed with status {status}: {body}"
            )));
        }

        let token: TokenResponse = response.json().await.map_err(Error::Http)?;
        Ok(token.into_cached_token())
    }

    async fn fetch_account_id(&self, token: &str) -> Result<String> {
        let url = format!("{}accounts", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .bearer_auth(token)
            .send()
            .await
            .map_err(Error::Http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::auth(format!(
                "account listing failed with status {status}: {body}"
            )));
        }

        let listing: AccountsResponse = response.json().await.map_err(Error::Http)?;
        let first = listing.accounts.first().ok_or(Error::NoActiveAccount)?;

        info!(account_id = first.id, "resolved harvest account");
        Ok(first.id.to_string())
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("base_url", &self.base_url)
            .field("account_override", &self.account_override)
            .finish_non_exhaustive()
    }
}
