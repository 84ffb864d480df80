//! Wire types for the Harvest identity service

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Lifetime assumed when the token response omits `expires_in` (17 hours)
pub(crate) const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 61_200;

/// OAuth2 token response from the identity service
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    #[allow(dead_code)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    pub fn into_cached_token(self) -> CachedToken {
        let lifetime = self.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        CachedToken::expires_in(self.access_token, lifetime)
    }
}

/// Accounts listing from the identity service
#[derive(Debug, Deserialize)]
pub(crate) struct AccountsResponse {
    #[serde(default)]
    pub accounts: Vec<Account>,
}

/// One account the credential set can access
#[derive(Debug, Deserialize)]
pub(crate) struct Account {
    pub id: i64,
    #[serde(default)]
    #[allow(dead_code)]
    pub name: Option<String>,
}

/// Cached access token with expiration
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// The access token
    pub token: String,
    /// When the token expires
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Create a token that expires in N seconds from now
    pub fn expires_in(token: String, seconds: i64) -> Self {
        Self {
            token,
            expires_at: Utc::now() + chrono::Duration::seconds(seconds),
        }
    }

    /// Check if the token is expired (with 30 second buffer)
    pub fn is_expired(&self) -> bool {
        let buffer = chrono::Duration::seconds(30);
        Utc::now() + buffer >= self.expires_at
    }
}
