//! Tap configuration
//!
//! The config file is a JSON object in the shape the orchestrating framework
//! supplies: OAuth credentials, the replication start date, and a couple of
//! optional knobs.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default request timeout in seconds, used when the config omits
/// `request_timeout` or sets it to zero/empty.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

// ============================================================================
// Tap Config
// ============================================================================

/// Complete tap configuration loaded from the `--config` file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapConfig {
    /// OAuth application client id
    pub client_id: String,

    /// OAuth application client secret
    pub client_secret: String,

    /// Long-lived refresh token used to mint access tokens
    pub refresh_token: String,

    /// User-Agent header value sent on every request
    pub user_agent: String,

    /// Replication start date (ISO-8601 UTC); the bookmark floor for every
    /// stream that has no persisted cursor yet
    pub start_date: String,

    /// Harvest account id override; resolved from the identity API when
    /// absent
    #[serde(default)]
    pub account_id: Option<String>,

    /// Per-request timeout in seconds; accepts a number or a numeric string
    #[serde(default)]
    pub request_timeout: Option<serde_json::Value>,
}

impl TapConfig {
    /// Load and validate a config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::config(format!("Failed to read config file: {e}")))?;
        Self::from_json(&content)
    }

    /// Parse and validate a config JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("Invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields are present and non-empty
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("refresh_token", &self.refresh_token),
            ("user_agent", &self.user_agent),
            ("start_date", &self.start_date),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::missing_field(field));
            }
        }
        Ok(())
    }

    /// Effective per-request timeout.
    ///
    /// Mirrors the upstream tolerance: numbers and numeric strings are
    /// accepted, and zero/empty/absent all fall back to the default.
    pub fn request_timeout(&self) -> Duration {
        let secs = match &self.request_timeout {
            Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        };
        if secs > 0.0 {
            Duration::from_secs_f64(secs)
        } else {
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        }
    }
}
