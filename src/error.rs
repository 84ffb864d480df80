//! Error types for tap-harvest
//!
//! This module defines the error hierarchy for the whole tap.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for tap-harvest
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Token refresh failed: {message}")]
    TokenRefresh { message: String },

    #[error("No Active Harvest Account found")]
    NoActiveAccount,

    // ============================================================================
    // Harvest API Errors
    //
    // One variant per documented status class so callers can match on the
    // failure kind. Display follows the upstream convention
    // "HTTP-error-code: <code>, Error: <message>".
    // ============================================================================
    #[error("HTTP-error-code: 400, Error: {message}")]
    BadRequest { message: String },

    #[error("HTTP-error-code: 401, Error: {message}")]
    Unauthorized { message: String },

    #[error("HTTP-error-code: 403, Error: {message}")]
    Forbidden { message: String },

    #[error("HTTP-error-code: 404, Error: {message}")]
    NotFound { message: String },

    #[error("HTTP-error-code: 422, Error: {message}")]
    UnprocessableEntity { message: String },

    #[error("HTTP-error-code: 429, Error: {message}")]
    RateLimitExceeded { message: String },

    #[error("HTTP-error-code: {status}, Error: {message}")]
    Server { status: u16, message: String },

    #[error("HTTP-error-code: {status}, Error: {message}")]
    UnexpectedStatus { status: u16, message: String },

    // ============================================================================
    // Transport Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Data Errors
    // ============================================================================
    #[error("Response for stream '{stream}' is missing the '{key}' envelope")]
    MissingEnvelope { stream: String, key: String },

    #[error("Record transform failed for stream '{stream}': {message}")]
    Transform { stream: String, message: String },

    // ============================================================================
    // State Errors
    // ============================================================================
    #[error("State error: {message}")]
    State { message: String },

    // ============================================================================
    // Catalog Errors
    // ============================================================================
    #[error("Stream '{stream}' not found in catalog")]
    StreamNotFound { stream: String },

    #[error("Unknown stream '{stream}' in registry")]
    UnknownStream { stream: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a token refresh error
    pub fn token_refresh(message: impl Into<String>) -> Self {
        Self::TokenRefresh {
            message: message.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create a transform error
    pub fn transform(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transform {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Map an HTTP status to the matching API error variant.
    ///
    /// `server_message` is the description the API put in the response body,
    /// if any; otherwise the documented default for that status is used.
    pub fn from_status(status: u16, server_message: Option<String>) -> Self {
        let message = server_message.unwrap_or_else(|| default_message(status).to_string());
        match status {
            400 => Self::BadRequest { message },
            401 => Self::Unauthorized { message },
            403 => Self::Forbidden { message },
            404 => Self::NotFound { message },
            422 => Self::UnprocessableEntity { message },
            429 => Self::RateLimitExceeded { message },
            500..=599 => Self::Server { status, message },
            _ => Self::UnexpectedStatus { status, message },
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Http(_)
                | Error::Timeout { .. }
                | Error::RateLimitExceeded { .. }
                | Error::Server { .. }
        )
    }
}

/// Default human-readable description per status, used when the response
/// body carries none.
fn default_message(status: u16) -> &'static str {
    match status {
        400 => "The request is missing or has a bad parameter.",
        401 => "Invalid authorization credentials.",
        403 => "User does not have permission to access the resource or related feature is disabled.",
        404 => "The resource you have specified cannot be found.",
        422 => "The request was not able to process right now.",
        429 => "API rate limit exceeded.",
        500..=599 => "An error has occurred at Harvest's end.",
        _ => "Unknown error.",
    }
}

/// Result type alias for tap-harvest
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
