//! HTTP layer for the Harvest API
//!
//! Provides the authenticated [`HarvestClient`] with retry, backoff,
//! and a token-bucket rate limiter sized to the documented Harvest
//! budget of 100 requests per 15 seconds.

mod client;
mod rate_limit;

pub use client::{ApiClient, HarvestClient, RetryPolicy, BASE_API_URL};
pub use rate_limit::{RateLimiter, RateLimiterConfig};

#[cfg(test)]
mod tests;
