//! Harvest identity service integration
//!
//! Exchanges the configured OAuth refresh token for short-lived access
//! tokens and resolves the numeric account id that every API request
//! must carry in the `Harvest-Account-Id` header.

mod authenticator;
mod types;

pub use authenticator::{Authenticator, BASE_ID_URL};
pub use types::CachedToken;
