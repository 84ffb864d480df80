//! State management module
//!
//! Handles bookmark tracking and resumability. State is persisted
//! between sync runs to enable incremental extraction, and every STATE
//! message the tap emits is a snapshot of it.
//!
//! # Overview
//!
//! The state module provides:
//! - `RunState` - Flat bookmark map plus the interrupted-run marker
//! - `StateManager` - Shared, optionally file-backed state access

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{RunState, PARENT_SUFFIX};
