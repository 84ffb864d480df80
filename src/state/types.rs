//! State types for tracking sync progress
//!
//! The persisted shape is a flat JSON object: one top-level timestamp
//! per stream bookmark plus `currently_syncing`, matching what the tap
//! emits in STATE messages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Suffix for bookmarks a child stream inherits from its parent
///
/// `invoice_line_items_parent` records how far the invoices endpoint has
/// carried its line items, separately from any bookmark the child earns
/// through an endpoint of its own.
pub const PARENT_SUFFIX: &str = "_parent";

/// Persisted run state
///
/// Bookmark values are timestamp strings in the API's own formats, which
/// order lexicographically, so comparisons stay plain string comparisons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// Stream a previous run was working on when it stopped, if any
    #[serde(default)]
    pub currently_syncing: Option<String>,

    /// Bookmark timestamps keyed by stream id
    #[serde(flatten)]
    pub bookmarks: BTreeMap<String, String>,
}

impl RunState {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the bookmark for a stream, falling back to `default`
    pub fn get_bookmark(&self, stream: &str, default: &str) -> String {
        self.bookmarks
            .get(stream)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    /// Advance a bookmark, keeping the larger of old and new
    pub fn update_bookmark(&mut self, stream: &str, value: &str) {
        let advanced = self
            .bookmarks
            .get(stream)
            .is_none_or(|current| value > current.as_str());
        if advanced {
            self.bookmarks.insert(stream.to_string(), value.to_string());
        }
    }

    /// Overwrite a bookmark unconditionally
    pub fn set_bookmark(&mut self, stream: &str, value: impl Into<String>) {
        self.bookmarks.insert(stream.to_string(), value.into());
    }

    /// Get the interrupted-run marker
    pub fn currently_syncing(&self) -> Option<&str> {
        self.currently_syncing.as_deref()
    }

    /// Set or clear the interrupted-run marker
    pub fn set_currently_syncing(&mut self, stream: Option<&str>) {
        self.currently_syncing = stream.map(str::to_string);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_default() {
        let state = RunState::new();
        assert!(state.bookmarks.is_empty());
        assert!(state.currently_syncing().is_none());
    }

    #[test]
    fn test_get_bookmark_falls_back_to_default() {
        let state = RunState::new();
        assert_eq!(
            state.get_bookmark("clients", "2021-01-01T00:00:00Z"),
            "2021-01-01T00:00:00Z"
        );
    }

    #[test]
    fn test_update_bookmark_keeps_maximum() {
        let mut state = RunState::new();

        state.update_bookmark("clients", "2021-05-01T00:00:00Z");
        assert_eq!(state.get_bookmark("clients", ""), "2021-05-01T00:00:00Z");

        // Older value does not move the bookmark backwards.
        state.update_bookmark("clients", "2021-03-01T00:00:00Z");
        assert_eq!(state.get_bookmark("clients", ""), "2021-05-01T00:00:00Z");

        state.update_bookmark("clients", "2021-06-01T00:00:00Z");
        assert_eq!(state.get_bookmark("clients", ""), "2021-06-01T00:00:00Z");
    }

    #[test]
    fn test_set_bookmark_overwrites() {
        let mut state = RunState::new();

        state.update_bookmark("invoices", "2021-06-01T00:00:00Z");
        state.set_bookmark("invoices", "2021-01-01T00:00:00Z");
        assert_eq!(state.get_bookmark("invoices", ""), "2021-01-01T00:00:00Z");
    }

    #[test]
    fn test_serializes_flat() {
        let mut state = RunState::new();
        state.set_currently_syncing(Some("invoices"));
        state.set_bookmark("clients", "2021-05-01T00:00:00Z");
        state.set_bookmark("invoice_line_items_parent", "2021-04-01T00:00:00Z");

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["currently_syncing"], "invoices");
        assert_eq!(json["clients"], "2021-05-01T00:00:00Z");
        assert_eq!(json["invoice_line_items_parent"], "2021-04-01T00:00:00Z");
    }

    #[test]
    fn test_cleared_marker_serializes_as_null() {
        let mut state = RunState::new();
        state.set_currently_syncing(None);

        let json = serde_json::to_value(&state).unwrap();
        assert!(json["currently_syncing"].is_null());
    }

    #[test]
    fn test_deserializes_flat() {
        let json = r#"{
            "currently_syncing": "estimates",
            "clients": "2021-05-01T00:00:00Z",
            "estimates": "2021-02-01T00:00:00Z"
        }"#;

        let state: RunState = serde_json::from_str(json).unwrap();
        assert_eq!(state.currently_syncing(), Some("estimates"));
        assert_eq!(state.get_bookmark("clients", ""), "2021-05-01T00:00:00Z");
        assert_eq!(state.get_bookmark("estimates", ""), "2021-02-01T00:00:00Z");
    }
}
