//! Catalog types
//!
//! The catalog is the contract between discovery and sync: one entry per
//! stream with its JSON schema and a metadata list keyed by breadcrumb.
//! Selection lives in metadata, an empty breadcrumb for the stream and
//! `["properties", <field>]` for individual fields.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A full catalog, as read from `--catalog` or produced by discovery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub streams: Vec<CatalogEntry>,
}

/// One stream's entry in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub stream: String,
    pub tap_stream_id: String,
    pub schema: Value,
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
    #[serde(default)]
    pub key_properties: Vec<String>,
}

/// A metadata record attached to a breadcrumb.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub breadcrumb: Vec<String>,
    pub metadata: Value,
}

impl Catalog {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|err| {
            Error::config(format!(
                "Failed to read catalog file '{}': {err}",
                path.as_ref().display()
            ))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let catalog = serde_json::from_str(raw)?;
        Ok(catalog)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        let rendered = serde_json::to_string_pretty(self)?;
        Ok(rendered)
    }

    pub fn get_stream(&self, tap_stream_id: &str) -> Option<&CatalogEntry> {
        self.streams
            .iter()
            .find(|entry| entry.tap_stream_id == tap_stream_id)
    }

    pub fn require_stream(&self, tap_stream_id: &str) -> Result<&CatalogEntry> {
        self.get_stream(tap_stream_id)
            .ok_or_else(|| Error::StreamNotFound {
                stream: tap_stream_id.to_string(),
            })
    }

    /// Streams marked selected at their root breadcrumb, in catalog order.
    pub fn selected_streams(&self) -> Vec<String> {
        self.streams
            .iter()
            .filter(|entry| entry.is_selected())
            .map(|entry| entry.tap_stream_id.clone())
            .collect()
    }
}

impl CatalogEntry {
    /// The metadata map at the stream's root breadcrumb.
    pub fn root_metadata(&self) -> Option<&Value> {
        self.metadata
            .iter()
            .find(|entry| entry.breadcrumb.is_empty())
            .map(|entry| &entry.metadata)
    }

    pub fn is_selected(&self) -> bool {
        self.root_metadata()
            .and_then(|metadata| metadata.get("selected"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Fields to drop from every record: those marked unsupported, and
    /// those explicitly deselected. Automatic fields always survive.
    pub fn excluded_fields(&self) -> HashSet<String> {
        let mut excluded = HashSet::new();
        for entry in &self.metadata {
            let [root, field] = entry.breadcrumb.as_slice() else {
                continue;
            };
            if root != "properties" {
                continue;
            }
            let inclusion = entry.metadata.get("inclusion").and_then(Value::as_str);
            if inclusion == Some("automatic") {
                continue;
            }
            let deselected = entry.metadata.get("selected").and_then(Value::as_bool) == Some(false);
            if inclusion == Some("unsupported") || deselected {
                excluded.insert(field.clone());
            }
        }
        excluded
    }
}

#[cfg(test)]
mod entry_tests {
    use super::*;
    use serde_json::json;

    fn entry(metadata: Vec<MetadataEntry>) -> CatalogEntry {
        CatalogEntry {
            stream: "clients".to_string(),
            tap_stream_id: "clients".to_string(),
            schema: json!({"type": "object", "properties": {}}),
            metadata,
            key_properties: vec!["id".to_string()],
        }
    }

    fn metadata_entry(breadcrumb: &[&str], metadata: Value) -> MetadataEntry {
        MetadataEntry {
            breadcrumb: breadcrumb.iter().map(ToString::to_string).collect(),
            metadata,
        }
    }

    #[test]
    fn test_selection_defaults_to_false() {
        assert!(!entry(vec![]).is_selected());

        let unmarked = entry(vec![metadata_entry(&[], json!({"inclusion": "available"}))]);
        assert!(!unmarked.is_selected());

        let marked = entry(vec![metadata_entry(&[], json!({"selected": true}))]);
        assert!(marked.is_selected());
    }

    #[test]
    fn test_excluded_fields() {
        let entry = entry(vec![
            metadata_entry(&[], json!({"selected": true})),
            metadata_entry(&["properties", "id"], json!({"inclusion": "automatic"})),
            metadata_entry(
                &["properties", "updated_at"],
                json!({"inclusion": "automatic", "selected": false}),
            ),
            metadata_entry(
                &["properties", "name"],
                json!({"inclusion": "available", "selected": false}),
            ),
            metadata_entry(
                &["properties", "statement_key"],
                json!({"inclusion": "unsupported"}),
            ),
            metadata_entry(
                &["properties", "currency"],
                json!({"inclusion": "available"}),
            ),
        ]);

        let excluded = entry.excluded_fields();
        assert!(excluded.contains("name"));
        assert!(excluded.contains("statement_key"));
        // Automatic wins over an explicit deselection.
        assert!(!excluded.contains("updated_at"));
        assert!(!excluded.contains("currency"));
        assert!(!excluded.contains("id"));
    }
}
