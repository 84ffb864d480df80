//! Embedded stream schemas
//!
//! Schema JSON files are compiled into the binary so discovery needs no
//! files on disk, mirroring how built-in definitions ship elsewhere in
//! the ecosystem.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::streams::StreamNode;

use super::types::MetadataEntry;

static SCHEMAS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    m.insert("clients", include_str!("../../schemas/clients.json"));
    m.insert("contacts", include_str!("../../schemas/contacts.json"));
    m.insert("user_roles", include_str!("../../schemas/user_roles.json"));
    m.insert("roles", include_str!("../../schemas/roles.json"));
    m.insert("projects", include_str!("../../schemas/projects.json"));
    m.insert("tasks", include_str!("../../schemas/tasks.json"));
    m.insert(
        "project_tasks",
        include_str!("../../schemas/project_tasks.json"),
    );
    m.insert(
        "project_users",
        include_str!("../../schemas/project_users.json"),
    );
    m.insert(
        "user_project_tasks",
        include_str!("../../schemas/user_project_tasks.json"),
    );
    m.insert(
        "user_projects",
        include_str!("../../schemas/user_projects.json"),
    );
    m.insert("users", include_str!("../../schemas/users.json"));
    m.insert(
        "expense_categories",
        include_str!("../../schemas/expense_categories.json"),
    );
    m.insert("expenses", include_str!("../../schemas/expenses.json"));
    m.insert(
        "invoice_item_categories",
        include_str!("../../schemas/invoice_item_categories.json"),
    );
    m.insert(
        "invoice_messages",
        include_str!("../../schemas/invoice_messages.json"),
    );
    m.insert(
        "invoice_payments",
        include_str!("../../schemas/invoice_payments.json"),
    );
    m.insert(
        "invoice_line_items",
        include_str!("../../schemas/invoice_line_items.json"),
    );
    m.insert("invoices", include_str!("../../schemas/invoices.json"));
    m.insert(
        "estimate_item_categories",
        include_str!("../../schemas/estimate_item_categories.json"),
    );
    m.insert(
        "estimate_messages",
        include_str!("../../schemas/estimate_messages.json"),
    );
    m.insert(
        "estimate_line_items",
        include_str!("../../schemas/estimate_line_items.json"),
    );
    m.insert("estimates", include_str!("../../schemas/estimates.json"));
    m.insert(
        "external_reference",
        include_str!("../../schemas/external_reference.json"),
    );
    m.insert(
        "time_entry_external_reference",
        include_str!("../../schemas/time_entry_external_reference.json"),
    );
    m.insert(
        "time_entries",
        include_str!("../../schemas/time_entries.json"),
    );

    m
});

/// The raw embedded schema for a stream.
pub fn raw_schema(stream: &str) -> Option<&'static str> {
    SCHEMAS.get(stream).copied()
}

/// Parse a stream's embedded schema.
pub fn load_schema(stream: &str) -> Result<Value> {
    let raw = raw_schema(stream).ok_or_else(|| Error::UnknownStream {
        stream: stream.to_string(),
    })?;
    let schema = serde_json::from_str(raw)?;
    Ok(schema)
}

/// Build the standard metadata list for a stream.
///
/// The root breadcrumb carries the table's key properties and
/// replication settings. Key properties and the replication key are
/// marked automatic so they are always emitted; everything else starts
/// out available.
pub fn standard_metadata(node: &StreamNode, schema: &Value) -> Vec<MetadataEntry> {
    let valid_replication_keys: Vec<&str> = node.replication_key.into_iter().collect();
    let mut entries = vec![MetadataEntry {
        breadcrumb: Vec::new(),
        metadata: json!({
            "table-key-properties": node.key_properties,
            "forced-replication-method": node.replication.as_str(),
            "valid-replication-keys": valid_replication_keys,
            "inclusion": "available",
        }),
    }];

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return entries;
    };
    for field in properties.keys() {
        let automatic = node.key_properties.contains(&field.as_str())
            || node.replication_key == Some(field.as_str());
        let inclusion = if automatic { "automatic" } else { "available" };
        entries.push(MetadataEntry {
            breadcrumb: vec!["properties".to_string(), field.clone()],
            metadata: json!({ "inclusion": inclusion }),
        });
    }
    entries
}
