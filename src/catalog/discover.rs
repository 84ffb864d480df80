//! Catalog discovery
//!
//! Builds a catalog entry for every stream the connected Harvest account
//! can serve. The account's company settings gate the expense, invoice,
//! and estimate stream groups; accounts with a feature switched off
//! never see those streams in their catalog.

use serde_json::Value;

use crate::error::Result;
use crate::http::ApiClient;
use crate::streams;

use super::schema::{load_schema, standard_metadata};
use super::types::{Catalog, CatalogEntry};

const COMMON_STREAMS: &[&str] = &[
    "clients",
    "contacts",
    "user_roles",
    "roles",
    "projects",
    "tasks",
    "project_tasks",
    "project_users",
    "user_project_tasks",
    "user_projects",
    "users",
    "external_reference",
    "time_entry_external_reference",
    "time_entries",
];

const EXPENSES_STREAMS: &[&str] = &["expense_categories", "expenses"];

const INVOICES_STREAMS: &[&str] = &[
    "invoice_item_categories",
    "invoice_line_items",
    "invoice_messages",
    "invoice_payments",
    "invoices",
];

const ESTIMATES_STREAMS: &[&str] = &[
    "estimate_item_categories",
    "estimate_line_items",
    "estimate_messages",
    "estimates",
];

/// Build the catalog for the connected account.
pub async fn discover(client: &dyn ApiClient) -> Result<Catalog> {
    let company = client.get("company", &[]).await?;
    let available = available_streams(&company);

    let mut entries = Vec::with_capacity(available.len());
    for stream_name in available {
        let node = streams::get(stream_name)?;
        let schema = load_schema(stream_name)?;
        let metadata = standard_metadata(node, &schema);
        entries.push(CatalogEntry {
            stream: stream_name.to_string(),
            tap_stream_id: stream_name.to_string(),
            schema,
            metadata,
            key_properties: node.key_properties.iter().map(ToString::to_string).collect(),
        });
    }
    Ok(Catalog { streams: entries })
}

fn available_streams(company: &Value) -> Vec<&'static str> {
    let mut available: Vec<&'static str> = COMMON_STREAMS.to_vec();
    if feature_enabled(company, "expense_feature") {
        available.extend_from_slice(EXPENSES_STREAMS);
    }
    if feature_enabled(company, "invoice_feature") {
        available.extend_from_slice(INVOICES_STREAMS);
    }
    if feature_enabled(company, "estimate_feature") {
        available.extend_from_slice(ESTIMATES_STREAMS);
    }
    available
}

fn feature_enabled(company: &Value, feature: &str) -> bool {
    company.get(feature).and_then(Value::as_bool).unwrap_or(false)
}
