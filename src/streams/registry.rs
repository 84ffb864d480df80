//! The stream table
//!
//! Every Harvest stream the tap knows, in declaration order. Top-level
//! streams run in this order; a child stream is reached through its
//! parent's rows. The helpers at the bottom answer the questions the
//! sync driver asks: which streams must be walked for a selection, which
//! top-level streams to run, and where a sync window starts.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::state::RunState;
use crate::streams::types::{Materialize, Replication, RowFlatten, RowSource, StreamNode};

const INCREMENTAL_KEY: Option<&str> = Some("updated_at");

/// All streams, in declaration order.
pub const STREAMS: &[StreamNode] = &[
    StreamNode {
        id: "clients",
        source: RowSource::Endpoint {
            path: "clients",
            response_key: "clients",
            with_updated_since: true,
        },
        parent: None,
        children: &[],
        key_properties: &["id"],
        replication: Replication::Incremental,
        replication_key: INCREMENTAL_KEY,
        object_ids: &[],
        date_fields: &[],
        flatten: None,
    },
    StreamNode {
        id: "contacts",
        source: RowSource::Endpoint {
            path: "contacts",
            response_key: "contacts",
            with_updated_since: true,
        },
        parent: None,
        children: &[],
        key_properties: &["id"],
        replication: Replication::Incremental,
        replication_key: INCREMENTAL_KEY,
        object_ids: &["client"],
        date_fields: &[],
        flatten: None,
    },
    StreamNode {
        id: "user_roles",
        source: RowSource::Materialized(Materialize::PivotIdList {
            list_field: "user_ids",
            parent_field: "role_id",
            member_field: "user_id",
        }),
        parent: Some("roles"),
        children: &[],
        key_properties: &["user_id", "role_id"],
        replication: Replication::FullTable,
        replication_key: None,
        object_ids: &[],
        date_fields: &[],
        flatten: None,
    },
    StreamNode {
        id: "roles",
        source: RowSource::Endpoint {
            path: "roles",
            response_key: "roles",
            with_updated_since: true,
        },
        parent: None,
        children: &["user_roles"],
        key_properties: &["id"],
        replication: Replication::Incremental,
        replication_key: INCREMENTAL_KEY,
        object_ids: &[],
        date_fields: &[],
        flatten: None,
    },
    StreamNode {
        id: "projects",
        source: RowSource::Endpoint {
            path: "projects",
            response_key: "projects",
            with_updated_since: true,
        },
        parent: None,
        children: &[],
        key_properties: &["id"],
        replication: Replication::Incremental,
        replication_key: INCREMENTAL_KEY,
        object_ids: &["client"],
        date_fields: &[],
        flatten: None,
    },
    StreamNode {
        id: "tasks",
        source: RowSource::Endpoint {
            path: "tasks",
            response_key: "tasks",
            with_updated_since: true,
        },
        parent: None,
        children: &[],
        key_properties: &["id"],
        replication: Replication::Incremental,
        replication_key: INCREMENTAL_KEY,
        object_ids: &[],
        date_fields: &[],
        flatten: None,
    },
    StreamNode {
        id: "project_tasks",
        source: RowSource::Endpoint {
            path: "task_assignments",
            response_key: "task_assignments",
            with_updated_since: true,
        },
        parent: None,
        children: &[],
        key_properties: &["id"],
        replication: Replication::Incremental,
        replication_key: INCREMENTAL_KEY,
        object_ids: &["project", "task"],
        date_fields: &[],
        flatten: None,
    },
    StreamNode {
        id: "project_users",
        source: RowSource::Endpoint {
            path: "user_assignments",
            response_key: "user_assignments",
            with_updated_since: true,
        },
        parent: None,
        children: &[],
        key_properties: &["id"],
        replication: Replication::Incremental,
        replication_key: INCREMENTAL_KEY,
        object_ids: &["project", "user"],
        date_fields: &[],
        flatten: None,
    },
    StreamNode {
        id: "user_project_tasks",
        source: RowSource::Materialized(Materialize::PivotObjectList {
            list_field: "task_assignments",
            element_field: "project_task_id",
            copied_field: "user_id",
        }),
        parent: Some("user_projects"),
        children: &[],
        key_properties: &["user_id", "project_task_id"],
        replication: Replication::FullTable,
        replication_key: None,
        object_ids: &[],
        date_fields: &[],
        flatten: None,
    },
    StreamNode {
        id: "user_projects",
        source: RowSource::Endpoint {
            path: "users/{}/project_assignments",
            response_key: "project_assignments",
            with_updated_since: false,
        },
        parent: Some("users"),
        children: &["user_project_tasks"],
        key_properties: &["id"],
        replication: Replication::Incremental,
        replication_key: INCREMENTAL_KEY,
        object_ids: &["project", "client", "user"],
        date_fields: &[],
        flatten: None,
    },
    StreamNode {
        id: "users",
        source: RowSource::Endpoint {
            path: "users",
            response_key: "users",
            with_updated_since: true,
        },
        parent: None,
        children: &["user_projects"],
        key_properties: &["id"],
        replication: Replication::Incremental,
        replication_key: INCREMENTAL_KEY,
        object_ids: &[],
        date_fields: &[],
        flatten: None,
    },
    StreamNode {
        id: "expense_categories",
        source: RowSource::Endpoint {
            path: "expense_categories",
            response_key: "expense_categories",
            with_updated_since: true,
        },
        parent: None,
        children: &[],
        key_properties: &["id"],
        replication: Replication::Incremental,
        replication_key: INCREMENTAL_KEY,
        object_ids: &[],
        date_fields: &[],
        flatten: None,
    },
    StreamNode {
        id: "expenses",
        source: RowSource::Endpoint {
            path: "expenses",
            response_key: "expenses",
            with_updated_since: true,
        },
        parent: None,
        children: &[],
        key_properties: &["id"],
        replication: Replication::Incremental,
        replication_key: INCREMENTAL_KEY,
        object_ids: &[
            "client",
            "project",
            "expense_category",
            "user",
            "user_assignment",
            "invoice",
        ],
        date_fields: &[],
        flatten: Some(RowFlatten::ExpenseReceipt),
    },
    StreamNode {
        id: "invoice_item_categories",
        source: RowSource::Endpoint {
            path: "invoice_item_categories",
            response_key: "invoice_item_categories",
            with_updated_since: true,
        },
        parent: None,
        children: &[],
        key_properties: &["id"],
        replication: Replication::Incremental,
        replication_key: INCREMENTAL_KEY,
        object_ids: &[],
        date_fields: &[],
        flatten: None,
    },
    StreamNode {
        id: "invoice_messages",
        source: RowSource::Endpoint {
            path: "invoices/{}/messages",
            response_key: "invoice_messages",
            with_updated_since: true,
        },
        parent: Some("invoices"),
        children: &[],
        key_properties: &["id"],
        replication: Replication::Incremental,
        replication_key: INCREMENTAL_KEY,
        object_ids: &[],
        date_fields: &[],
        flatten: None,
    },
    StreamNode {
        id: "invoice_payments",
        source: RowSource::Endpoint {
            path: "invoices/{}/payments",
            response_key: "invoice_payments",
            with_updated_since: true,
        },
        parent: Some("invoices"),
        children: &[],
        key_properties: &["id"],
        replication: Replication::Incremental,
        replication_key: INCREMENTAL_KEY,
        object_ids: &[],
        date_fields: &["send_reminder_on"],
        flatten: Some(RowFlatten::PaymentGateway),
    },
    StreamNode {
        id: "invoice_line_items",
        source: RowSource::Materialized(Materialize::LineItems {
            list_field: "line_items",
            parent_field: "invoice_id",
            object_ids: &["project"],
        }),
        parent: Some("invoices"),
        children: &[],
        key_properties: &["id"],
        replication: Replication::FullTable,
        replication_key: None,
        object_ids: &[],
        date_fields: &[],
        flatten: None,
    },
    StreamNode {
        id: "invoices",
        source: RowSource::Endpoint {
            path: "invoices",
            response_key: "invoices",
            with_updated_since: true,
        },
        parent: None,
        children: &["invoice_messages", "invoice_payments", "invoice_line_items"],
        key_properties: &["id"],
        replication: Replication::Incremental,
        replication_key: INCREMENTAL_KEY,
        object_ids: &["client", "estimate", "retainer", "creator"],
        date_fields: &[],
        flatten: None,
    },
    StreamNode {
        id: "estimate_item_categories",
        source: RowSource::Endpoint {
            path: "estimate_item_categories",
            response_key: "estimate_item_categories",
            with_updated_since: true,
        },
        parent: None,
        children: &[],
        key_properties: &["id"],
        replication: Replication::Incremental,
        replication_key: INCREMENTAL_KEY,
        object_ids: &[],
        date_fields: &[],
        flatten: None,
    },
    StreamNode {
        id: "estimate_messages",
        source: RowSource::Endpoint {
            path: "estimates/{}/messages",
            response_key: "estimate_messages",
            with_updated_since: true,
        },
        parent: Some("estimates"),
        children: &[],
        key_properties: &["id"],
        replication: Replication::Incremental,
        replication_key: INCREMENTAL_KEY,
        object_ids: &[],
        date_fields: &["send_reminder_on"],
        flatten: None,
    },
    StreamNode {
        id: "estimate_line_items",
        source: RowSource::Materialized(Materialize::LineItems {
            list_field: "line_items",
            parent_field: "estimate_id",
            object_ids: &[],
        }),
        parent: Some("estimates"),
        children: &[],
        key_properties: &["id"],
        replication: Replication::FullTable,
        replication_key: None,
        object_ids: &[],
        date_fields: &[],
        flatten: None,
    },
    StreamNode {
        id: "estimates",
        source: RowSource::Endpoint {
            path: "estimates",
            response_key: "estimates",
            with_updated_since: true,
        },
        parent: None,
        children: &["estimate_messages", "estimate_line_items"],
        key_properties: &["id"],
        replication: Replication::Incremental,
        replication_key: INCREMENTAL_KEY,
        object_ids: &["client", "creator"],
        date_fields: &["issue_date"],
        flatten: None,
    },
    StreamNode {
        id: "external_reference",
        source: RowSource::Materialized(Materialize::NestedObject {
            field: "external_reference",
        }),
        parent: Some("time_entries"),
        children: &[],
        key_properties: &["id"],
        replication: Replication::FullTable,
        replication_key: None,
        object_ids: &[],
        date_fields: &[],
        flatten: None,
    },
    StreamNode {
        id: "time_entry_external_reference",
        source: RowSource::Materialized(Materialize::ReferenceJoin {
            field: "external_reference",
            parent_field: "time_entry_id",
            member_field: "external_reference_id",
        }),
        parent: Some("time_entries"),
        children: &[],
        key_properties: &["time_entry_id", "external_reference_id"],
        replication: Replication::FullTable,
        replication_key: None,
        object_ids: &[],
        date_fields: &[],
        flatten: None,
    },
    StreamNode {
        id: "time_entries",
        source: RowSource::Endpoint {
            path: "time_entries",
            response_key: "time_entries",
            with_updated_since: true,
        },
        parent: None,
        children: &["external_reference", "time_entry_external_reference"],
        key_properties: &["id"],
        replication: Replication::Incremental,
        replication_key: INCREMENTAL_KEY,
        object_ids: &[
            "user",
            "user_assignment",
            "client",
            "project",
            "task",
            "task_assignment",
            "external_reference",
            "invoice",
        ],
        date_fields: &[],
        flatten: None,
    },
];

static BY_ID: LazyLock<HashMap<&'static str, &'static StreamNode>> = LazyLock::new(|| {
    STREAMS.iter().map(|node| (node.id, node)).collect()
});

/// Look up a stream by name.
pub fn find(id: &str) -> Option<&'static StreamNode> {
    BY_ID.get(id).copied()
}

/// Look up a stream by name, failing for names the tap does not know.
pub fn get(id: &str) -> Result<&'static StreamNode> {
    find(id).ok_or_else(|| Error::UnknownStream {
        stream: id.to_string(),
    })
}

/// Whether any stream below `node` is selected.
pub fn any_descendant_selected(node: &StreamNode, selected: &HashSet<String>) -> bool {
    node.children.iter().any(|child_id| {
        selected.contains(*child_id)
            || find(child_id).is_some_and(|child| any_descendant_selected(child, selected))
    })
}

/// Streams that must be walked so every selected stream is reached:
/// the selected streams plus their ancestors, in declaration order.
pub fn sync_scope(selected: &HashSet<String>) -> Vec<&'static str> {
    STREAMS
        .iter()
        .filter(|node| selected.contains(node.id) || any_descendant_selected(node, selected))
        .map(|node| node.id)
        .collect()
}

/// Top-level streams to run for a selection, in declaration order.
pub fn top_level_to_sync(selected: &HashSet<String>) -> Vec<&'static str> {
    STREAMS
        .iter()
        .filter(|node| node.is_top_level())
        .filter(|node| selected.contains(node.id) || any_descendant_selected(node, selected))
        .map(|node| node.id)
        .collect()
}

/// The floor of a stream family's sync window.
///
/// Takes the minimum (by string comparison, which timestamps in the
/// emitted format order correctly) of the current time and the bookmark
/// of every selected stream in the subtree, with children read from
/// their `<name>_parent` key and missing bookmarks defaulting to the
/// start date.
pub fn min_bookmark(
    node: &StreamNode,
    selected: &HashSet<String>,
    current_time: &str,
    start_date: &str,
    state: &RunState,
) -> String {
    let mut minimum = current_time.to_string();
    if selected.contains(node.id) {
        let own = state.get_bookmark(&node.window_state_key(), start_date);
        if own < minimum {
            minimum = own;
        }
    }
    for child_id in node.children {
        if let Some(child) = find(child_id) {
            let child_min = min_bookmark(child, selected, &minimum, start_date, state);
            if child_min < minimum {
                minimum = child_min;
            }
        }
    }
    minimum
}
