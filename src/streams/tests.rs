//! Tests for the stream table and selection helpers

use std::collections::HashSet;

use serde_json::json;

use super::*;
use crate::state::RunState;

const START_DATE: &str = "2022-07-30T00:00:00.000000Z";
const CURRENT_TIME: &str = "2022-11-30T00:00:00.000000Z";

fn selected(ids: &[&str]) -> HashSet<String> {
    ids.iter().map(ToString::to_string).collect()
}

fn state_from(value: serde_json::Value) -> RunState {
    serde_json::from_value(value).unwrap()
}

// ============================================================================
// Registry Integrity Tests
// ============================================================================

#[test]
fn test_registry_has_all_streams() {
    assert_eq!(STREAMS.len(), 25);
    assert_eq!(STREAMS.first().unwrap().id, "clients");
    assert_eq!(STREAMS.last().unwrap().id, "time_entries");
}

#[test]
fn test_registry_ids_are_unique() {
    let ids: HashSet<&str> = STREAMS.iter().map(|node| node.id).collect();
    assert_eq!(ids.len(), STREAMS.len());
}

#[test]
fn test_parent_child_links_are_reciprocal() {
    for node in STREAMS {
        for child_id in node.children {
            let child = find(child_id).unwrap();
            assert_eq!(child.parent, Some(node.id), "child {child_id}");
        }
        if let Some(parent_id) = node.parent {
            let parent = find(parent_id).unwrap();
            assert!(
                parent.children.contains(&node.id),
                "{} missing from children of {}",
                node.id,
                parent_id
            );
        }
    }
}

#[test]
fn test_endpoint_children_interpolate_parent_id() {
    for node in STREAMS {
        if let RowSource::Endpoint { path, .. } = node.source {
            assert_eq!(
                path.contains("{}"),
                node.parent.is_some(),
                "path of {}",
                node.id
            );
        }
    }
}

#[test]
fn test_materialized_streams_have_parents_and_no_bookmark() {
    for node in STREAMS {
        if matches!(node.source, RowSource::Materialized(_)) {
            assert!(node.parent.is_some(), "{} needs a parent", node.id);
            assert!(node.replication_key.is_none(), "{}", node.id);
            assert_eq!(node.replication, Replication::FullTable, "{}", node.id);
        } else {
            assert_eq!(node.replication_key, Some("updated_at"), "{}", node.id);
        }
    }
}

#[test]
fn test_top_level_run_order() {
    let all: HashSet<String> = STREAMS.iter().map(|node| node.id.to_string()).collect();
    let top_level = top_level_to_sync(&all);
    assert_eq!(
        top_level,
        vec![
            "clients",
            "contacts",
            "roles",
            "projects",
            "tasks",
            "project_tasks",
            "project_users",
            "users",
            "expense_categories",
            "expenses",
            "invoice_item_categories",
            "invoices",
            "estimate_item_categories",
            "estimates",
            "time_entries",
        ]
    );
}

#[test]
fn test_unknown_stream_is_an_error() {
    let err = get("bogus").unwrap_err();
    assert!(matches!(
        err,
        crate::error::Error::UnknownStream { stream } if stream == "bogus"
    ));
}

// ============================================================================
// Selection Scope Tests
// ============================================================================

#[test]
fn test_scope_of_top_level_stream_is_itself() {
    assert_eq!(sync_scope(&selected(&["estimates"])), vec!["estimates"]);
}

#[test]
fn test_scope_pulls_in_ancestors_of_selected_children() {
    let scope = sync_scope(&selected(&["invoice_messages"]));
    assert_eq!(scope, vec!["invoice_messages", "invoices"]);
}

#[test]
fn test_scope_walks_through_unselected_intermediates() {
    let scope = sync_scope(&selected(&["user_project_tasks"]));
    assert_eq!(scope, vec!["user_project_tasks", "user_projects", "users"]);
}

#[test]
fn test_top_level_for_selected_children_only() {
    let run = top_level_to_sync(&selected(&["estimate_messages", "estimate_line_items"]));
    assert_eq!(run, vec!["estimates"]);
}

#[test]
fn test_top_level_keeps_declaration_order() {
    let run = top_level_to_sync(&selected(&["estimate_messages", "invoices", "estimates"]));
    assert_eq!(run, vec!["invoices", "estimates"]);
}

#[test]
fn test_descendant_selection_sees_grandchildren() {
    let users = find("users").unwrap();
    assert!(any_descendant_selected(
        users,
        &selected(&["user_project_tasks"])
    ));
    assert!(!any_descendant_selected(users, &selected(&["user_roles"])));
}

// ============================================================================
// Sync Window Floor Tests
// ============================================================================

#[test]
fn test_window_floor_parent_with_state() {
    let invoices = find("invoices").unwrap();
    let state = state_from(json!({"invoices": "2022-08-30T00:00:00.000000Z"}));
    let floor = min_bookmark(
        invoices,
        &selected(&["invoices"]),
        CURRENT_TIME,
        START_DATE,
        &state,
    );
    assert_eq!(floor, "2022-08-30T00:00:00.000000Z");
}

#[test]
fn test_window_floor_child_reads_parent_key() {
    let invoices = find("invoices").unwrap();
    let state = state_from(json!({"invoice_messages_parent": "2022-08-30T00:00:00.000000Z"}));
    let floor = min_bookmark(
        invoices,
        &selected(&["invoice_messages"]),
        CURRENT_TIME,
        START_DATE,
        &state,
    );
    assert_eq!(floor, "2022-08-30T00:00:00.000000Z");
}

#[test]
fn test_window_floor_defaults_to_start_date() {
    let invoices = find("invoices").unwrap();
    let empty = RunState::new();

    let floor = min_bookmark(
        invoices,
        &selected(&["invoices"]),
        CURRENT_TIME,
        START_DATE,
        &empty,
    );
    assert_eq!(floor, START_DATE);

    let floor = min_bookmark(
        invoices,
        &selected(&["invoice_messages"]),
        CURRENT_TIME,
        START_DATE,
        &empty,
    );
    assert_eq!(floor, START_DATE);
}

#[test]
fn test_window_floor_takes_minimum_across_family() {
    let invoices = find("invoices").unwrap();

    let state = state_from(json!({
        "invoice_messages_parent": "2022-08-30T00:00:00.000000Z",
        "invoices": "2022-07-30T00:00:00.000000Z"
    }));
    let floor = min_bookmark(
        invoices,
        &selected(&["invoices", "invoice_messages"]),
        CURRENT_TIME,
        START_DATE,
        &state,
    );
    assert_eq!(floor, "2022-07-30T00:00:00.000000Z");

    let state = state_from(json!({
        "invoice_messages_parent": "2022-07-30T00:00:00.000000Z",
        "invoices": "2022-08-30T00:00:00.000000Z"
    }));
    let floor = min_bookmark(
        invoices,
        &selected(&["invoices", "invoice_messages"]),
        CURRENT_TIME,
        START_DATE,
        &state,
    );
    assert_eq!(floor, "2022-07-30T00:00:00.000000Z");
}

#[test]
fn test_window_floor_multiple_children() {
    let invoices = find("invoices").unwrap();
    let state = state_from(json!({
        "invoice_messages_parent": "2022-07-30T00:00:00.000000Z",
        "invoices": "2022-08-30T00:00:00.000000Z",
        "invoice_payments_parent": "2022-06-30T00:00:00.000000Z"
    }));
    let floor = min_bookmark(
        invoices,
        &selected(&["invoices", "invoice_messages", "invoice_payments"]),
        CURRENT_TIME,
        START_DATE,
        &state,
    );
    assert_eq!(floor, "2022-06-30T00:00:00.000000Z");
}

#[test]
fn test_window_floor_children_only() {
    let invoices = find("invoices").unwrap();
    let state = state_from(json!({
        "invoice_messages_parent": "2022-08-30T00:00:00.000000Z",
        "invoice_payments_parent": "2022-07-30T00:00:00.000000Z"
    }));
    let floor = min_bookmark(
        invoices,
        &selected(&["invoice_messages", "invoice_payments"]),
        CURRENT_TIME,
        START_DATE,
        &state,
    );
    assert_eq!(floor, "2022-07-30T00:00:00.000000Z");
}

#[test]
fn test_window_floor_missing_child_bookmark_defaults() {
    let invoices = find("invoices").unwrap();
    let state = state_from(json!({
        "invoice_messages_parent": "2022-11-01T00:00:00.000000Z"
    }));
    let floor = min_bookmark(
        invoices,
        &selected(&["invoice_messages", "invoice_payments"]),
        CURRENT_TIME,
        START_DATE,
        &state,
    );
    assert_eq!(floor, START_DATE);
}

#[test]
fn test_window_floor_never_exceeds_current_time() {
    let invoices = find("invoices").unwrap();
    let state = state_from(json!({
        "invoices": "2023-01-15T00:00:00.000000Z"
    }));
    let floor = min_bookmark(
        invoices,
        &selected(&["invoices"]),
        CURRENT_TIME,
        START_DATE,
        &state,
    );
    assert_eq!(floor, CURRENT_TIME);
}

#[test]
fn test_window_floor_reaches_grandchildren() {
    let users = find("users").unwrap();
    let state = state_from(json!({
        "user_project_tasks_parent": "2022-05-01T00:00:00.000000Z"
    }));
    let floor = min_bookmark(
        users,
        &selected(&["user_project_tasks"]),
        CURRENT_TIME,
        START_DATE,
        &state,
    );
    assert_eq!(floor, "2022-05-01T00:00:00.000000Z");
}
