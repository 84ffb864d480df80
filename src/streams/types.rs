//! Stream definitions
//!
//! A [`StreamNode`] describes one Harvest stream: where its rows come
//! from, how it hangs off a parent stream, and which record-shaping
//! steps apply. The full table lives in [`super::registry`].

use serde_json::Value;

/// Replication method advertised in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replication {
    /// Filtered by `updated_since` and bookmarked on `updated_at`.
    Incremental,
    /// Re-emitted in full, gated by the parent's bookmark.
    FullTable,
}

impl Replication {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Incremental => "INCREMENTAL",
            Self::FullTable => "FULL_TABLE",
        }
    }
}

/// Row shaping applied before any other record munging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFlatten {
    /// Lift `receipt.url` and friends to `receipt_*` fields.
    ExpenseReceipt,
    /// Lift `payment_gateway.id`/`.name` to first-level fields.
    PaymentGateway,
}

/// How rows of a child stream derive from a parent record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialize {
    /// One row per id in a list field on the parent.
    ///
    /// `{ parent_field: parent.id, member_field: <list entry> }`
    PivotIdList {
        list_field: &'static str,
        parent_field: &'static str,
        member_field: &'static str,
    },
    /// One row per object in a list field on the parent, keyed by the
    /// object's id plus a field copied from the parent row.
    ///
    /// `{ element_field: <entry>.id, copied_field: parent[copied_field] }`
    PivotObjectList {
        list_field: &'static str,
        element_field: &'static str,
        copied_field: &'static str,
    },
    /// Objects in a list field on the parent, emitted whole with a
    /// foreign key back to the parent.
    LineItems {
        list_field: &'static str,
        parent_field: &'static str,
        /// Nested objects on each entry to lift into `<name>_id` fields.
        object_ids: &'static [&'static str],
    },
    /// A single nested object on the parent, emitted when present.
    NestedObject { field: &'static str },
    /// A join row linking the parent id to a nested object's id.
    ReferenceJoin {
        field: &'static str,
        parent_field: &'static str,
        member_field: &'static str,
    },
}

/// Where a stream's rows come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSource {
    /// A paginated fetch against the stream's own endpoint. `path` may
    /// contain `{}`, replaced by the parent record's id.
    Endpoint {
        path: &'static str,
        /// Envelope key holding the rows in a response page.
        response_key: &'static str,
        /// Whether the endpoint accepts an `updated_since` filter.
        with_updated_since: bool,
    },
    /// Rows assembled from the parent record, with no fetch of their own.
    Materialized(Materialize),
}

/// One stream in the Harvest hierarchy.
#[derive(Debug, Clone, Copy)]
pub struct StreamNode {
    pub id: &'static str,
    pub source: RowSource,
    pub parent: Option<&'static str>,
    pub children: &'static [&'static str],
    pub key_properties: &'static [&'static str],
    pub replication: Replication,
    /// Field that advances the stream's bookmark, when it has one.
    pub replication_key: Option<&'static str>,
    /// Nested objects to lift into `<name>_id` foreign keys.
    pub object_ids: &'static [&'static str],
    /// Date-only fields widened to timestamps after transformation.
    pub date_fields: &'static [&'static str],
    pub flatten: Option<RowFlatten>,
}

impl StreamNode {
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    /// Foreign-key field a child row gets for its parent, derived by
    /// singularizing the parent stream name (`invoices` -> `invoice_id`).
    pub fn parent_foreign_key(&self) -> Option<String> {
        self.parent
            .map(|parent| format!("{}_id", parent.strip_suffix('s').unwrap_or(parent)))
    }

    /// Endpoint path with the parent id substituted in, for streams that
    /// fetch their own rows.
    pub fn resolved_path(&self, parent_row: Option<&Value>) -> Option<String> {
        let RowSource::Endpoint { path, .. } = self.source else {
            return None;
        };
        if !path.contains("{}") {
            return Some(path.to_string());
        }
        let parent_id = parent_row
            .and_then(|row| row.get("id"))
            .map(render_id)
            .unwrap_or_default();
        Some(path.replace("{}", &parent_id))
    }

    /// Key under which this stream's sync window floor is read from
    /// state: the stream name itself, or `<name>_parent` for children
    /// whose window rides on the parent's bookmark.
    pub fn window_state_key(&self) -> String {
        if self.parent.is_some() {
            format!("{}{}", self.id, crate::state::PARENT_SUFFIX)
        } else {
            self.id.to_string()
        }
    }
}

/// Render a record id for URL interpolation.
fn render_id(value: &Value) -> String {
    match value {
        Value::String(id) => id.clone(),
        other => other.to_string(),
    }
}
