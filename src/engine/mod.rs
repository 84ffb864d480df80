//! Sync engine
//!
//! Drives a full tap run over the selected streams.
//!
//! # Overview
//!
//! The engine module provides:
//! - `SyncEngine` - Plans the run order, walks each stream family
//!   depth-first, and checkpoints bookmarks along the way
//! - `SyncStats` - Counters reported after a run
//!
//! A run visits each eligible top-level stream in turn. For every stream
//! it announces schemas for the selected members of the family, drains
//! the stream's endpoint page by page, descends into child streams per
//! parent record, and emits a state checkpoint so an interrupted run can
//! resume where it left off.

mod types;

pub use types::SyncStats;

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::http::ApiClient;
use crate::messages::{Message, MessageSink};
use crate::state::{RunState, StateManager};
use crate::streams::{self, Materialize, RowFlatten, RowSource, StreamNode};
use crate::transform::{
    append_times_to_dates, flatten_object_ids, flatten_payment_gateway, flatten_receipt,
    format_timestamp, format_updated_since, remove_empty_date_times, transform_record,
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Run-wide inputs threaded through the recursive stream walk.
struct RunContext<'a> {
    catalog: &'a Catalog,
    /// Streams whose own records are written to the sink.
    selected: &'a HashSet<String>,
    /// Streams walked this run: every selected stream plus its ancestors.
    scope: &'a HashSet<&'static str>,
    /// State as loaded at run start. All window floors and resume points
    /// read from here, so mid-run bookmark writes never narrow the
    /// current run's own fetch window.
    run_start: &'a RunState,
    start_date: &'a str,
}

/// Sync engine for orchestrating data extraction
pub struct SyncEngine {
    /// Harvest API client
    client: Arc<dyn ApiClient>,
    /// Live run state, updated as records are emitted
    state: StateManager,
    /// Fallback bookmark for streams never synced before
    start_date: String,
    /// Time source, swappable for deterministic runs
    clock: fn() -> DateTime<Utc>,
    /// Statistics
    stats: SyncStats,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(
        client: Arc<dyn ApiClient>,
        state: StateManager,
        start_date: impl Into<String>,
    ) -> Self {
        Self {
            client,
            state,
            start_date: start_date.into(),
            clock: Utc::now,
            stats: SyncStats::default(),
        }
    }

    /// Replace the time source
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Get statistics
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Run a full sync of every selected stream in the catalog.
    ///
    /// Top-level streams run in declaration order, rotated so that a
    /// stream interrupted last run goes first. `currently_syncing` is
    /// kept up to date around each stream and cleared only when the
    /// whole run finishes.
    pub async fn sync(&mut self, catalog: &Catalog, sink: &mut dyn MessageSink) -> Result<()> {
        let started = Instant::now();

        let selected: HashSet<String> = catalog.selected_streams().into_iter().collect();
        if selected.is_empty() {
            info!("no streams selected in catalog, nothing to sync");
            return Ok(());
        }
        debug!(?selected, "selected streams");

        let run_start = self.state.snapshot().await;
        let scope: HashSet<&'static str> = streams::sync_scope(&selected).into_iter().collect();

        let mut run_order = streams::top_level_to_sync(&selected);
        if let Some(current) = run_start.currently_syncing() {
            if let Some(position) = run_order.iter().position(|id| *id == current) {
                run_order.rotate_left(position);
            }
        }
        debug!(?run_order, "top-level run order");

        let start_date = self.start_date.clone();
        let ctx = RunContext {
            catalog,
            selected: &selected,
            scope: &scope,
            run_start: &run_start,
            start_date: &start_date,
        };

        for stream_id in run_order {
            let node = streams::get(stream_id)?;

            info!(stream = stream_id, "starting sync");
            self.state.set_currently_syncing(Some(stream_id)).await;
            self.write_state(sink).await?;

            self.write_schemas(node, catalog, &selected, sink)?;
            self.sync_node(node, &ctx, None, sink).await?;
            self.write_state(sink).await?;

            self.stats.add_stream();
            info!(stream = stream_id, "finished sync");
        }

        self.state.set_currently_syncing(None).await;
        self.write_state(sink).await?;

        #[allow(clippy::cast_possible_truncation)]
        self.stats.set_duration(started.elapsed().as_millis() as u64);
        info!(
            records = self.stats.records_written,
            pages = self.stats.pages_fetched,
            streams = self.stats.streams_synced,
            "sync complete"
        );
        Ok(())
    }

    /// Emit a STATE message with the current bookmarks.
    async fn write_state(&self, sink: &mut dyn MessageSink) -> Result<()> {
        let snapshot = self.state.snapshot().await;
        sink.write(Message::state(&snapshot)?)
    }

    /// Emit SCHEMA messages for every selected stream in `node`'s family.
    fn write_schemas(
        &self,
        node: &StreamNode,
        catalog: &Catalog,
        selected: &HashSet<String>,
        sink: &mut dyn MessageSink,
    ) -> Result<()> {
        if selected.contains(node.id) {
            let entry = catalog.require_stream(node.id)?;
            let bookmark_properties = node
                .replication_key
                .map(|key| vec![key.to_string()])
                .unwrap_or_default();
            sink.write(Message::schema(
                node.id,
                entry.schema.clone(),
                entry.key_properties.clone(),
                bookmark_properties,
            ))?;
        }
        for child_id in node.children {
            self.write_schemas(streams::get(child_id)?, catalog, selected, sink)?;
        }
        Ok(())
    }

    /// Sync one stream node: fetch or materialize its rows, then descend
    /// into children per row. Boxed because the walk is recursive.
    fn sync_node<'a>(
        &'a mut self,
        node: &'static StreamNode,
        ctx: &'a RunContext<'a>,
        parent_row: Option<&'a Value>,
        sink: &'a mut dyn MessageSink,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            match node.source {
                RowSource::Endpoint { .. } => {
                    self.sync_endpoint(node, ctx, parent_row, sink).await
                }
                RowSource::Materialized(kind) => self.materialize(node, kind, ctx, parent_row, sink),
            }
        })
    }

    /// Drain one endpoint-backed stream and its selected descendants.
    async fn sync_endpoint(
        &mut self,
        node: &'static StreamNode,
        ctx: &RunContext<'_>,
        parent_row: Option<&Value>,
        sink: &mut dyn MessageSink,
    ) -> Result<()> {
        let RowSource::Endpoint {
            response_key,
            with_updated_since,
            ..
        } = node.source
        else {
            return Ok(());
        };

        let entry = ctx.catalog.require_stream(node.id)?;
        let excluded = entry.excluded_fields();
        let schema = &entry.schema;

        let current_time = format_timestamp(&(self.clock)());
        // Server-side filter: the lowest bookmark across the selected
        // family, so a lagging child never misses parent rows.
        let window_floor = streams::min_bookmark(
            node,
            ctx.selected,
            &current_time,
            ctx.start_date,
            ctx.run_start,
        );
        // Emission filter: this stream's own resume point. Rows fetched
        // only for a child's benefit are not re-emitted for the parent.
        let resume_floor = ctx.run_start.get_bookmark(node.id, ctx.start_date);
        let mut last_datetime = resume_floor.clone();

        let path = match node.resolved_path(parent_row) {
            Some(path) => path,
            None => return Ok(()),
        };
        debug!(
            stream = node.id,
            %path,
            window_floor = %window_floor,
            "syncing endpoint"
        );

        let mut page = Some(1u64);
        while let Some(page_number) = page {
            let mut params: Vec<(String, String)> = Vec::new();
            if with_updated_since {
                params.push((
                    "updated_since".to_string(),
                    format_updated_since(&window_floor),
                ));
            }
            params.push(("page".to_string(), page_number.to_string()));

            let response = self.client.get(&path, &params).await?;
            self.stats.add_page();

            let rows = response
                .get(response_key)
                .and_then(Value::as_array)
                .ok_or_else(|| Error::MissingEnvelope {
                    stream: node.id.to_string(),
                    key: response_key.to_string(),
                })?;
            let time_extracted = format_timestamp(&(self.clock)());

            for row in rows {
                let mut row = row.clone();

                match node.flatten {
                    Some(RowFlatten::ExpenseReceipt) => flatten_receipt(&mut row),
                    Some(RowFlatten::PaymentGateway) => flatten_payment_gateway(&mut row),
                    None => {}
                }
                flatten_object_ids(&mut row, node.object_ids);
                if let (Some(foreign_key), Some(parent)) =
                    (node.parent_foreign_key(), parent_row)
                {
                    let parent_id = parent.get("id").cloned().unwrap_or(Value::Null);
                    if let Some(map) = row.as_object_mut() {
                        map.insert(foreign_key, parent_id);
                    }
                }
                remove_empty_date_times(&mut row, schema);

                let mut record = transform_record(node.id, &row, schema, &excluded)?;
                append_times_to_dates(&mut record, node.date_fields);

                let bookmark_value = match node.replication_key {
                    Some(key) => Some(
                        record
                            .get(key)
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .ok_or_else(|| {
                                Error::transform(
                                    node.id,
                                    format!("record is missing replication key '{key}'"),
                                )
                            })?,
                    ),
                    None => None,
                };

                if ctx.selected.contains(node.id) {
                    let past_floor = match &bookmark_value {
                        Some(value) => value.as_str() >= resume_floor.as_str(),
                        None => true,
                    };
                    if past_floor {
                        sink.write(Message::record(
                            node.id,
                            record.clone(),
                            Some(time_extracted.clone()),
                        ))?;
                        self.stats.add_record();
                        if let Some(value) = &bookmark_value {
                            self.state.update_bookmark(node.id, value).await;
                        }
                    }
                }

                for child_id in node.children {
                    if ctx.scope.contains(child_id) {
                        let child = streams::get(child_id)?;
                        self.sync_node(child, ctx, Some(&row), sink).await?;
                    }
                }

                // The parent watermark tracks every fetched row, selected
                // or not, so child windows advance either way.
                if let Some(value) = bookmark_value {
                    if value > last_datetime {
                        last_datetime = value;
                    }
                }
            }

            page = response.get("next_page").and_then(Value::as_u64);
        }

        // Propagate the watermark to each selected child so its window
        // advances next run, capped at the run's clock so a future-dated
        // parent row cannot push a child window past "now". A child that
        // synced a future-dated row of its own is likewise pulled back.
        if node.replication_key.is_some() {
            for child_id in node.children {
                let child = streams::get(child_id)?;
                if !ctx.selected.contains(*child_id) {
                    continue;
                }
                let watermark = if last_datetime > current_time {
                    current_time.clone()
                } else {
                    last_datetime.clone()
                };
                self.state
                    .update_bookmark(&child.window_state_key(), &watermark)
                    .await;
                let own = self.state.get_bookmark(child.id, &current_time).await;
                if own > current_time {
                    self.state.set_bookmark(child.id, current_time.clone()).await;
                }
            }
        }

        self.write_state(sink).await
    }

    /// Emit rows assembled from a parent record. Materialized streams
    /// have no endpoint, no bookmark, and no children; bookmark
    /// checkpoints stay with the parent.
    fn materialize(
        &mut self,
        node: &'static StreamNode,
        kind: Materialize,
        ctx: &RunContext<'_>,
        parent_row: Option<&Value>,
        sink: &mut dyn MessageSink,
    ) -> Result<()> {
        let Some(parent) = parent_row else {
            return Ok(());
        };
        let parent_id = parent.get("id").cloned().unwrap_or(Value::Null);
        let parent_updated = parent.get("updated_at").cloned().unwrap_or(Value::Null);

        match kind {
            Materialize::PivotIdList {
                list_field,
                parent_field,
                member_field,
            } => {
                for member in list_entries(parent, list_field) {
                    let row = synthetic_row([
                        (parent_field, parent_id.clone()),
                        (member_field, member.clone()),
                        ("updated_at", parent_updated.clone()),
                    ]);
                    self.emit_materialized(node, row, sink)?;
                }
            }
            Materialize::PivotObjectList {
                list_field,
                element_field,
                copied_field,
            } => {
                for element in list_entries(parent, list_field) {
                    let row = synthetic_row([
                        (
                            element_field,
                            element.get("id").cloned().unwrap_or(Value::Null),
                        ),
                        (
                            copied_field,
                            parent.get(copied_field).cloned().unwrap_or(Value::Null),
                        ),
                        ("updated_at", parent_updated.clone()),
                    ]);
                    self.emit_materialized(node, row, sink)?;
                }
            }
            Materialize::LineItems {
                list_field,
                parent_field,
                object_ids,
            } => {
                let entry = ctx.catalog.require_stream(node.id)?;
                let excluded = entry.excluded_fields();
                for element in list_entries(parent, list_field) {
                    let mut row = element.clone();
                    if let Some(map) = row.as_object_mut() {
                        map.insert(parent_field.to_string(), parent_id.clone());
                        map.insert("updated_at".to_string(), parent_updated.clone());
                    }
                    flatten_object_ids(&mut row, object_ids);
                    let record = transform_record(node.id, &row, &entry.schema, &excluded)?;
                    self.emit_materialized(node, record, sink)?;
                }
            }
            Materialize::NestedObject { field } => {
                if let Some(object) = non_null(parent.get(field)) {
                    let entry = ctx.catalog.require_stream(node.id)?;
                    let excluded = entry.excluded_fields();
                    let mut row = object.clone();
                    if let Some(map) = row.as_object_mut() {
                        map.insert("updated_at".to_string(), parent_updated.clone());
                    }
                    let record = transform_record(node.id, &row, &entry.schema, &excluded)?;
                    self.emit_materialized(node, record, sink)?;
                }
            }
            Materialize::ReferenceJoin {
                field,
                parent_field,
                member_field,
            } => {
                if let Some(object) = non_null(parent.get(field)) {
                    let row = synthetic_row([
                        (parent_field, parent_id.clone()),
                        (
                            member_field,
                            object.get("id").cloned().unwrap_or(Value::Null),
                        ),
                        ("updated_at", parent_updated.clone()),
                    ]);
                    self.emit_materialized(node, row, sink)?;
                }
            }
        }
        Ok(())
    }

    fn emit_materialized(
        &mut self,
        node: &StreamNode,
        row: Value,
        sink: &mut dyn MessageSink,
    ) -> Result<()> {
        let time_extracted = format_timestamp(&(self.clock)());
        sink.write(Message::record(node.id, row, Some(time_extracted)))?;
        self.stats.add_record();
        Ok(())
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("start_date", &self.start_date)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Entries of a list field on a parent row, empty when absent.
fn list_entries<'r>(row: &'r Value, field: &str) -> &'r [Value] {
    row.get(field)
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| !value.is_null())
}

/// Assemble a synthetic child row from field pairs.
fn synthetic_row(fields: [(&str, Value); 3]) -> Value {
    let mut map = Map::new();
    for (name, value) in fields {
        map.insert(name.to_string(), value);
    }
    Value::Object(map)
}
