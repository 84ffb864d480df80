//! Harvest stream topology
//!
//! The tap's 25 streams form a forest: top-level streams fetch their own
//! pages, child streams either fetch pages scoped by a parent record
//! (invoice messages, project assignments) or are materialized straight
//! from the parent's rows (line items, pivot tables). This module holds
//! the stream table and the selection arithmetic over it.

mod registry;
mod types;

pub use registry::{
    any_descendant_selected, find, get, min_bookmark, sync_scope, top_level_to_sync, STREAMS,
};
pub use types::{Materialize, Replication, RowFlatten, RowSource, StreamNode};

#[cfg(test)]
mod tests;
