//! Catalog discovery and selection
//!
//! Discovery mode asks the Harvest API which feature groups the account
//! has and assembles a catalog from the embedded stream schemas. Sync
//! mode reads the same catalog back, honoring stream and field selection
//! recorded in its metadata.

mod discover;
mod schema;
mod types;

pub use discover::discover;
pub use schema::{load_schema, raw_schema, standard_metadata};
pub use types::{Catalog, CatalogEntry, MetadataEntry};
