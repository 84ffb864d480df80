//! CLI module
//!
//! Command-line interface for the tap.
//!
//! # Modes
//!
//! - `--discover` - Print the catalog for the connected account
//! - default - Sync the cataloged streams, emitting Singer messages

mod commands;
mod runner;

pub use commands::Cli;
pub use runner::Runner;
