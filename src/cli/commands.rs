//! CLI arguments
//!
//! The tap speaks the classic Singer command line: `--config` is always
//! required, `--discover` prints a catalog, and a sync run reads the
//! catalog and state produced by earlier runs.

use clap::Parser;
use std::path::PathBuf;

/// Singer tap for the Harvest v2 API
#[derive(Parser, Debug)]
#[command(name = "tap-harvest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Catalog file from a previous discovery run
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// State file (JSON) from a previous sync run
    #[arg(short, long)]
    pub state: Option<PathBuf>,

    /// Run discovery and print the catalog to stdout
    #[arg(short, long)]
    pub discover: bool,
}
