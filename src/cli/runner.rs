//! CLI runner - executes the requested mode

use crate::catalog::{self, Catalog};
use crate::cli::commands::Cli;
use crate::config::TapConfig;
use crate::engine::SyncEngine;
use crate::error::Result;
use crate::http::HarvestClient;
use crate::messages::SingerWriter;
use crate::state::StateManager;
use std::sync::Arc;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run discovery or sync, per the parsed arguments
    pub async fn run(&self) -> Result<()> {
        let config = TapConfig::from_file(&self.cli.config)?;
        let client = Arc::new(HarvestClient::new(&config)?);

        if self.cli.discover {
            return Self::discover(client.as_ref()).await;
        }
        self.sync(&config, client).await
    }

    /// Build the account's catalog and print it to stdout.
    async fn discover(client: &HarvestClient) -> Result<()> {
        info!("starting discovery");
        let catalog = catalog::discover(client).await?;
        println!("{}", catalog.to_json_pretty()?);
        Ok(())
    }

    /// Sync the selected streams, emitting Singer messages on stdout.
    ///
    /// Without a `--catalog` file the tap discovers one first; freshly
    /// discovered entries carry no selection, so such a run emits nothing
    /// until the catalog is curated.
    async fn sync(&self, config: &TapConfig, client: Arc<HarvestClient>) -> Result<()> {
        let catalog = match &self.cli.catalog {
            Some(path) => Catalog::from_file(path)?,
            None => catalog::discover(client.as_ref()).await?,
        };
        let state = self.load_state()?;

        let mut engine = SyncEngine::new(client, state, config.start_date.clone());
        let mut writer = SingerWriter::stdout();
        engine.sync(&catalog, &mut writer).await?;

        // Orchestrators capture STATE messages from stdout; writing the
        // file back as well keeps plain `--state file` runs resumable.
        engine.state().save().await?;

        info!(
            records = engine.stats().records_written,
            streams = engine.stats().streams_synced,
            duration_ms = engine.stats().duration_ms,
            "run finished"
        );
        Ok(())
    }

    /// Load state from `--state`, or start empty
    fn load_state(&self) -> Result<StateManager> {
        match &self.cli.state {
            Some(path) => StateManager::from_file(path),
            None => Ok(StateManager::in_memory()),
        }
    }
}
