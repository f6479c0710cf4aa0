//! Incremental command - Create placeholders for new remote files

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use strmsync_sync::IncrementalSync;

use super::{build_services, load_config, resolve_pairs};
use crate::output::{get_formatter, print_report, OutputFormat};

#[derive(Debug, Args)]
pub struct IncrementalCommand {
    /// Sync this `LOCAL#REMOTE` pair instead of the configured ones
    #[arg(long = "pair", value_name = "LOCAL#REMOTE")]
    pub pairs: Vec<String>,
}

impl IncrementalCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        let config = load_config(config_path)?;
        let pairs = resolve_pairs(&self.pairs, &config.incremental_sync.paths)?;
        if pairs.is_empty() {
            formatter.warn("No incremental sync pairs configured (incremental_sync.paths)");
            return Ok(());
        }
        info!(pairs = pairs.len(), "Starting incremental sync");

        let services = build_services(&config).await?;
        let report = IncrementalSync::new(services, &config)
            .run(&pairs)
            .await
            .context("Incremental sync aborted")?;
        print_report(format, &report);
        Ok(())
    }
}
