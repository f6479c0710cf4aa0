//! Full command - Rebuild the placeholder mirror
//!
//! Provides the `strmsync full` CLI command which:
//! 1. Loads and validates the configuration
//! 2. Connects the remote adapter, cache, directory trees and state store
//! 3. Runs the full sync over every configured pair
//! 4. Prints the run report
//!
//! Cleanup follows `full_sync.cleanup` unless `--cleanup` is given.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use strmsync_sync::FullSync;

use super::{build_services, load_config, resolve_pairs};
use crate::output::{get_formatter, print_report, OutputFormat};

#[derive(Debug, Args)]
pub struct FullCommand {
    /// Remove orphan placeholders even if `full_sync.cleanup` is off
    #[arg(long)]
    pub cleanup: bool,

    /// Report orphan placeholders without consulting the gate or deleting
    #[arg(long)]
    pub dry_run: bool,

    /// Sync this `LOCAL#REMOTE` pair instead of the configured ones
    #[arg(long = "pair", value_name = "LOCAL#REMOTE")]
    pub pairs: Vec<String>,
}

impl FullCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        let config = load_config(config_path)?;
        let pairs = resolve_pairs(&self.pairs, &config.full_sync.paths)?;
        if pairs.is_empty() {
            formatter.warn("No full sync pairs configured (full_sync.paths)");
            return Ok(());
        }
        info!(
            config_path = %config_path.display(),
            pairs = pairs.len(),
            "Starting full sync"
        );

        let services = build_services(&config).await?;
        let cleanup = self.cleanup || config.full_sync.cleanup;
        let sync = FullSync::new(services, &config)
            .with_cleanup(cleanup)
            .with_dry_run(self.dry_run);

        if self.dry_run {
            formatter.info("Dry run mode - orphan placeholders will only be listed");
        }

        let report = sync.run(&pairs).await.context("Full sync aborted")?;
        print_report(format, &report);
        Ok(())
    }
}
