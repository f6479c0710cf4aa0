//! CLI subcommands and the wiring they share

pub mod config;
pub mod full;
pub mod incremental;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use strmsync_cache::{ContentAddressCache, DatabasePool, SqliteStabilityStore};
use strmsync_core::config::Config;
use strmsync_core::domain::PathPair;
use strmsync_remote::{HttpRemoteTree, RateLimitedRemote};
use strmsync_sync::SyncServices;
use strmsync_tree::TreeFactory;

/// Loads the configuration for a sync run
///
/// A missing file means defaults; a file that exists but does not parse or
/// validate is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?
    } else {
        info!(config_path = %path.display(), "Configuration file not found, using defaults");
        Config::default()
    };

    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("Invalid configuration: {}", details.join("; "));
    }
    Ok(config)
}

/// Pairs given with `--pair`, or the configured ones when there are none
pub fn resolve_pairs(overrides: &[String], configured: &[String]) -> Result<Vec<PathPair>> {
    let source = if overrides.is_empty() {
        configured
    } else {
        overrides
    };
    source
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(|p| {
            p.parse::<PathPair>()
                .with_context(|| format!("Invalid path pair '{}'", p))
        })
        .collect()
}

/// Connects every collaborator the orchestrators need
pub async fn build_services(config: &Config) -> Result<SyncServices> {
    let endpoints = HttpRemoteTree::pool_endpoints(&config.remote, &config.rate_limiting)
        .context("Failed to create remote clients")?;
    let remote = RateLimitedRemote::pool_from_config(endpoints, &config.rate_limiting)
        .context("Failed to set up remote endpoint pool")?;

    let trees = TreeFactory::from_config(&config.tree).context("Failed to set up directory trees")?;

    let pool = DatabasePool::from_config(&config.state)
        .await
        .context("Failed to open state database")?;
    let stability = SqliteStabilityStore::new(pool.pool().clone());

    info!(
        remote = %config.remote.base_url,
        endpoints = remote.endpoint_count(),
        tree_backend = trees.backend(),
        database = %config.state.database.display(),
        "Services ready"
    );

    Ok(SyncServices {
        remote: Arc::new(remote),
        cache: Arc::new(ContentAddressCache::from_config(&config.cache)),
        trees,
        stability: Arc::new(stability),
    })
}
