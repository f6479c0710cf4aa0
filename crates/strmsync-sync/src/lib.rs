//! strmsync Sync - Mirroring of a remote tree into placeholder files
//!
//! Provides:
//! - Concurrent, rate-limited enumeration of remote subtrees
//! - Media filtering and placeholder generation
//! - Full sync with statistically gated orphan cleanup
//! - Incremental sync that only creates what is new
//!
//! ## Modules
//!
//! - [`enumerator`] - Job-queue traversal over a bounded worker pool
//! - [`filter`] - Which remote files deserve a placeholder
//! - [`placeholder`] - Placeholder paths, content and atomic writes
//! - [`gate`] - Deletion safety gate
//! - [`cleanup`] - Removal of orphan placeholders and empty directories
//! - [`full`] - Full sync orchestrator
//! - [`incremental`] - Incremental sync orchestrator
//! - [`report`] - Run summaries

pub mod cleanup;
pub mod enumerator;
pub mod filter;
pub mod full;
pub mod gate;
pub mod incremental;
pub mod placeholder;
pub mod report;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;

use strmsync_cache::ContentAddressCache;
use strmsync_core::domain::{DomainError, RemoteId};
use strmsync_core::ports::{IRemoteTree, IStabilityStore};
use strmsync_tree::{scan_directory, DirectoryTree, TreeError, TreeFactory};

pub use enumerator::{
    AddressingMode, Enumeration, EnumerationOptions, EnumerationStats, EnumerationSummary,
    Enumerator, MalformedEntry,
};
pub use filter::{MediaFilter, SkipReason};
pub use full::FullSync;
pub use gate::{DeletionGate, GateDecision};
pub use incremental::IncrementalSync;
pub use placeholder::{PlaceholderWriter, WriteOutcome};
pub use report::{PairOutcome, PairReport, SyncMode, SyncReport};

/// Errors that abort a sync run or a single pair
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error occurred during file operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A domain-level error propagated from strmsync-core
    #[error("Domain error: {0}")]
    DomainError(#[from] DomainError),

    /// The remote store failed after retries
    #[error("Remote error: {0:#}")]
    Remote(anyhow::Error),

    /// A directory tree backend failed
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    /// The stability record store failed
    #[error("State error: {0:#}")]
    State(anyhow::Error),

    /// A listing page arrived without any way to know its directory's path
    #[error("Cannot determine the path of directory {0}")]
    UnknownDirectoryPath(RemoteId),

    /// A background task panicked or was aborted
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(e: tokio::task::JoinError) -> Self {
        SyncError::TaskFailed(e.to_string())
    }
}

/// Shared collaborators of both orchestrators
///
/// One instance per service; the cache and the remote's rate limiter are
/// shared by every run started from it.
#[derive(Clone)]
pub struct SyncServices {
    pub remote: Arc<dyn IRemoteTree>,
    pub cache: Arc<ContentAddressCache>,
    pub trees: TreeFactory,
    pub stability: Arc<dyn IStabilityStore>,
}

impl std::fmt::Debug for SyncServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncServices")
            .field("cache", &self.cache)
            .field("trees", &self.trees.backend())
            .finish()
    }
}

// ============================================================================
// Tree plumbing shared by both orchestrators
// ============================================================================

/// Entries buffered before a tree append
pub(crate) const TREE_BATCH: usize = 5000;

/// Runs blocking tree work off the async workers
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, SyncError>
where
    F: FnOnce() -> Result<T, SyncError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

/// Scans `root` for placeholders into `tree` on a blocking thread
///
/// The handle is the join point before the tree may be compared.
pub(crate) fn spawn_local_scan(
    tree: Arc<DirectoryTree>,
    root: PathBuf,
    extension: String,
) -> JoinHandle<Result<u64, SyncError>> {
    tokio::task::spawn_blocking(move || {
        let count = tree.add_paths(scan_directory(&root, Some(extension.as_str())), false)?;
        tracing::debug!(root = %root.display(), count, "Local scan complete");
        Ok(count)
    })
}

/// Appends and empties `batch`
pub(crate) async fn flush_batch(
    tree: &Arc<DirectoryTree>,
    batch: &mut Vec<String>,
) -> Result<(), SyncError> {
    if batch.is_empty() {
        return Ok(());
    }
    let tree = Arc::clone(tree);
    let entries = std::mem::take(batch);
    blocking(move || {
        tree.add_paths(entries, true)?;
        Ok(())
    })
    .await
}

/// Clears per-run trees; failures are only logged
pub(crate) async fn discard_trees(trees: Vec<Arc<DirectoryTree>>) {
    let result = blocking(move || {
        for tree in &trees {
            if let Err(e) = tree.clear() {
                tracing::warn!(tree = tree.name(), error = %e, "Failed to discard directory tree");
            }
        }
        Ok(())
    })
    .await;
    if let Err(e) = result {
        tracing::warn!(error = %e, "Failed to discard directory trees");
    }
}
