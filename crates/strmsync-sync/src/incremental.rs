//! Incremental sync orchestrator
//!
//! Creates placeholders only for remote files that have none yet, and never
//! deletes anything. Per pair, the remote enumeration fills two trees in
//! lockstep: the would-be local placeholder paths and the remote paths they
//! come from. Line `n` of one tree corresponds to line `n` of the other, so
//! the line numbers of `targets \ local` identify both the placeholder to
//! create and the remote file it stands for.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use strmsync_core::config::{Config, OverwriteMode};
use strmsync_core::domain::{ContentHandle, ItemMetadata, PathPair, RemoteId, RemotePath};
use strmsync_tree::DirectoryTree;

use crate::enumerator::{AddressingMode, EnumerationOptions, EnumerationSummary, Enumerator};
use crate::filter::MediaFilter;
use crate::placeholder::{PlaceholderWriter, WriteOutcome};
use crate::report::{PairOutcome, PairReport, SyncMode, SyncReport};
use crate::{
    blocking, discard_trees, flush_batch, spawn_local_scan, SyncError, SyncServices, TREE_BATCH,
};

/// Creates placeholders for new remote files
#[derive(Debug)]
pub struct IncrementalSync {
    services: SyncServices,
    enumerator: Enumerator,
    filter: MediaFilter,
    writer: PlaceholderWriter,
}

impl IncrementalSync {
    pub fn new(services: SyncServices, config: &Config) -> Self {
        let options =
            EnumerationOptions::from_config(&config.rate_limiting, AddressingMode::PathPrefix);
        Self::with_options(services, config, options)
    }

    /// Like [`IncrementalSync::new`] with explicit enumeration options
    pub fn with_options(services: SyncServices, config: &Config, options: EnumerationOptions) -> Self {
        let enumerator = Enumerator::new(
            Arc::clone(&services.remote),
            Arc::clone(&services.cache),
            options,
        );
        Self {
            enumerator,
            filter: MediaFilter::from_config(&config.media),
            // Existing placeholders are never rewritten
            writer: PlaceholderWriter::from_config(
                &config.placeholder,
                OverwriteMode::Never,
            ),
            services,
        }
    }

    /// Syncs every pair in order
    #[tracing::instrument(skip_all, fields(pairs = pairs.len()))]
    pub async fn run(&self, pairs: &[PathPair]) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let mut report = SyncReport::new(SyncMode::Incremental);

        for pair in pairs {
            let pair_report = self.sync_pair(pair).await?;
            report.pairs.push(pair_report);
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        let totals = report.totals();
        info!(
            created = totals.created,
            skipped = totals.skipped,
            failed = totals.failed,
            duration_ms = report.duration_ms,
            "Incremental sync complete"
        );
        Ok(report)
    }

    async fn sync_pair(&self, pair: &PathPair) -> Result<PairReport, SyncError> {
        if pair.remote.is_root() {
            warn!(pair = %pair, "Incremental sync of the store root is not supported, skipping pair");
            return Ok(PairReport::with_outcome(
                pair.to_string(),
                PairOutcome::Rejected("remote root '/' cannot be synced incrementally".into()),
            ));
        }

        let Some(root_id) = self.enumerator.resolve_dir(&pair.remote).await? else {
            warn!(pair = %pair, "Remote root not found, skipping pair");
            return Ok(PairReport::with_outcome(pair.to_string(), PairOutcome::RootNotFound));
        };
        info!(pair = %pair, root_id = %root_id, "Incremental sync of pair started");

        let scope = pair.scope_key();
        let targets = Arc::new(self.services.trees.create(&format!("inc-{scope}-targets"))?);
        let sources = Arc::new(self.services.trees.create(&format!("inc-{scope}-remote"))?);
        let local = Arc::new(self.services.trees.create(&format!("inc-{scope}-local"))?);
        let trees = vec![Arc::clone(&targets), Arc::clone(&sources), Arc::clone(&local)];

        let scan = spawn_local_scan(
            Arc::clone(&local),
            pair.local.clone(),
            self.writer.extension().to_string(),
        );

        let result = self
            .create_missing(pair, root_id, &targets, &sources, &local, scan)
            .await;
        discard_trees(trees).await;
        result
    }

    async fn create_missing(
        &self,
        pair: &PathPair,
        root_id: RemoteId,
        targets: &Arc<DirectoryTree>,
        sources: &Arc<DirectoryTree>,
        local: &Arc<DirectoryTree>,
        scan: tokio::task::JoinHandle<Result<u64, SyncError>>,
    ) -> Result<PairReport, SyncError> {
        let mut report = PairReport::new(pair.to_string());

        let enumerated = self
            .collect_targets(pair, root_id, targets, sources, &mut report)
            .await;
        let summary = match enumerated {
            Ok(summary) => summary,
            Err(e) => {
                let _ = scan.await;
                warn!(pair = %pair, error = %e, "Incremental sync of pair aborted");
                return Err(e);
            }
        };
        report.enumeration = Some(summary.stats);
        for entry in summary.malformed {
            report.fail(entry.path, entry.reason);
        }
        let local_count = scan.await??;
        debug!(pair = %pair, local_count, "Local mirror scanned");

        let missing = {
            let targets = Arc::clone(targets);
            let sources = Arc::clone(sources);
            let local = Arc::clone(local);
            blocking(move || {
                let lines = targets.compare_lines(&local)?.collect::<Result<Vec<_>, _>>()?;
                let mut missing = Vec::with_capacity(lines.len());
                for line in lines {
                    missing.push((line, targets.get_by_line(line)?, sources.get_by_line(line)?));
                }
                Ok(missing)
            })
            .await?
        };
        info!(pair = %pair, new = missing.len(), "New remote files found");

        for (line, target, source) in missing {
            let (Some(target), Some(source)) = (target, source) else {
                warn!(pair = %pair, line, "Target and source trees are out of step");
                report.fail(format!("line {line}"), "target and source trees disagree");
                continue;
            };
            self.create_one(&target, &source, &mut report).await;
        }

        info!(
            pair = %pair,
            created = report.created,
            unchanged = report.unchanged,
            skipped = report.skipped,
            failed = report.failed,
            "Incremental sync of pair finished"
        );
        Ok(report)
    }

    /// Enumerates the remote subtree into the target and source trees
    async fn collect_targets(
        &self,
        pair: &PathPair,
        root_id: RemoteId,
        targets: &Arc<DirectoryTree>,
        sources: &Arc<DirectoryTree>,
        report: &mut PairReport,
    ) -> Result<EnumerationSummary, SyncError> {
        let mut enumeration = self.enumerator.start(root_id, pair.remote.clone());
        let mut target_batch = Vec::with_capacity(TREE_BATCH);
        let mut source_batch = Vec::with_capacity(TREE_BATCH);
        let mut flush_error = None;

        while let Some(item) = enumeration.next().await {
            if let Err(reason) = self.filter.check(&item, &pair.remote) {
                debug!(path = %item.path, reason = reason.as_str(), "Skipped remote file");
                report.skipped += 1;
                continue;
            }
            let target = self
                .writer
                .target_path(&pair.local, &pair.remote, &item.path)
                .and_then(|t| t.to_str().map(str::to_string));
            let Some(target) = target else {
                report.fail(item.path.as_str(), "no valid local placeholder path");
                continue;
            };
            target_batch.push(target);
            source_batch.push(item.path.as_str().to_string());

            if target_batch.len() >= TREE_BATCH {
                let flushed = match flush_batch(targets, &mut target_batch).await {
                    Ok(()) => flush_batch(sources, &mut source_batch).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = flushed {
                    enumeration.cancel();
                    flush_error = Some(e);
                    break;
                }
            }
        }

        let summary = enumeration.finish().await?;
        if let Some(e) = flush_error {
            return Err(e);
        }
        flush_batch(targets, &mut target_batch).await?;
        flush_batch(sources, &mut source_batch).await?;
        Ok(summary)
    }

    async fn create_one(&self, target: &str, source: &str, report: &mut PairReport) {
        let source_path = match RemotePath::new(source) {
            Ok(path) => path,
            Err(e) => {
                report.fail(source, e.to_string());
                return;
            }
        };

        let metadata = match self.lookup_metadata(&source_path).await {
            Ok(Some(metadata)) => metadata,
            Ok(None) => {
                warn!(path = %source_path, "Remote file vanished before its placeholder was created");
                report.fail(source, "remote metadata not found");
                return;
            }
            Err(e) => {
                warn!(path = %source_path, error = %e, "Failed to look up remote metadata");
                report.fail(source, e.to_string());
                return;
            }
        };

        let handle = match metadata.content_handle.as_deref().map(ContentHandle::new) {
            Some(Ok(handle)) => handle,
            Some(Err(e)) => {
                warn!(path = %source_path, error = %e, "Cannot generate placeholder");
                report.fail(source, e.to_string());
                return;
            }
            None => {
                warn!(path = %source_path, "Remote file has no content handle");
                report.fail(source, "missing content handle");
                return;
            }
        };

        let name = source_path.file_name().unwrap_or_default();
        let content = self.writer.content(&handle, name);
        match self.writer.write(Path::new(target), &content).await {
            Ok(WriteOutcome::Created) => report.created += 1,
            Ok(_) => report.unchanged += 1,
            Err(e) => {
                warn!(path = %target, error = %e, "Failed to write placeholder");
                report.fail(target, e.to_string());
            }
        }
    }

    /// Cached metadata of `path`, relisting its parent once on a miss
    async fn lookup_metadata(&self, path: &RemotePath) -> Result<Option<ItemMetadata>, SyncError> {
        let cache = &self.services.cache;
        if let Some(metadata) = cache.get_metadata_by_path(path) {
            return Ok(Some(metadata));
        }

        let Some(parent) = path.parent() else {
            return Ok(None);
        };
        debug!(path = %path, parent = %parent, "Metadata expired, relisting parent");
        let Some(parent_id) = self.enumerator.resolve_dir(&parent).await? else {
            return Ok(None);
        };
        self.enumerator.refresh_dir(parent_id, &parent).await?;
        Ok(cache.get_metadata_by_path(path))
    }
}
