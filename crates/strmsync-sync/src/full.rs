//! Full sync orchestrator
//!
//! For every configured pair:
//!
//! 1. Resolve the remote root; a missing root skips the pair.
//! 2. Start scanning the local mirror into the local-side tree on a blocking
//!    thread.
//! 3. Enumerate the remote subtree in ancestor-aware mode, write one
//!    placeholder per qualifying file and record its local path in the
//!    remote-side tree.
//! 4. Join the scan, then (when cleanup is enabled) diff local minus remote
//!    and pass the orphans through the [`DeletionGate`].
//!
//! Enumeration failures abort the run. Per-item failures, malformed remote
//! entries included, are collected in the [`PairReport`] and disable cleanup
//! for that pair.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use strmsync_core::config::{Config, FullSyncConfig};
use strmsync_core::domain::{ContentHandle, PathPair, RemoteId, RemoteItem};
use strmsync_tree::DirectoryTree;

use crate::cleanup::Cleaner;
use crate::enumerator::{AddressingMode, EnumerationOptions, Enumerator};
use crate::filter::MediaFilter;
use crate::gate::DeletionGate;
use crate::placeholder::{PlaceholderWriter, WriteOutcome};
use crate::report::{CleanupSkip, DeletionReport, PairOutcome, PairReport, SyncMode, SyncReport};
use crate::{
    blocking, discard_trees, flush_batch, spawn_local_scan, SyncError, SyncServices, TREE_BATCH,
};

/// Candidate paths kept in a [`DeletionReport`]
const DELETION_SAMPLE: usize = 20;

/// Rebuilds the placeholder mirror and optionally removes orphans
#[derive(Debug)]
pub struct FullSync {
    services: SyncServices,
    enumerator: Enumerator,
    filter: MediaFilter,
    writer: PlaceholderWriter,
    gate: DeletionGate,
    config: FullSyncConfig,
    cleanup: bool,
    dry_run: bool,
}

impl FullSync {
    pub fn new(services: SyncServices, config: &Config) -> Self {
        let options =
            EnumerationOptions::from_config(&config.rate_limiting, AddressingMode::AncestorAware);
        Self::with_options(services, config, options)
    }

    /// Like [`FullSync::new`] with explicit enumeration options
    pub fn with_options(services: SyncServices, config: &Config, options: EnumerationOptions) -> Self {
        let enumerator = Enumerator::new(
            Arc::clone(&services.remote),
            Arc::clone(&services.cache),
            options,
        );
        let gate = DeletionGate::new(
            Arc::clone(&services.stability),
            config.full_sync.max_deletion_percent,
            config.full_sync.stable_cv_percent,
        );
        Self {
            enumerator,
            filter: MediaFilter::from_config(&config.media),
            writer: PlaceholderWriter::from_config(
                &config.placeholder,
                config.full_sync.overwrite_mode,
            ),
            gate,
            cleanup: config.full_sync.cleanup,
            config: config.full_sync.clone(),
            dry_run: false,
            services,
        }
    }

    /// Overrides `full_sync.cleanup`
    pub fn with_cleanup(mut self, enabled: bool) -> Self {
        self.cleanup = enabled;
        self
    }

    /// Report orphan candidates without consulting the gate or deleting
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Syncs every pair in order
    ///
    /// Returns an error only when a run-level failure (enumeration, tree
    /// backend, state store) aborts the run; placeholders already written
    /// stay in place.
    #[tracing::instrument(skip_all, fields(pairs = pairs.len(), cleanup = self.cleanup, dry_run = self.dry_run))]
    pub async fn run(&self, pairs: &[PathPair]) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let mut report = SyncReport::new(SyncMode::Full);

        for pair in pairs {
            let pair_report = self.sync_pair(pair).await?;
            report.pairs.push(pair_report);
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        let totals = report.totals();
        info!(
            created = totals.created,
            updated = totals.updated,
            unchanged = totals.unchanged,
            skipped = totals.skipped,
            failed = totals.failed,
            deletion_candidates = totals.deletion_candidates,
            deleted = totals.deleted,
            duration_ms = report.duration_ms,
            "Full sync complete"
        );
        Ok(report)
    }

    async fn sync_pair(&self, pair: &PathPair) -> Result<PairReport, SyncError> {
        let Some(root_id) = self.enumerator.resolve_dir(&pair.remote).await? else {
            warn!(pair = %pair, "Remote root not found, skipping pair");
            return Ok(PairReport::with_outcome(pair.to_string(), PairOutcome::RootNotFound));
        };
        info!(pair = %pair, root_id = %root_id, "Full sync of pair started");

        let scope = pair.scope_key();
        let remote_tree = Arc::new(self.services.trees.create(&format!("full-{scope}-remote"))?);
        let local_tree = Arc::new(self.services.trees.create(&format!("full-{scope}-local"))?);
        let trees = vec![Arc::clone(&remote_tree), Arc::clone(&local_tree)];

        let scan = spawn_local_scan(
            Arc::clone(&local_tree),
            pair.local.clone(),
            self.writer.extension().to_string(),
        );

        let result = self
            .mirror_and_clean(pair, root_id, &remote_tree, &local_tree, scan)
            .await;
        discard_trees(trees).await;
        result
    }

    async fn mirror_and_clean(
        &self,
        pair: &PathPair,
        root_id: RemoteId,
        remote_tree: &Arc<DirectoryTree>,
        local_tree: &Arc<DirectoryTree>,
        scan: tokio::task::JoinHandle<Result<u64, SyncError>>,
    ) -> Result<PairReport, SyncError> {
        let mut report = PairReport::new(pair.to_string());
        let mut enumeration = self.enumerator.start(root_id, pair.remote.clone());
        let mut batch = Vec::with_capacity(TREE_BATCH);
        let mut flush_error = None;

        while let Some(item) = enumeration.next().await {
            if let Some(target) = self.mirror_item(pair, &item, &mut report).await {
                batch.push(target);
            }
            if batch.len() >= TREE_BATCH {
                if let Err(e) = flush_batch(remote_tree, &mut batch).await {
                    enumeration.cancel();
                    flush_error = Some(e);
                    break;
                }
            }
        }

        let enumerated = enumeration.finish().await;
        let flushed = match flush_error {
            Some(e) => Err(e),
            None => flush_batch(remote_tree, &mut batch).await,
        };
        let summary = match enumerated.and_then(|summary| flushed.map(|()| summary)) {
            Ok(summary) => summary,
            Err(e) => {
                // The scan must not outlive its tree
                let _ = scan.await;
                warn!(pair = %pair, error = %e, "Full sync of pair aborted");
                return Err(e);
            }
        };
        report.enumeration = Some(summary.stats);
        // A dropped directory entry hides its whole subtree from the diff
        for entry in summary.malformed {
            report.fail(entry.path, entry.reason);
        }

        let local_count = scan.await??;
        debug!(pair = %pair, local_count, "Local mirror scanned");

        if !self.cleanup {
            report.cleanup_skipped = Some(CleanupSkip::Disabled);
        } else if report.failed > 0 {
            warn!(pair = %pair, failed = report.failed, "Placeholder generation failed, skipping cleanup");
            report.cleanup_skipped = Some(CleanupSkip::GenerationFailures);
        } else if local_count == 0 {
            info!(pair = %pair, "Local mirror is empty, nothing to clean up");
            report.cleanup_skipped = Some(CleanupSkip::EmptyLocalTree);
        } else {
            let deletion = self
                .clean_orphans(pair, local_tree, remote_tree, local_count, &mut report)
                .await?;
            report.deletion = Some(deletion);
        }

        info!(
            pair = %pair,
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            skipped = report.skipped,
            failed = report.failed,
            "Full sync of pair finished"
        );
        Ok(report)
    }

    /// Writes the placeholder for one enumerated item
    ///
    /// Returns the local path to record in the remote-side tree.
    async fn mirror_item(
        &self,
        pair: &PathPair,
        item: &RemoteItem,
        report: &mut PairReport,
    ) -> Option<String> {
        if let Err(reason) = self.filter.check(item, &pair.remote) {
            debug!(path = %item.path, reason = reason.as_str(), "Skipped remote file");
            report.skipped += 1;
            return None;
        }
        let Some(target) = self
            .writer
            .target_path(&pair.local, &pair.remote, &item.path)
        else {
            report.skipped += 1;
            return None;
        };
        let Some(target_str) = target.to_str().map(str::to_string) else {
            report.fail(item.path.as_str(), "local path is not valid UTF-8");
            return None;
        };

        let handle = match item.content_handle().map(ContentHandle::new) {
            Some(Ok(handle)) => handle,
            Some(Err(e)) => {
                warn!(path = %item.path, error = %e, "Cannot generate placeholder");
                report.fail(item.path.as_str(), e.to_string());
                return None;
            }
            None => {
                warn!(path = %item.path, "Remote file has no content handle");
                report.fail(item.path.as_str(), "missing content handle");
                return None;
            }
        };

        let content = self.writer.content(&handle, &item.name);
        match self.writer.write(&target, &content).await {
            Ok(WriteOutcome::Created) => report.created += 1,
            Ok(WriteOutcome::Updated) => report.updated += 1,
            Ok(WriteOutcome::Unchanged | WriteOutcome::Exists) => report.unchanged += 1,
            Err(e) => {
                warn!(path = %target.display(), error = %e, "Failed to write placeholder");
                report.fail(target_str, e.to_string());
                return None;
            }
        }
        Some(target_str)
    }

    async fn clean_orphans(
        &self,
        pair: &PathPair,
        local_tree: &Arc<DirectoryTree>,
        remote_tree: &Arc<DirectoryTree>,
        corpus: u64,
        report: &mut PairReport,
    ) -> Result<DeletionReport, SyncError> {
        let candidates = {
            let local = Arc::clone(local_tree);
            let remote = Arc::clone(remote_tree);
            blocking(move || {
                let orphans = local.compare(&remote)?.collect::<Result<Vec<_>, _>>()?;
                Ok(orphans)
            })
            .await?
        };

        let mut deletion = DeletionReport {
            candidates: candidates.len() as u64,
            corpus,
            decision: None,
            removed: 0,
            related_removed: 0,
            dirs_removed: 0,
            failed: 0,
            sample: candidates.iter().take(DELETION_SAMPLE).cloned().collect(),
        };
        info!(pair = %pair, candidates = deletion.candidates, corpus, "Orphan placeholders found");

        if self.dry_run {
            return Ok(deletion);
        }

        let decision = self
            .gate
            .evaluate(&pair.scope_key(), deletion.candidates, corpus)
            .await?;
        let approved = decision.is_approved();
        deletion.decision = Some(decision);
        if !approved || candidates.is_empty() {
            return Ok(deletion);
        }

        let cleaner = Cleaner::from_config(&pair.local, self.writer.extension(), &self.config);
        for candidate in &candidates {
            match cleaner.remove_orphan(Path::new(candidate)).await {
                Ok(outcome) => {
                    deletion.removed += u64::from(outcome.removed);
                    deletion.related_removed += outcome.related_removed;
                    deletion.dirs_removed += outcome.dirs_removed;
                }
                Err(e) => {
                    warn!(path = %candidate, error = %e, "Failed to remove orphan placeholder");
                    deletion.failed += 1;
                    report.fail(candidate.as_str(), e.to_string());
                }
            }
        }
        Ok(deletion)
    }
}
