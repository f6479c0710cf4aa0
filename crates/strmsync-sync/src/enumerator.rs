//! Remote tree enumerator
//!
//! Walks a remote subtree breadth-first. Directory listing is a paginated
//! job queue: each job is `(directory, path, offset)`. A driver task keeps at
//! most `max_workers` jobs in flight; each job lists one page, emits the
//! files on it, enqueues every subdirectory at offset 0 and, when the page
//! did not exhaust the directory, a continuation job at the next offset.
//!
//! The first failing job cancels the run: queued jobs are dropped, jobs
//! already in flight finish on their own, and the error is returned from
//! [`Enumeration::finish`].
//!
//! Entries that cannot become an item are not fatal. They are returned from
//! [`Enumeration::finish`] so the caller knows the listing was incomplete.
//!
//! ## Addressing modes
//!
//! - [`AddressingMode::AncestorAware`] asks for the ancestor chain with every
//!   page and takes the directory path from it; ancestors are cached.
//! - [`AddressingMode::PathPrefix`] builds paths from the traversal itself.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashSet;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use strmsync_cache::ContentAddressCache;
use strmsync_core::config::RateLimitingConfig;
use strmsync_core::domain::{escape_name, RemoteId, RemoteItem, RemotePath};
use strmsync_core::ports::{IRemoteTree, ListOptions, ListPage};
use strmsync_remote::RemoteError;

use crate::SyncError;

/// How directory paths are reconstructed during enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    AncestorAware,
    PathPrefix,
}

/// Tuning knobs for one enumeration
#[derive(Debug, Clone)]
pub struct EnumerationOptions {
    /// Maximum listing jobs in flight
    pub max_workers: usize,
    /// Children requested per listing call
    pub page_size: u32,
    pub mode: AddressingMode,
    /// Sort order and suffix filter passed to the remote
    pub list: ListOptions,
    /// Items buffered between the workers and the consumer
    pub channel_capacity: usize,
}

impl Default for EnumerationOptions {
    fn default() -> Self {
        Self {
            max_workers: 4,
            page_size: 1150,
            mode: AddressingMode::PathPrefix,
            list: ListOptions::default(),
            channel_capacity: 1024,
        }
    }
}

impl EnumerationOptions {
    /// Options from the `rate_limiting` section
    pub fn from_config(config: &RateLimitingConfig, mode: AddressingMode) -> Self {
        Self {
            max_workers: config.max_workers.max(1),
            page_size: config.page_size.max(1),
            mode,
            ..Self::default()
        }
    }
}

/// What an enumeration saw
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnumerationStats {
    pub directories: u64,
    pub files: u64,
    pub pages: u64,
    /// Entries dropped because their record was unusable
    pub malformed: u64,
}

/// A listed entry that could not be turned into an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedEntry {
    /// Parent directory and raw name as listed
    pub path: String,
    pub reason: String,
}

/// Result of a traversal that ran to the end
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumerationSummary {
    pub stats: EnumerationStats,
    /// Entries dropped from the traversal, with their subtrees
    pub malformed: Vec<MalformedEntry>,
}

impl EnumerationSummary {
    /// True when every listed entry was usable
    pub fn is_complete(&self) -> bool {
        self.malformed.is_empty()
    }
}

#[derive(Debug, Default)]
struct Counters {
    directories: AtomicU64,
    files: AtomicU64,
    pages: AtomicU64,
    malformed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> EnumerationStats {
        EnumerationStats {
            directories: self.directories.load(Ordering::Relaxed),
            files: self.files.load(Ordering::Relaxed),
            pages: self.pages.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
struct Job {
    dir_id: RemoteId,
    path: Option<RemotePath>,
    offset: u64,
}

struct RunContext {
    remote: Arc<dyn IRemoteTree>,
    cache: Arc<ContentAddressCache>,
    options: EnumerationOptions,
    tx: mpsc::Sender<RemoteItem>,
    cancel: CancellationToken,
    visited: DashSet<RemoteId>,
    counters: Counters,
    malformed: Mutex<Vec<MalformedEntry>>,
}

impl RunContext {
    fn record_malformed(&self, entry: MalformedEntry) {
        self.counters.malformed.fetch_add(1, Ordering::Relaxed);
        self.malformed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
    }
}

/// Starts enumerations against one remote
pub struct Enumerator {
    remote: Arc<dyn IRemoteTree>,
    cache: Arc<ContentAddressCache>,
    options: EnumerationOptions,
}

impl std::fmt::Debug for Enumerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enumerator")
            .field("options", &self.options)
            .finish()
    }
}

impl Enumerator {
    pub fn new(
        remote: Arc<dyn IRemoteTree>,
        cache: Arc<ContentAddressCache>,
        options: EnumerationOptions,
    ) -> Self {
        Self {
            remote,
            cache,
            options,
        }
    }

    pub fn options(&self) -> &EnumerationOptions {
        &self.options
    }

    /// Resolves a directory path, consulting the cache before the remote
    ///
    /// The store root maps to [`RemoteId::ROOT`] without a lookup. Returns
    /// `Ok(None)` when the directory does not exist.
    pub async fn resolve_dir(&self, path: &RemotePath) -> Result<Option<RemoteId>, SyncError> {
        if path.is_root() {
            return Ok(Some(RemoteId::ROOT));
        }
        if let Some(id) = self.cache.get_id(path) {
            debug!(path = %path, id = %id, "Directory id from cache");
            return Ok(Some(id));
        }

        match self.remote.resolve_path_to_id(path).await {
            Ok(Some(id)) => {
                self.cache.put(id, path.clone(), None);
                Ok(Some(id))
            }
            Ok(None) => Ok(None),
            Err(e) if RemoteError::is_not_found(&e) => Ok(None),
            Err(e) => Err(SyncError::Remote(e)),
        }
    }

    /// Lists every page of one directory into the cache
    ///
    /// Used to repopulate metadata that expired after enumeration. Returns
    /// the number of children cached.
    pub async fn refresh_dir(&self, dir_id: RemoteId, dir_path: &RemotePath) -> Result<u64, SyncError> {
        let mut offset = 0u64;
        let mut cached = 0u64;
        loop {
            let page = self
                .remote
                .list_children(dir_id, offset, self.options.page_size, &self.options.list)
                .await
                .map_err(SyncError::Remote)?;
            let listed = page.entries.len() as u64;
            for entry in page.entries {
                match entry.into_item(dir_path) {
                    Ok(item) => {
                        self.cache.put(item.id, item.path.clone(), Some(item.metadata()));
                        cached += 1;
                    }
                    Err(e) => warn!(dir = %dir_path, error = %e, "Skipping malformed remote entry"),
                }
            }
            offset += listed;
            if listed == 0 || offset >= page.total {
                break;
            }
        }
        debug!(dir = %dir_path, cached, "Refreshed directory listing");
        Ok(cached)
    }

    /// Starts enumerating the subtree below `root_id`
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, root_id: RemoteId, root_path: RemotePath) -> Enumeration {
        let (tx, rx) = mpsc::channel(self.options.channel_capacity.max(1));
        let cancel = CancellationToken::new();
        let ctx = Arc::new(RunContext {
            remote: Arc::clone(&self.remote),
            cache: Arc::clone(&self.cache),
            options: self.options.clone(),
            tx,
            cancel: cancel.clone(),
            visited: DashSet::new(),
            counters: Counters::default(),
            malformed: Mutex::new(Vec::new()),
        });

        info!(
            root = %root_path,
            id = %root_id,
            mode = ?self.options.mode,
            max_workers = self.options.max_workers,
            "Starting remote enumeration"
        );

        ctx.visited.insert(root_id);
        let seed = Job {
            dir_id: root_id,
            path: Some(root_path),
            offset: 0,
        };
        let driver = tokio::spawn(drive(ctx, seed));

        Enumeration { rx, cancel, driver }
    }
}

/// A running enumeration: a finite, unordered stream of file items
pub struct Enumeration {
    rx: mpsc::Receiver<RemoteItem>,
    cancel: CancellationToken,
    driver: JoinHandle<Result<EnumerationSummary, SyncError>>,
}

impl Enumeration {
    /// Next file item; `None` once the traversal has ended
    pub async fn next(&mut self) -> Option<RemoteItem> {
        self.rx.recv().await
    }

    /// Stops scheduling new jobs
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the traversal to end and returns its statistics and the
    /// entries it had to drop, or the error that stopped it
    pub async fn finish(mut self) -> Result<EnumerationSummary, SyncError> {
        self.rx.close();
        self.driver.await?
    }
}

async fn drive(ctx: Arc<RunContext>, seed: Job) -> Result<EnumerationSummary, SyncError> {
    let max_workers = ctx.options.max_workers.max(1);
    let mut queue = VecDeque::from([seed]);
    let mut workers = JoinSet::new();
    let mut first_error: Option<SyncError> = None;

    loop {
        if first_error.is_none() && !ctx.cancel.is_cancelled() {
            while workers.len() < max_workers {
                let Some(job) = queue.pop_front() else { break };
                let ctx = Arc::clone(&ctx);
                workers.spawn(async move { process_page(&ctx, job).await });
            }
        }

        let Some(joined) = workers.join_next().await else {
            break;
        };
        let outcome = joined.map_err(SyncError::from).and_then(|result| result);
        match outcome {
            Ok(follow_ups) => {
                if first_error.is_none() {
                    queue.extend(follow_ups);
                }
            }
            Err(e) => {
                if first_error.is_none() {
                    warn!(error = %e, dropped = queue.len(), "Enumeration job failed, cancelling");
                    ctx.cancel.cancel();
                    queue.clear();
                    first_error = Some(e);
                } else {
                    debug!(error = %e, "Further enumeration failure after cancel");
                }
            }
        }
    }

    let stats = ctx.counters.snapshot();
    match first_error {
        Some(e) => Err(e),
        None => {
            info!(
                directories = stats.directories,
                files = stats.files,
                pages = stats.pages,
                malformed = stats.malformed,
                "Remote enumeration complete"
            );
            let malformed = std::mem::take(
                &mut *ctx.malformed.lock().unwrap_or_else(|e| e.into_inner()),
            );
            Ok(EnumerationSummary { stats, malformed })
        }
    }
}

async fn list_page(ctx: &RunContext, job: &Job) -> anyhow::Result<ListPage> {
    let options = &ctx.options;
    match options.mode {
        AddressingMode::AncestorAware => {
            ctx.remote
                .list_children_with_ancestors(job.dir_id, job.offset, options.page_size, &options.list)
                .await
        }
        AddressingMode::PathPrefix => {
            ctx.remote
                .list_children(job.dir_id, job.offset, options.page_size, &options.list)
                .await
        }
    }
}

/// Records every ancestor of the listed directory in the cache
fn cache_ancestors(ctx: &RunContext, page: &ListPage) {
    let Some(ancestors) = page.ancestors.as_ref() else {
        return;
    };
    let mut path = RemotePath::root();
    for (depth, ancestor) in ancestors.iter().enumerate() {
        if depth > 0 {
            match path.join(&escape_name(&ancestor.name)) {
                Ok(next) => path = next,
                Err(_) => return,
            }
        }
        if ctx.cache.get_path(ancestor.id).as_ref() != Some(&path) {
            ctx.cache.put(ancestor.id, path.clone(), None);
        }
    }
}

async fn process_page(ctx: &RunContext, job: Job) -> Result<Vec<Job>, SyncError> {
    if ctx.cancel.is_cancelled() {
        return Ok(Vec::new());
    }

    let page = list_page(ctx, &job).await.map_err(SyncError::Remote)?;
    ctx.counters.pages.fetch_add(1, Ordering::Relaxed);

    let dir_path = match ctx.options.mode {
        AddressingMode::AncestorAware => {
            cache_ancestors(ctx, &page);
            let from_chain = page.ancestor_path();
            if let (Some(chain), Some(walked)) = (&from_chain, &job.path) {
                if chain != walked {
                    debug!(chain = %chain, walked = %walked, "Ancestor chain differs from traversal path");
                }
            }
            from_chain.or(job.path)
        }
        AddressingMode::PathPrefix => job.path,
    }
    .ok_or(SyncError::UnknownDirectoryPath(job.dir_id))?;

    let listed = page.entries.len() as u64;
    let mut follow_ups = Vec::new();

    for entry in page.entries {
        let raw_path = format!("{}{}", dir_path.as_dir_entry(), entry.name);
        let item = match entry.into_item(&dir_path) {
            Ok(item) => item,
            Err(e) => {
                warn!(dir = %dir_path, error = %e, "Skipping malformed remote entry");
                ctx.record_malformed(MalformedEntry {
                    path: raw_path,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        ctx.cache
            .put(item.id, item.path.clone(), Some(item.metadata()));

        if item.is_dir() {
            ctx.counters.directories.fetch_add(1, Ordering::Relaxed);
            if ctx.visited.insert(item.id) {
                follow_ups.push(Job {
                    dir_id: item.id,
                    path: Some(item.path),
                    offset: 0,
                });
            } else {
                warn!(id = %item.id, path = %item.path, "Directory listed twice, not descending again");
            }
            continue;
        }

        ctx.counters.files.fetch_add(1, Ordering::Relaxed);
        tokio::select! {
            sent = ctx.tx.send(item) => {
                if sent.is_err() {
                    // Consumer went away
                    ctx.cancel.cancel();
                    return Ok(Vec::new());
                }
            }
            _ = ctx.cancel.cancelled() => return Ok(Vec::new()),
        }
    }

    let next_offset = job.offset + listed;
    if listed > 0 && next_offset < page.total {
        follow_ups.push(Job {
            dir_id: job.dir_id,
            path: Some(dir_path),
            offset: next_offset,
        });
    } else if listed == 0 && job.offset < page.total {
        warn!(
            dir = %dir_path,
            offset = job.offset,
            total = page.total,
            "Listing ended before the declared total"
        );
    }

    Ok(follow_ups)
}
