//! Shared fixtures for the sync integration tests
//!
//! [`FakeRemote`] is an in-memory remote store with real pagination and
//! ancestor chains; [`services`] wires it to an isolated cache, in-memory
//! trees and an in-memory stability store.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use strmsync_cache::{ContentAddressCache, DatabasePool, SqliteStabilityStore};
use strmsync_core::config::{Config, ConfigBuilder, OverwriteMode};
use strmsync_core::domain::{Ancestor, ItemKind, PathPair, RemoteEntry, RemoteId, RemotePath};
use strmsync_core::ports::{IRemoteTree, ListOptions, ListPage};
use strmsync_sync::SyncServices;
use strmsync_tree::{MemoryStore, TreeFactory};

// ============================================================================
// FakeRemote
// ============================================================================

#[derive(Debug, Clone)]
struct Node {
    parent: u64,
    name: String,
    is_dir: bool,
    size: u64,
    handle: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    nodes: HashMap<u64, Node>,
    /// Children by parent id, sorted by name
    children: HashMap<u64, BTreeMap<String, u64>>,
    failing: HashSet<u64>,
    /// Directory ids whose pages also list this extra entry
    duplicate_children: HashMap<u64, u64>,
}

/// In-memory [`IRemoteTree`]
#[derive(Debug)]
pub struct FakeRemote {
    state: Mutex<State>,
    list_calls: AtomicU64,
}

/// A well-formed content handle derived from `n`
pub fn handle(n: u64) -> String {
    format!("h{n:016}")
}

impl Default for FakeRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRemote {
    pub fn new() -> Self {
        let mut state = State {
            next_id: 1,
            ..State::default()
        };
        state.nodes.insert(
            0,
            Node {
                parent: 0,
                name: String::new(),
                is_dir: true,
                size: 0,
                handle: None,
            },
        );
        Self {
            state: Mutex::new(state),
            list_calls: AtomicU64::new(0),
        }
    }

    fn lookup(state: &State, path: &str) -> Option<u64> {
        let mut id = 0;
        for name in path.split('/').filter(|c| !c.is_empty()) {
            id = *state.children.get(&id)?.get(name)?;
        }
        Some(id)
    }

    fn insert(state: &mut State, parent: u64, node: Node) -> u64 {
        let id = state.next_id;
        state.next_id += 1;
        state
            .children
            .entry(parent)
            .or_default()
            .insert(node.name.clone(), id);
        state.nodes.insert(id, node);
        id
    }

    fn ensure_dir(state: &mut State, path: &str) -> u64 {
        let mut id = 0;
        for name in path.split('/').filter(|c| !c.is_empty()) {
            id = match state.children.get(&id).and_then(|c| c.get(name)) {
                Some(&child) => child,
                None => Self::insert(
                    state,
                    id,
                    Node {
                        parent: id,
                        name: name.to_string(),
                        is_dir: true,
                        size: 0,
                        handle: None,
                    },
                ),
            };
        }
        id
    }

    /// Adds a directory and any missing parents
    pub fn add_dir(&self, path: &str) -> RemoteId {
        let mut state = self.state.lock().unwrap();
        RemoteId::new(Self::ensure_dir(&mut state, path))
    }

    /// Adds a file with an explicit (possibly malformed) handle
    pub fn add_file_with_handle(&self, path: &str, size: u64, handle: Option<&str>) -> RemoteId {
        let (dir, name) = path.rsplit_once('/').unwrap();
        let mut state = self.state.lock().unwrap();
        let parent = Self::ensure_dir(&mut state, dir);
        RemoteId::new(Self::insert(
            &mut state,
            parent,
            Node {
                parent,
                name: name.to_string(),
                is_dir: false,
                size,
                handle: handle.map(str::to_string),
            },
        ))
    }

    /// Adds a file whose handle is derived from its id
    pub fn add_file(&self, path: &str, size: u64) -> (RemoteId, String) {
        let id = self.add_file_with_handle(path, size, None);
        let handle = handle(id.get());
        self.state
            .lock()
            .unwrap()
            .nodes
            .get_mut(&id.get())
            .unwrap()
            .handle = Some(handle.clone());
        (id, handle)
    }

    /// Removes a node and its subtree from the listing
    pub fn remove(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        let id = Self::lookup(&state, path).unwrap();
        let node = state.nodes.remove(&id).unwrap();
        if let Some(siblings) = state.children.get_mut(&node.parent) {
            siblings.remove(&node.name);
        }
    }

    /// Changes the name listings report for `path`; lookups keep the old one
    pub fn set_listed_name(&self, path: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        let id = Self::lookup(&state, path).unwrap();
        state.nodes.get_mut(&id).unwrap().name = name.to_string();
    }

    /// Makes every listing of `path` fail
    pub fn fail_listing_of(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        let id = Self::lookup(&state, path).unwrap();
        state.failing.insert(id);
    }

    /// Makes listings of `dir` also return directory `child`
    pub fn alias_child(&self, dir: &str, child: &str) {
        let mut state = self.state.lock().unwrap();
        let dir = Self::lookup(&state, dir).unwrap();
        let child = Self::lookup(&state, child).unwrap();
        state.duplicate_children.insert(dir, child);
    }

    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn entry(id: u64, node: &Node) -> RemoteEntry {
        let kind = if node.is_dir {
            ItemKind::Directory
        } else {
            ItemKind::File {
                size: node.size,
                content_handle: node.handle.clone(),
            }
        };
        RemoteEntry {
            id: RemoteId::new(id),
            parent_id: RemoteId::new(node.parent),
            name: node.name.clone(),
            modify_time: 1_700_000_000,
            kind,
        }
    }

    fn page(&self, id: RemoteId, offset: u64, page_size: u32, ancestors: bool) -> Result<ListPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        let dir = id.get();
        if state.failing.contains(&dir) {
            return Err(anyhow!("listing of {dir} exploded"));
        }
        if !state.nodes.get(&dir).is_some_and(|n| n.is_dir) {
            return Err(anyhow!("{dir} is not a directory"));
        }

        let mut ids: Vec<u64> = state
            .children
            .get(&dir)
            .map(|c| c.values().copied().collect())
            .unwrap_or_default();
        if let Some(&extra) = state.duplicate_children.get(&dir) {
            ids.push(extra);
        }
        let total = ids.len() as u64;
        let entries = ids
            .into_iter()
            .skip(offset as usize)
            .take(page_size as usize)
            .map(|child| Self::entry(child, &state.nodes[&child]))
            .collect();

        let ancestors = ancestors.then(|| {
            let mut chain = Vec::new();
            let mut current = dir;
            loop {
                let node = &state.nodes[&current];
                chain.push(Ancestor {
                    id: RemoteId::new(current),
                    parent_id: RemoteId::new(node.parent),
                    name: node.name.clone(),
                });
                if current == 0 {
                    break;
                }
                current = node.parent;
            }
            chain.reverse();
            chain
        });

        Ok(ListPage {
            entries,
            total,
            ancestors,
        })
    }
}

#[async_trait]
impl IRemoteTree for FakeRemote {
    async fn resolve_path_to_id(&self, path: &RemotePath) -> Result<Option<RemoteId>> {
        let state = self.state.lock().unwrap();
        Ok(Self::lookup(&state, path.as_str())
            .filter(|id| state.nodes[id].is_dir)
            .map(RemoteId::new))
    }

    async fn list_children(
        &self,
        id: RemoteId,
        offset: u64,
        page_size: u32,
        _options: &ListOptions,
    ) -> Result<ListPage> {
        // Yield so concurrent workers interleave
        tokio::task::yield_now().await;
        self.page(id, offset, page_size, false)
    }

    async fn list_children_with_ancestors(
        &self,
        id: RemoteId,
        offset: u64,
        page_size: u32,
        _options: &ListOptions,
    ) -> Result<ListPage> {
        tokio::task::yield_now().await;
        self.page(id, offset, page_size, true)
    }

    async fn get_item_metadata(&self, id: RemoteId) -> Result<RemoteEntry> {
        let state = self.state.lock().unwrap();
        state
            .nodes
            .get(&id.get())
            .map(|node| Self::entry(id.get(), node))
            .ok_or_else(|| anyhow!("item {id} not found"))
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// Services over `remote` with isolated cache, trees and state
pub async fn services(remote: Arc<FakeRemote>) -> SyncServices {
    let pool = DatabasePool::in_memory().await.unwrap();
    SyncServices {
        remote,
        cache: Arc::new(ContentAddressCache::new(10_000, Duration::from_secs(600))),
        trees: TreeFactory::kv(Arc::new(MemoryStore::new())),
        stability: Arc::new(SqliteStabilityStore::new(pool.pool().clone())),
    }
}

/// Configuration with small pages so pagination is exercised
pub fn config(max_deletion_percent: f64) -> Config {
    ConfigBuilder::new()
        .placeholder_base_url("http://media.local/redirect")
        .full_sync_overwrite_mode(OverwriteMode::Never)
        .full_sync_cleanup(true)
        .full_sync_max_deletion_percent(max_deletion_percent)
        .rate_limiting_page_size(2)
        .rate_limiting_max_workers(3)
        .build()
}

pub fn pair(local: &Path, remote: &str) -> PathPair {
    PathPair::new(local, RemotePath::new(remote).unwrap())
}

/// Every file below `root`, relative, sorted
pub fn local_files(root: &Path) -> Vec<String> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<String>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, root, out);
            } else {
                out.push(path.strip_prefix(root).unwrap().to_string_lossy().into_owned());
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}
