//! Content-address cache
//!
//! Three co-maintained maps, each a bounded TTL cache:
//!
//! | Map            | Key          | Value          |
//! |----------------|--------------|----------------|
//! | `path_to_id`   | `RemotePath` | `RemoteId`     |
//! | `id_to_path`   | `RemoteId`   | `RemotePath`   |
//! | `metadata`     | `RemoteId`   | `ItemMetadata` |
//!
//! At most one live mapping exists per key in each direction. Writers
//! serialize on a small lock and evict stale reverse entries before
//! inserting. Readers are lock-free and only return a mapping when the
//! opposite direction agrees, so an entry that outlived its partner through
//! TTL expiry or LRU eviction is never observed.
//!
//! Cache misses never touch the network; callers resolve them remotely and
//! call [`ContentAddressCache::put`] again.

use std::sync::Mutex;
use std::time::Duration;

use moka::sync::Cache;

use strmsync_core::config::CacheConfig;
use strmsync_core::domain::{ItemMetadata, RemoteId, RemotePath};

/// Bidirectional path/id cache with per-id metadata
pub struct ContentAddressCache {
    path_to_id: Cache<RemotePath, RemoteId>,
    id_to_path: Cache<RemoteId, RemotePath>,
    metadata: Cache<RemoteId, ItemMetadata>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for ContentAddressCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentAddressCache")
            .field("paths", &self.path_to_id.entry_count())
            .field("metadata", &self.metadata.entry_count())
            .finish()
    }
}

impl ContentAddressCache {
    /// Creates a cache holding at most `max_capacity` entries per map
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let max_capacity = max_capacity.max(1);
        Self {
            path_to_id: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            id_to_path: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            metadata: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            write_lock: Mutex::new(()),
        }
    }

    /// Creates a cache from the `cache` configuration section
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_capacity, Duration::from_secs(config.ttl_secs))
    }

    /// Records `id <-> path` and, when given, the metadata for `id`
    ///
    /// If `path` previously mapped to another id, that id's reverse entry
    /// and metadata are dropped. If `id` previously mapped to another path,
    /// that path's forward entry is dropped. Without `metadata`, the
    /// metadata of `id` survives only if its path did not change.
    pub fn put(&self, id: RemoteId, path: RemotePath, metadata: Option<ItemMetadata>) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(previous_id) = self.path_to_id.get(&path) {
            if previous_id != id {
                tracing::trace!(path = %path, old = %previous_id, new = %id, "Path remapped");
                self.id_to_path.invalidate(&previous_id);
                self.metadata.invalidate(&previous_id);
            }
        }
        let moved = match self.id_to_path.get(&id) {
            Some(previous_path) if previous_path != path => {
                tracing::trace!(id = %id, old = %previous_path, new = %path, "Id moved");
                self.path_to_id.invalidate(&previous_path);
                true
            }
            Some(_) => false,
            None => true,
        };

        self.path_to_id.insert(path.clone(), id);
        self.id_to_path.insert(id, path);
        match metadata {
            Some(meta) => self.metadata.insert(id, meta),
            None if moved => self.metadata.invalidate(&id),
            None => {}
        }
    }

    /// Looks up the identifier recorded for `path`
    pub fn get_id(&self, path: &RemotePath) -> Option<RemoteId> {
        let id = self.path_to_id.get(path)?;
        match self.id_to_path.get(&id) {
            Some(ref back) if back == path => Some(id),
            _ => None,
        }
    }

    /// Looks up the path recorded for `id`
    pub fn get_path(&self, id: RemoteId) -> Option<RemotePath> {
        let path = self.id_to_path.get(&id)?;
        match self.path_to_id.get(&path) {
            Some(back) if back == id => Some(path),
            _ => None,
        }
    }

    /// Looks up the metadata recorded for `id`
    pub fn get_metadata(&self, id: RemoteId) -> Option<ItemMetadata> {
        self.metadata.get(&id)
    }

    /// Looks up metadata by path
    pub fn get_metadata_by_path(&self, path: &RemotePath) -> Option<ItemMetadata> {
        self.get_id(path).and_then(|id| self.get_metadata(id))
    }

    /// Forgets everything recorded for `id`
    pub fn invalidate_id(&self, id: RemoteId) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(path) = self.id_to_path.get(&id) {
            if self.path_to_id.get(&path) == Some(id) {
                self.path_to_id.invalidate(&path);
            }
        }
        self.id_to_path.invalidate(&id);
        self.metadata.invalidate(&id);
    }

    /// Forgets everything recorded for `path`
    pub fn invalidate_path(&self, path: &RemotePath) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(id) = self.path_to_id.get(path) {
            if self.id_to_path.get(&id).as_ref() == Some(path) {
                self.id_to_path.invalidate(&id);
                self.metadata.invalidate(&id);
            }
        }
        self.path_to_id.invalidate(path);
    }

    /// Drops every entry
    pub fn clear(&self) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.path_to_id.invalidate_all();
        self.id_to_path.invalidate_all();
        self.metadata.invalidate_all();
    }
}

impl Default for ContentAddressCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
