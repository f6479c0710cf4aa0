//! In-process [`KvStore`]
//!
//! Mirrors the Redis command semantics the key-value backend relies on.
//! Used by tests and by single-process runs that want the key-value code
//! path without a server.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::kv::KvStore;
use crate::TreeError;

#[derive(Debug, Default)]
struct Collections {
    sets: HashMap<String, HashSet<String>>,
    lists: HashMap<String, Vec<String>>,
}

/// [`KvStore`] kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any set or list exists under `key`
    pub fn contains_key(&self, key: &str) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.sets.contains_key(key) || inner.lists.contains_key(key)
    }
}

impl KvStore for MemoryStore {
    fn append(&self, set_key: &str, list_key: &str, members: &[String]) -> Result<(), TreeError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .sets
            .entry(set_key.to_string())
            .or_default()
            .extend(members.iter().cloned());
        inner
            .lists
            .entry(list_key.to_string())
            .or_default()
            .extend(members.iter().cloned());
        Ok(())
    }

    fn delete(&self, keys: &[&str]) -> Result<(), TreeError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        for key in keys {
            inner.sets.remove(*key);
            inner.lists.remove(*key);
        }
        Ok(())
    }

    fn contains_many(&self, set_key: &str, members: &[String]) -> Result<Vec<bool>, TreeError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let flags = match inner.sets.get(set_key) {
            Some(set) => members.iter().map(|m| set.contains(m)).collect(),
            None => vec![false; members.len()],
        };
        Ok(flags)
    }

    fn range(&self, list_key: &str, start: u64, len: u64) -> Result<Vec<String>, TreeError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let Some(list) = inner.lists.get(list_key) else {
            return Ok(Vec::new());
        };
        let start = usize::try_from(start).unwrap_or(usize::MAX);
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        Ok(list.iter().skip(start).take(len).cloned().collect())
    }

    fn index(&self, list_key: &str, index: u64) -> Result<Option<String>, TreeError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let index = usize::try_from(index).unwrap_or(usize::MAX);
        Ok(inner
            .lists
            .get(list_key)
            .and_then(|list| list.get(index))
            .cloned())
    }

    fn list_len(&self, list_key: &str) -> Result<u64, TreeError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.lists.get(list_key).map_or(0, |list| list.len() as u64))
    }
}
