//! Key-value tree backend
//!
//! Each tree owns two keys in a [`KvStore`]:
//!
//! - `dirtree:set:<name>` - set of entries, for membership checks
//! - `dirtree:list:<name>` - list of entries, for line-number access
//!
//! Writes are sent in chunks of [`WRITE_CHUNK`] entries; reads page through
//! the list [`READ_CHUNK`] entries at a time. Differences stream the list
//! and check membership in the other tree's set, so they come out in line
//! order exactly like the text backend's.

use std::collections::HashSet;
use std::sync::Arc;

use crate::{normalize_entry, validate_name, LineIter, PathIter, TreeError};

/// Entries per SADD/RPUSH round trip
pub const WRITE_CHUNK: usize = 5000;

/// Entries per LRANGE round trip
pub const READ_CHUNK: u64 = 1000;

const SET_PREFIX: &str = "dirtree:set:";
const LIST_PREFIX: &str = "dirtree:list:";

/// Minimal set/list command surface needed by [`KvTree`]
///
/// Indexes are 0-based. Missing keys behave as empty collections.
pub trait KvStore: Send + Sync + std::fmt::Debug {
    /// Adds `members` to the set and appends them to the list
    fn append(&self, set_key: &str, list_key: &str, members: &[String]) -> Result<(), TreeError>;

    /// Deletes the given keys
    fn delete(&self, keys: &[&str]) -> Result<(), TreeError>;

    /// Membership flag for each of `members`
    fn contains_many(&self, set_key: &str, members: &[String]) -> Result<Vec<bool>, TreeError>;

    /// Up to `len` list items starting at `start`
    fn range(&self, list_key: &str, start: u64, len: u64) -> Result<Vec<String>, TreeError>;

    /// List item at `index`
    fn index(&self, list_key: &str, index: u64) -> Result<Option<String>, TreeError>;

    /// Number of list items
    fn list_len(&self, list_key: &str) -> Result<u64, TreeError>;
}

/// Directory tree stored as a set key plus a list key
#[derive(Debug, Clone)]
pub struct KvTree {
    name: String,
    set_key: String,
    list_key: String,
    store: Arc<dyn KvStore>,
}

impl KvTree {
    pub fn new(name: &str, store: Arc<dyn KvStore>) -> Result<Self, TreeError> {
        validate_name(name)?;
        Ok(Self {
            name: name.to_string(),
            set_key: format!("{SET_PREFIX}{name}"),
            list_key: format!("{LIST_PREFIX}{name}"),
            store,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_key(&self) -> &str {
        &self.set_key
    }

    pub fn list_key(&self) -> &str {
        &self.list_key
    }

    pub fn add_paths<I, S>(&self, paths: I, append: bool) -> Result<u64, TreeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !append {
            self.store.delete(&[&self.set_key, &self.list_key])?;
        }

        let mut written = 0u64;
        let mut chunk: Vec<String> = Vec::with_capacity(WRITE_CHUNK);
        for raw in paths {
            if let Some(entry) = normalize_entry(raw.as_ref()) {
                chunk.push(entry.to_string());
                if chunk.len() == WRITE_CHUNK {
                    self.store.append(&self.set_key, &self.list_key, &chunk)?;
                    written += chunk.len() as u64;
                    chunk.clear();
                }
            }
        }
        if !chunk.is_empty() {
            self.store.append(&self.set_key, &self.list_key, &chunk)?;
            written += chunk.len() as u64;
        }

        tracing::trace!(tree = %self.name, written, append, "Appended tree entries");
        Ok(written)
    }

    fn chunks(&self) -> ListChunks<'_> {
        ListChunks {
            store: self.store.as_ref(),
            list_key: &self.list_key,
            next: 0,
            done: false,
        }
    }

    /// Entries of this tree missing from `other`, first occurrence only
    pub fn compare<'a>(&'a self, other: &'a KvTree) -> Result<PathIter<'a>, TreeError> {
        let mut reported = HashSet::new();
        let diff = self.chunks().flat_map(move |chunk| -> Vec<Result<String, TreeError>> {
            let (_, entries) = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return vec![Err(e)],
            };
            match other.store.contains_many(&other.set_key, &entries) {
                Ok(flags) => entries
                    .into_iter()
                    .zip(flags)
                    .filter(|(entry, present)| !present && reported.insert(entry.clone()))
                    .map(|(entry, _)| Ok(entry))
                    .collect(),
                Err(e) => vec![Err(e)],
            }
        });
        Ok(Box::new(diff))
    }

    pub fn compare_lines<'a>(&'a self, other: &'a KvTree) -> Result<LineIter<'a>, TreeError> {
        let lines = self.chunks().flat_map(move |chunk| -> Vec<Result<u64, TreeError>> {
            let (start, entries) = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return vec![Err(e)],
            };
            match other.store.contains_many(&other.set_key, &entries) {
                Ok(flags) => flags
                    .into_iter()
                    .zip(start + 1..)
                    .filter(|(present, _)| !present)
                    .map(|(_, line)| Ok(line))
                    .collect(),
                Err(e) => vec![Err(e)],
            }
        });
        Ok(Box::new(lines))
    }

    pub fn get_by_line(&self, n: u64) -> Result<Option<String>, TreeError> {
        if n == 0 {
            return Ok(None);
        }
        self.store.index(&self.list_key, n - 1)
    }

    pub fn count(&self) -> Result<u64, TreeError> {
        self.store.list_len(&self.list_key)
    }

    pub fn clear(&self) -> Result<(), TreeError> {
        self.store.delete(&[&self.set_key, &self.list_key])
    }
}

/// Pages through a list, yielding `(start_index, items)`
struct ListChunks<'a> {
    store: &'a dyn KvStore,
    list_key: &'a str,
    next: u64,
    done: bool,
}

impl Iterator for ListChunks<'_> {
    type Item = Result<(u64, Vec<String>), TreeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.store.range(self.list_key, self.next, READ_CHUNK) {
            Ok(items) if items.is_empty() => {
                self.done = true;
                None
            }
            Ok(items) => {
                let start = self.next;
                self.next += items.len() as u64;
                if (items.len() as u64) < READ_CHUNK {
                    self.done = true;
                }
                Some(Ok((start, items)))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
