//! strmsync Tree - Directory tree diff engine
//!
//! A [`DirectoryTree`] is an append-only, ordered collection of path
//! strings. Trees are filled once per sync run, either from a local scan
//! or from a remote enumeration, and are then diffed against each other.
//!
//! ## Backends
//!
//! - [`TextFileTree`] - one newline-delimited UTF-8 file per tree
//! - [`KvTree`] - a set key and a list key per tree in a [`KvStore`]
//!   ([`RedisStore`] in production, [`MemoryStore`] for tests)
//!
//! Both backends behave identically for every operation. Trees of
//! different backend families cannot be compared with each other.
//!
//! ## Entries
//!
//! Entries are trimmed before storage. Empty entries and entries containing
//! a line break are dropped, so the n-th stored entry is always line n of
//! the text representation.

pub mod factory;
pub mod kv;
pub mod memory;
pub mod redis_store;
pub mod scan;
pub mod text;

use std::path::PathBuf;

use thiserror::Error;

pub use factory::TreeFactory;
pub use kv::{KvStore, KvTree};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use scan::scan_directory;
pub use text::TextFileTree;

/// Lazy sequence of paths produced by a comparison
pub type PathIter<'a> = Box<dyn Iterator<Item = Result<String, TreeError>> + Send + 'a>;

/// Lazy sequence of 1-based line numbers produced by a comparison
pub type LineIter<'a> = Box<dyn Iterator<Item = Result<u64, TreeError>> + Send + 'a>;

/// Errors raised by tree backends
#[derive(Debug, Error)]
pub enum TreeError {
    /// Reading or writing a tree file failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The key-value service rejected a command or is unreachable
    #[error("Key-value store error: {0}")]
    Store(String),

    /// The two trees live in different backend families
    #[error("Cannot compare a {left} tree with a {right} tree")]
    IncompatibleBackends {
        left: &'static str,
        right: &'static str,
    },

    /// Tree names become file names and key suffixes
    #[error("Invalid tree name '{0}'")]
    InvalidName(String),

    /// The tree configuration cannot be used
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<redis::RedisError> for TreeError {
    fn from(e: redis::RedisError) -> Self {
        TreeError::Store(e.to_string())
    }
}

/// Normalizes one entry for storage
///
/// Returns `None` for entries that cannot be represented as a single line.
pub(crate) fn normalize_entry(raw: &str) -> Option<&str> {
    let entry = raw.trim();
    if entry.is_empty() || entry.contains(&['\n', '\r'][..]) {
        if !entry.is_empty() {
            tracing::warn!(entry = %entry.escape_debug(), "Dropping multi-line tree entry");
        }
        return None;
    }
    Some(entry)
}

pub(crate) fn validate_name(name: &str) -> Result<(), TreeError> {
    if name.is_empty()
        || name.contains(&['/', '\\', '\n', '\r'][..])
        || name == "."
        || name == ".."
    {
        return Err(TreeError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// A directory tree in one of the two backend families
#[derive(Debug)]
pub enum DirectoryTree {
    Text(TextFileTree),
    Kv(KvTree),
}

impl DirectoryTree {
    /// The tree's name
    pub fn name(&self) -> &str {
        match self {
            DirectoryTree::Text(tree) => tree.name(),
            DirectoryTree::Kv(tree) => tree.name(),
        }
    }

    /// Backend family, used in logs and errors
    pub fn backend(&self) -> &'static str {
        match self {
            DirectoryTree::Text(_) => "text",
            DirectoryTree::Kv(_) => "kv",
        }
    }

    /// Stores `paths`, replacing the current content unless `append`
    ///
    /// Returns the number of entries written.
    pub fn add_paths<I, S>(&self, paths: I, append: bool) -> Result<u64, TreeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self {
            DirectoryTree::Text(tree) => tree.add_paths(paths, append),
            DirectoryTree::Kv(tree) => tree.add_paths(paths, append),
        }
    }

    /// Entries of `self` absent from `other`, each reported once
    pub fn compare<'a>(&'a self, other: &'a DirectoryTree) -> Result<PathIter<'a>, TreeError> {
        match (self, other) {
            (DirectoryTree::Text(a), DirectoryTree::Text(b)) => a.compare(b),
            (DirectoryTree::Kv(a), DirectoryTree::Kv(b)) => a.compare(b),
            _ => Err(self.incompatible(other)),
        }
    }

    /// 1-based line numbers in `self` of entries absent from `other`
    pub fn compare_lines<'a>(&'a self, other: &'a DirectoryTree) -> Result<LineIter<'a>, TreeError> {
        match (self, other) {
            (DirectoryTree::Text(a), DirectoryTree::Text(b)) => a.compare_lines(b),
            (DirectoryTree::Kv(a), DirectoryTree::Kv(b)) => a.compare_lines(b),
            _ => Err(self.incompatible(other)),
        }
    }

    /// Entry at 1-based line `n`; `None` for 0 or past the end
    pub fn get_by_line(&self, n: u64) -> Result<Option<String>, TreeError> {
        match self {
            DirectoryTree::Text(tree) => tree.get_by_line(n),
            DirectoryTree::Kv(tree) => tree.get_by_line(n),
        }
    }

    /// Number of stored entries
    pub fn count(&self) -> Result<u64, TreeError> {
        match self {
            DirectoryTree::Text(tree) => tree.count(),
            DirectoryTree::Kv(tree) => tree.count(),
        }
    }

    /// Removes every entry
    pub fn clear(&self) -> Result<(), TreeError> {
        match self {
            DirectoryTree::Text(tree) => tree.clear(),
            DirectoryTree::Kv(tree) => tree.clear(),
        }
    }

    fn incompatible(&self, other: &DirectoryTree) -> TreeError {
        TreeError::IncompatibleBackends {
            left: self.backend(),
            right: other.backend(),
        }
    }
}
