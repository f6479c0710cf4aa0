//! Remote tree port (driven/secondary port)
//!
//! This module defines the capabilities the mirroring core consumes from the
//! remote object store: directory resolution, paginated child listings (with
//! an ancestor-aware variant) and single-item metadata lookups.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific.
//!   Adapters wrap transient failures so callers can classify them by message
//!   or by downcasting to the adapter's error type.
//! - A missing directory is a normal outcome of `resolve_path_to_id` and is
//!   reported as `Ok(None)`, not as an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::item::{escape_name, Ancestor, RemoteEntry};
use crate::domain::newtypes::{RemoteId, RemotePath};

// ============================================================================
// Listing options
// ============================================================================

/// Field the remote store sorts a listing by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Sort by file name
    #[default]
    Name,
    /// Sort by last modification time
    ModifyTime,
    /// Sort by size
    Size,
}

impl SortField {
    /// Wire name of the sort field
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::ModifyTime => "mtime",
            SortField::Size => "size",
        }
    }
}

/// Options applied to every page of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    /// Sort field
    pub sort: SortField,
    /// Ascending (true) or descending order
    pub ascending: bool,
    /// Only return files with this suffix (directories are always returned)
    pub suffix: Option<String>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            sort: SortField::Name,
            ascending: true,
            suffix: None,
        }
    }
}

// ============================================================================
// ListPage
// ============================================================================

/// One page of a directory listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Direct children on this page
    pub entries: Vec<RemoteEntry>,
    /// Total number of children the directory declares
    pub total: u64,
    /// Ancestor chain of the listed directory, root first and the listed
    /// directory last. Only present for ancestor-aware listings.
    pub ancestors: Option<Vec<Ancestor>>,
}

impl ListPage {
    /// Path of the listed directory, rebuilt from the ancestor chain
    ///
    /// The first ancestor is the store root and contributes no component.
    /// Returns `None` when the page carries no ancestors or a name is not a
    /// valid path component.
    pub fn ancestor_path(&self) -> Option<RemotePath> {
        let ancestors = self.ancestors.as_ref()?;
        let mut path = RemotePath::root();
        for ancestor in ancestors.iter().skip(1) {
            path = path.join(&escape_name(&ancestor.name)).ok()?;
        }
        Some(path)
    }
}

// ============================================================================
// IRemoteTree trait
// ============================================================================

/// Port trait for the remote object store
///
/// Implementations must be safe to share between enumeration workers.
#[async_trait]
pub trait IRemoteTree: Send + Sync {
    /// Resolve a directory path to its identifier
    ///
    /// Returns `Ok(None)` when the path does not exist remotely.
    async fn resolve_path_to_id(&self, path: &RemotePath) -> anyhow::Result<Option<RemoteId>>;

    /// List one page of a directory's direct children
    async fn list_children(
        &self,
        id: RemoteId,
        offset: u64,
        page_size: u32,
        options: &ListOptions,
    ) -> anyhow::Result<ListPage>;

    /// List one page of children together with the directory's ancestor chain
    async fn list_children_with_ancestors(
        &self,
        id: RemoteId,
        offset: u64,
        page_size: u32,
        options: &ListOptions,
    ) -> anyhow::Result<ListPage>;

    /// Fetch a single item's metadata
    async fn get_item_metadata(&self, id: RemoteId) -> anyhow::Result<RemoteEntry>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ancestor(id: u64, name: &str) -> Ancestor {
        Ancestor {
            id: RemoteId::new(id),
            parent_id: RemoteId::ROOT,
            name: name.to_string(),
        }
    }

    #[test]
    fn ancestor_path_skips_root_record() {
        let page = ListPage {
            entries: vec![],
            total: 0,
            ancestors: Some(vec![ancestor(0, ""), ancestor(5, "Movies"), ancestor(9, "A")]),
        };
        assert_eq!(page.ancestor_path().unwrap().as_str(), "/Movies/A");
    }

    #[test]
    fn ancestor_path_of_root_listing() {
        let page = ListPage {
            ancestors: Some(vec![ancestor(0, "")]),
            ..Default::default()
        };
        assert_eq!(page.ancestor_path(), Some(RemotePath::root()));
    }

    #[test]
    fn ancestor_path_absent_without_chain() {
        assert!(ListPage::default().ancestor_path().is_none());
    }

    #[test]
    fn sort_field_wire_names() {
        assert_eq!(SortField::Name.as_str(), "name");
        assert_eq!(SortField::ModifyTime.as_str(), "mtime");
        assert_eq!(SortField::Size.as_str(), "size");
    }
}
