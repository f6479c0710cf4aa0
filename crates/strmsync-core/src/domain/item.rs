//! Remote item records
//!
//! [`RemoteEntry`] is what a listing call returns for one child: raw fields
//! with no path. The enumerator turns entries into [`RemoteItem`]s by
//! attaching the reconstructed absolute path. [`ItemMetadata`] is the
//! compact record kept in the content-address cache.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{RemoteId, RemotePath};

/// Directory-only or file-only attributes of a remote node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemKind {
    /// A directory; has no size or content handle
    Directory,
    /// A file with its size and content handle
    File {
        /// Size in bytes
        size: u64,
        /// Opaque handle addressing the file bytes; may be missing or
        /// malformed, which orchestrators record as a generation failure
        content_handle: Option<String>,
    },
}

/// One child record as returned by a listing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub id: RemoteId,
    pub parent_id: RemoteId,
    pub name: String,
    /// Last modification time, epoch seconds
    pub modify_time: i64,
    pub kind: ItemKind,
}

impl RemoteEntry {
    /// Returns true if this entry is a directory
    #[must_use]
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, ItemKind::Directory)
    }

    /// Check the fields every entry needs before a path can be built from it
    ///
    /// A `/` inside the name is not an error; [`escape_name`] replaces it
    /// when the path is built.
    ///
    /// # Errors
    /// Returns [`DomainError::MalformedItem`] when the name is empty or is a
    /// relative path component
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.is_empty() {
            return Err(DomainError::MalformedItem {
                id: self.id.get(),
                reason: "missing name".to_string(),
            });
        }
        if self.name == "." || self.name == ".." {
            return Err(DomainError::MalformedItem {
                id: self.id.get(),
                reason: format!("invalid name {:?}", self.name),
            });
        }
        Ok(())
    }

    /// Attach the absolute path of this entry's parent directory
    ///
    /// # Errors
    /// Returns error if the entry fails [`RemoteEntry::validate`]
    pub fn into_item(self, parent_path: &RemotePath) -> Result<RemoteItem, DomainError> {
        self.validate()?;
        let path = parent_path.join(&escape_name(&self.name))?;
        Ok(RemoteItem {
            id: self.id,
            parent_id: self.parent_id,
            name: self.name,
            modify_time: self.modify_time,
            kind: self.kind,
            path,
        })
    }
}

/// Makes a remote display name usable as one path component
///
/// Remote names may contain `/`; it is replaced with `:`.
pub fn escape_name(name: &str) -> Cow<'_, str> {
    if name.contains('/') {
        Cow::Owned(name.replace('/', ":"))
    } else {
        Cow::Borrowed(name)
    }
}

/// An ancestor directory record returned by ancestor-aware listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ancestor {
    pub id: RemoteId,
    pub parent_id: RemoteId,
    pub name: String,
}

/// One node of the remote tree, with its reconstructed absolute path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub id: RemoteId,
    pub parent_id: RemoteId,
    pub name: String,
    /// Last modification time, epoch seconds
    pub modify_time: i64,
    pub kind: ItemKind,
    /// Absolute POSIX path, without trailing slash
    pub path: RemotePath,
}

impl RemoteItem {
    /// Returns true if this item is a directory
    #[must_use]
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, ItemKind::Directory)
    }

    /// File size in bytes, `0` for directories
    #[must_use]
    pub fn size(&self) -> u64 {
        match self.kind {
            ItemKind::File { size, .. } => size,
            ItemKind::Directory => 0,
        }
    }

    /// Raw content handle, if this is a file that carries one
    #[must_use]
    pub fn content_handle(&self) -> Option<&str> {
        match &self.kind {
            ItemKind::File { content_handle, .. } => content_handle.as_deref(),
            ItemKind::Directory => None,
        }
    }

    /// Normalized tree entry: files without, directories with a trailing slash
    #[must_use]
    pub fn normalized_path(&self) -> String {
        if self.is_dir() {
            self.path.as_dir_entry()
        } else {
            self.path.as_str().to_string()
        }
    }

    /// Compact metadata record for the content-address cache
    #[must_use]
    pub fn metadata(&self) -> ItemMetadata {
        ItemMetadata {
            path: self.path.clone(),
            size: self.size(),
            modify_time: self.modify_time,
            content_handle: self.content_handle().map(str::to_string),
            is_dir: self.is_dir(),
        }
    }
}

/// Cached per-id metadata record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub path: RemotePath,
    pub size: u64,
    pub modify_time: i64,
    pub content_handle: Option<String>,
    pub is_dir: bool,
}
