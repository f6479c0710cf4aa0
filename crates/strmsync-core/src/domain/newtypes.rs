//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::errors::DomainError;

// ============================================================================
// Remote identifiers
// ============================================================================

/// Numeric identifier of a node in the remote store
///
/// Identifiers are stable and unique within one remote store. The value `0`
/// addresses the store's root directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(u64);

impl RemoteId {
    /// Identifier of the remote root directory
    pub const ROOT: RemoteId = RemoteId(0);

    /// Wrap a raw identifier
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw identifier
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns true if this is the root identifier
    #[must_use]
    pub const fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl Display for RemoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| DomainError::ValidationFailed(format!("Invalid remote id {s:?}: {e}")))
    }
}

impl From<u64> for RemoteId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ============================================================================
// Remote paths
// ============================================================================

/// A POSIX-style absolute path in the remote store
///
/// Stored without a trailing slash (except for the root `/`). Use
/// [`RemotePath::as_dir_entry`] to obtain the directory form with a single
/// trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePath(String);

impl RemotePath {
    /// Create a new RemotePath
    ///
    /// Trailing slashes are trimmed.
    ///
    /// # Errors
    /// Returns error if the path is not absolute, contains empty components,
    /// or contains `.`/`..` components
    pub fn new(path: impl Into<String>) -> Result<Self, DomainError> {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path must start with '/': {path}"
            )));
        }

        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        for component in trimmed[1..].split('/') {
            if component.is_empty() {
                return Err(DomainError::InvalidRemotePath(format!(
                    "Remote path contains invalid double slashes: {path}"
                )));
            }
            if component == "." || component == ".." {
                return Err(DomainError::InvalidRemotePath(format!(
                    "Remote path contains invalid traversal: {path}"
                )));
            }
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Create the root path "/"
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Returns true for the root path
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory form of this path, with exactly one trailing slash
    #[must_use]
    pub fn as_dir_entry(&self) -> String {
        if self.is_root() {
            self.0.clone()
        } else {
            format!("{}/", self.0)
        }
    }

    /// Join a path component
    ///
    /// # Errors
    /// Returns error if component is invalid
    pub fn join(&self, component: &str) -> Result<Self, DomainError> {
        if component.is_empty() || component.contains('/') || component == "." || component == ".."
        {
            return Err(DomainError::InvalidRemotePath(format!(
                "Invalid path component: {component:?}"
            )));
        }

        let new_path = if self.is_root() {
            format!("/{component}")
        } else {
            format!("{}/{component}", self.0)
        };

        Ok(Self(new_path))
    }

    /// Get the parent path
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }

        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Get the file name component
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }

        self.0.rsplit('/').next()
    }

    /// Returns true if `self` equals `prefix` or lies beneath it
    ///
    /// Comparison is by whole path components, so `/Movies2` is not under
    /// `/Movies`.
    #[must_use]
    pub fn is_under(&self, prefix: &RemotePath) -> bool {
        self.relative_to(prefix).is_some()
    }

    /// The part of `self` below `prefix`, without a leading slash
    ///
    /// Returns `Some("")` when both paths are equal and `None` when `self`
    /// is not under `prefix`.
    #[must_use]
    pub fn relative_to(&self, prefix: &RemotePath) -> Option<&str> {
        if prefix.is_root() {
            return Some(&self.0[1..]);
        }
        let rest = self.0.strip_prefix(prefix.as_str())?;
        if rest.is_empty() {
            Some(rest)
        } else {
            rest.strip_prefix('/')
        }
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemotePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RemotePath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemotePath> for String {
    fn from(path: RemotePath) -> Self {
        path.0
    }
}

// ============================================================================
// Content handle
// ============================================================================

/// Required length of a content handle
pub const CONTENT_HANDLE_LEN: usize = 17;

/// Short opaque string addressing a remote file's bytes
///
/// A well-formed handle is exactly 17 ASCII alphanumeric characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHandle(String);

impl ContentHandle {
    /// Create a new ContentHandle
    ///
    /// # Errors
    /// Returns error if the handle has the wrong length or contains
    /// non-alphanumeric characters
    pub fn new(handle: impl Into<String>) -> Result<Self, DomainError> {
        let handle = handle.into();
        if handle.len() != CONTENT_HANDLE_LEN {
            return Err(DomainError::InvalidContentHandle(format!(
                "expected {CONTENT_HANDLE_LEN} characters, got {}: {handle:?}",
                handle.len()
            )));
        }
        if !handle.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainError::InvalidContentHandle(format!(
                "must be alphanumeric: {handle:?}"
            )));
        }
        Ok(Self(handle))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentHandle {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContentHandle {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContentHandle> for String {
    fn from(handle: ContentHandle) -> Self {
        handle.0
    }
}

// ============================================================================
// Sync scope
// ============================================================================

/// A configured `local#remote` root pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathPair {
    /// Local mirror directory
    pub local: PathBuf,
    /// Remote directory being mirrored
    pub remote: RemotePath,
}

impl PathPair {
    /// Create a pair from its parts
    #[must_use]
    pub fn new(local: impl Into<PathBuf>, remote: RemotePath) -> Self {
        Self {
            local: local.into(),
            remote,
        }
    }

    /// Stable key identifying this pair's deletion history
    #[must_use]
    pub fn scope_key(&self) -> ScopeKey {
        ScopeKey::from_pair(&self.local, &self.remote)
    }
}

impl Display for PathPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.local.display(), self.remote)
    }
}

impl FromStr for PathPair {
    type Err = DomainError;

    /// Parse `local#remote`; the split happens at the first `#`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (local, remote) = s
            .split_once('#')
            .ok_or_else(|| DomainError::InvalidPathPair(format!("missing '#': {s}")))?;

        let local = local.trim();
        let remote = remote.trim();
        if local.is_empty() || remote.is_empty() {
            return Err(DomainError::InvalidPathPair(format!("empty half: {s}")));
        }

        let local = local.trim_end_matches('/');
        let local = if local.is_empty() { "/" } else { local };
        let remote = RemotePath::new(remote)
            .map_err(|e| DomainError::InvalidPathPair(format!("{s}: {e}")))?;

        Ok(Self::new(local, remote))
    }
}

/// Stable hash identifying one sync scope
///
/// Lowercase hex SHA-256 of `"{local}#{remote}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeKey(String);

impl ScopeKey {
    /// Derive the key for a local/remote root pair
    #[must_use]
    pub fn from_pair(local: &Path, remote: &RemotePath) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(local.to_string_lossy().as_bytes());
        hasher.update(b"#");
        hasher.update(remote.as_str().as_bytes());
        let digest = hasher.finalize();

        let hex = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();
        Self(hex)
    }

    /// Wrap an already computed key (e.g. read back from storage)
    #[must_use]
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ScopeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
