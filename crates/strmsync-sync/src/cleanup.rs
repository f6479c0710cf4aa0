//! Removal of orphan placeholders
//!
//! Runs only for candidates the deletion gate approved. Besides the
//! placeholder itself, a [`Cleaner`] can remove sibling files belonging to
//! the same title (`{stem}.*` and `{stem}-*`: subtitles, artwork, NFO) and
//! parent directories left without placeholders. It never climbs above the
//! configured local root.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use strmsync_core::config::FullSyncConfig;

use crate::SyncError;

/// Ancestor levels examined after a removal
pub const MAX_PARENT_LEVELS: usize = 3;

/// What removing one orphan touched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupOutcome {
    /// The placeholder existed and was removed
    pub removed: bool,
    pub related_removed: u64,
    pub dirs_removed: u64,
}

/// Removes orphan placeholders below one local root
#[derive(Debug, Clone)]
pub struct Cleaner {
    local_root: PathBuf,
    placeholder_ext: String,
    remove_empty_parents: bool,
    remove_related_files: bool,
}

impl Cleaner {
    pub fn new(
        local_root: impl Into<PathBuf>,
        placeholder_ext: impl Into<String>,
        remove_empty_parents: bool,
        remove_related_files: bool,
    ) -> Self {
        Self {
            local_root: local_root.into(),
            placeholder_ext: placeholder_ext.into(),
            remove_empty_parents,
            remove_related_files,
        }
    }

    pub fn from_config(
        local_root: impl Into<PathBuf>,
        placeholder_ext: impl Into<String>,
        config: &FullSyncConfig,
    ) -> Self {
        Self::new(
            local_root,
            placeholder_ext,
            config.remove_empty_parents,
            config.remove_related_files,
        )
    }

    /// Removes the orphan at `path` and whatever it leaves behind
    ///
    /// A placeholder that is already gone is not an error.
    pub async fn remove_orphan(&self, path: &Path) -> Result<CleanupOutcome, SyncError> {
        let mut outcome = CleanupOutcome::default();
        if !path.starts_with(&self.local_root) || path == self.local_root {
            debug!(path = %path.display(), "Refusing to remove path outside the local root");
            return Ok(outcome);
        }

        match tokio::fs::remove_file(path).await {
            Ok(()) => outcome.removed = true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if self.remove_related_files {
            outcome.related_removed = self.remove_related(path).await?;
        }
        if self.remove_empty_parents {
            if let Some(parent) = path.parent() {
                outcome.dirs_removed = self.remove_parents(parent).await?;
            }
        }

        info!(
            path = %path.display(),
            removed = outcome.removed,
            related = outcome.related_removed,
            dirs = outcome.dirs_removed,
            "Removed orphan placeholder"
        );
        Ok(outcome)
    }

    fn is_placeholder(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.placeholder_ext))
    }

    async fn remove_related(&self, path: &Path) -> Result<u64, SyncError> {
        let (Some(dir), Some(stem)) = (path.parent(), path.file_stem().and_then(|s| s.to_str()))
        else {
            return Ok(0);
        };
        let dotted = format!("{stem}.");
        let dashed = format!("{stem}-");

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !(name.starts_with(&dotted) || name.starts_with(&dashed)) {
                continue;
            }
            let sibling = entry.path();
            if self.is_placeholder(&sibling) || !entry.file_type().await?.is_file() {
                continue;
            }
            tokio::fs::remove_file(&sibling).await?;
            debug!(path = %sibling.display(), "Removed related file");
            removed += 1;
        }
        Ok(removed)
    }

    /// Climbs from `dir` removing directories without placeholders
    async fn remove_parents(&self, dir: &Path) -> Result<u64, SyncError> {
        let mut removed = 0;
        let mut current = dir.to_path_buf();

        for _ in 0..MAX_PARENT_LEVELS {
            if current == self.local_root || !current.starts_with(&self.local_root) {
                break;
            }
            match self.inspect(&current).await? {
                DirState::Missing => {}
                DirState::Empty => {
                    tokio::fs::remove_dir(&current).await?;
                    debug!(dir = %current.display(), "Removed empty directory");
                    removed += 1;
                }
                DirState::NoPlaceholders if self.remove_related_files => {
                    tokio::fs::remove_dir_all(&current).await?;
                    debug!(dir = %current.display(), "Removed directory without placeholders");
                    removed += 1;
                }
                DirState::NoPlaceholders | DirState::HasPlaceholders => break,
            }
            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }
        Ok(removed)
    }

    async fn inspect(&self, dir: &Path) -> Result<DirState, SyncError> {
        let mut pending = vec![dir.to_path_buf()];
        let mut empty = true;

        while let Some(next) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&next).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound && next == dir => {
                    return Ok(DirState::Missing)
                }
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                empty = false;
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if self.is_placeholder(&path) {
                    return Ok(DirState::HasPlaceholders);
                }
            }
        }

        Ok(if empty {
            DirState::Empty
        } else {
            DirState::NoPlaceholders
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirState {
    Missing,
    Empty,
    NoPlaceholders,
    HasPlaceholders,
}
