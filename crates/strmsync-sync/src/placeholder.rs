//! Placeholder files
//!
//! A placeholder is a one-line UTF-8 file standing in for a remote media
//! file. Its content is a reference URL carrying the file's content handle
//! (and optionally its name) so a downstream resolver can fetch the bytes.
//!
//! Writes go to a temporary sibling first and are renamed into place, so a
//! crashed run never leaves a truncated placeholder behind.

use std::path::{Path, PathBuf};

use tracing::debug;

use strmsync_core::config::{OverwriteMode, PlaceholderConfig, PlaceholderFormat};
use strmsync_core::domain::{ContentHandle, RemotePath};

use crate::SyncError;

/// What [`PlaceholderWriter::write`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    /// Existing placeholder rewritten with different content
    Updated,
    /// Existing placeholder already had this content
    Unchanged,
    /// Existing placeholder left alone because overwrite mode is `never`
    Exists,
}

/// Computes placeholder paths and content and writes them to disk
#[derive(Debug, Clone)]
pub struct PlaceholderWriter {
    base_url: String,
    format: PlaceholderFormat,
    url_encode_name: bool,
    extension: String,
    overwrite: OverwriteMode,
}

impl PlaceholderWriter {
    pub fn from_config(config: &PlaceholderConfig, overwrite: OverwriteMode) -> Self {
        Self {
            base_url: config.base_url.clone(),
            format: config.format,
            url_encode_name: config.url_encode_name,
            extension: config.extension.trim_start_matches('.').to_string(),
            overwrite,
        }
    }

    /// Placeholder file extension, without dot
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Local placeholder path of `remote_path`
    ///
    /// Mirrors the part of `remote_path` below `remote_root` under
    /// `local_root` and swaps the extension. Returns `None` when the path is
    /// not below the root.
    pub fn target_path(
        &self,
        local_root: &Path,
        remote_root: &RemotePath,
        remote_path: &RemotePath,
    ) -> Option<PathBuf> {
        let relative = remote_path.relative_to(remote_root)?;
        if relative.is_empty() {
            return None;
        }
        let mut target = local_root.to_path_buf();
        target.extend(relative.split('/'));
        target.set_extension(&self.extension);
        Some(target)
    }

    /// Reference line for a file with `handle` and display `name`
    pub fn content(&self, handle: &ContentHandle, name: &str) -> String {
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        let mut content = format!("{}{}handle={}", self.base_url, separator, handle);
        if self.format == PlaceholderFormat::HandleAndName {
            content.push_str("&name=");
            if self.url_encode_name {
                content.extend(url::form_urlencoded::byte_serialize(name.as_bytes()));
            } else {
                content.push_str(name);
            }
        }
        content
    }

    /// Writes `content` to `target`, creating parent directories
    pub async fn write(&self, target: &Path, content: &str) -> Result<WriteOutcome, SyncError> {
        let existing = match tokio::fs::read_to_string(target).await {
            Ok(existing) => Some(existing),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            // Unreadable or not UTF-8: replace it
            Err(_) if self.overwrite == OverwriteMode::Always => Some(String::new()),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                return Ok(WriteOutcome::Exists)
            }
            Err(e) => return Err(e.into()),
        };

        let outcome = match existing {
            None => WriteOutcome::Created,
            Some(_) if self.overwrite == OverwriteMode::Never => return Ok(WriteOutcome::Exists),
            Some(existing) if existing == content => return Ok(WriteOutcome::Unchanged),
            Some(_) => WriteOutcome::Updated,
        };

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = {
            let mut p = target.as_os_str().to_owned();
            p.push(".tmp");
            PathBuf::from(p)
        };
        tokio::fs::write(&tmp_path, content).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, target).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        debug!(path = %target.display(), ?outcome, "Wrote placeholder");
        Ok(outcome)
    }
}
