//! Media filter: which remote files get a placeholder

use std::collections::HashSet;

use tracing::warn;

use strmsync_core::config::MediaConfig;
use strmsync_core::domain::{RemoteItem, RemotePath};

/// Why a remote item was not mirrored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Directory,
    /// Not below the pair's remote root
    OutsideRoot,
    /// Inside a transfer staging directory
    InTransfer,
    Extension,
    Blacklisted,
    TooSmall,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Directory => "directory",
            SkipReason::OutsideRoot => "outside_root",
            SkipReason::InTransfer => "in_transfer",
            SkipReason::Extension => "extension",
            SkipReason::Blacklisted => "blacklisted",
            SkipReason::TooSmall => "too_small",
        }
    }
}

/// Compiled `media` configuration section
#[derive(Debug, Clone, Default)]
pub struct MediaFilter {
    extensions: HashSet<String>,
    blacklist: Vec<String>,
    min_file_size: u64,
    transfer_paths: Vec<RemotePath>,
}

impl MediaFilter {
    /// Builds a filter; extensions and keywords compare case-insensitively
    ///
    /// Transfer paths that are not valid remote paths are logged and ignored.
    pub fn from_config(config: &MediaConfig) -> Self {
        let extensions = config
            .extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        let blacklist = config
            .blacklist
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        let transfer_paths = config
            .transfer_paths
            .iter()
            .filter_map(|p| match RemotePath::new(p.as_str()) {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(path = %p, error = %e, "Ignoring invalid transfer path");
                    None
                }
            })
            .collect();

        Self {
            extensions,
            blacklist,
            min_file_size: config.min_file_size,
            transfer_paths,
        }
    }

    /// Decides whether `item` gets a placeholder under `remote_root`
    ///
    /// Checks run cheapest first: kind, location, extension, name keywords,
    /// then size.
    pub fn check(&self, item: &RemoteItem, remote_root: &RemotePath) -> Result<(), SkipReason> {
        if item.is_dir() {
            return Err(SkipReason::Directory);
        }
        if !item.path.is_under(remote_root) || item.path == *remote_root {
            return Err(SkipReason::OutsideRoot);
        }
        if self
            .transfer_paths
            .iter()
            .any(|transfer| item.path.is_under(transfer))
        {
            return Err(SkipReason::InTransfer);
        }

        let name = item.name.to_lowercase();
        let extension = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
        if !self.extensions.contains(extension) {
            return Err(SkipReason::Extension);
        }
        if self.blacklist.iter().any(|keyword| name.contains(keyword)) {
            return Err(SkipReason::Blacklisted);
        }
        if self.min_file_size > 0 && item.size() < self.min_file_size {
            return Err(SkipReason::TooSmall);
        }
        Ok(())
    }
}
