//! Construction of directory trees from configuration

use std::path::PathBuf;
use std::sync::Arc;

use strmsync_core::config::{TreeBackend, TreeConfig};

use crate::kv::{KvStore, KvTree};
use crate::redis_store::RedisStore;
use crate::text::TextFileTree;
use crate::{DirectoryTree, TreeError};

#[derive(Debug, Clone)]
enum Backend {
    Text { work_dir: PathBuf },
    Kv { store: Arc<dyn KvStore> },
}

/// Creates fresh [`DirectoryTree`]s of one backend family
///
/// Every tree from the same factory can be compared with every other.
#[derive(Debug, Clone)]
pub struct TreeFactory {
    backend: Backend,
}

impl TreeFactory {
    /// Text-file trees under `work_dir`
    pub fn text(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::Text {
                work_dir: work_dir.into(),
            },
        }
    }

    /// Key-value trees in `store`
    pub fn kv(store: Arc<dyn KvStore>) -> Self {
        Self {
            backend: Backend::Kv { store },
        }
    }

    /// Builds the factory selected by the `tree` configuration section
    ///
    /// The redis backend connects immediately.
    pub fn from_config(config: &TreeConfig) -> Result<Self, TreeError> {
        match config.backend {
            TreeBackend::File => Ok(Self::text(&config.work_dir)),
            TreeBackend::Redis => {
                let url = config.redis_url.as_deref().ok_or_else(|| {
                    TreeError::Config("tree.redis_url is required for the redis backend".into())
                })?;
                Ok(Self::kv(Arc::new(RedisStore::open(url)?)))
            }
        }
    }

    /// Backend family of the trees this factory creates
    pub fn backend(&self) -> &'static str {
        match self.backend {
            Backend::Text { .. } => "text",
            Backend::Kv { .. } => "kv",
        }
    }

    /// Creates tree `name`, discarding anything a previous run left behind
    pub fn create(&self, name: &str) -> Result<DirectoryTree, TreeError> {
        let tree = match &self.backend {
            Backend::Text { work_dir } => DirectoryTree::Text(TextFileTree::new(name, work_dir)?),
            Backend::Kv { store } => DirectoryTree::Kv(KvTree::new(name, Arc::clone(store))?),
        };
        tree.clear()?;
        tracing::debug!(tree = name, backend = self.backend(), "Created directory tree");
        Ok(tree)
    }
}
