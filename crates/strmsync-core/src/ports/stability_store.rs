//! Stability record port (driven/secondary port)
//!
//! Persists, per sync scope, the most recent candidate-deletion counts used
//! by the deletion safety gate. Implemented by `strmsync-cache` on SQLite.

use async_trait::async_trait;

use crate::domain::newtypes::ScopeKey;

/// Port trait for persisted deletion-count history
#[async_trait]
pub trait IStabilityStore: Send + Sync {
    /// Load the recorded counts for `scope`, oldest first
    ///
    /// An unknown scope yields an empty history.
    async fn load_counts(&self, scope: &ScopeKey) -> anyhow::Result<Vec<u64>>;

    /// Replace the recorded counts for `scope`
    async fn save_counts(&self, scope: &ScopeKey, counts: &[u64]) -> anyhow::Result<()>;

    /// Forget the history for `scope`
    async fn clear_counts(&self, scope: &ScopeKey) -> anyhow::Result<()>;
}
