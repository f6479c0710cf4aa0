//! SQLite implementation of IStabilityStore
//!
//! One row per sync scope. `counts` holds the recent candidate-deletion
//! counts as a JSON array (oldest first) and `updated_at` an RFC 3339
//! timestamp of the last write.

use chrono::Utc;
use sqlx::SqlitePool;

use strmsync_core::domain::ScopeKey;
use strmsync_core::ports::IStabilityStore;

use crate::CacheError;

/// SQLite-backed deletion-count history
#[derive(Debug, Clone)]
pub struct SqliteStabilityStore {
    pool: SqlitePool,
}

impl SqliteStabilityStore {
    /// Creates a store over the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Decode the stored JSON array
fn counts_from_json(scope: &ScopeKey, raw: &str) -> Result<Vec<u64>, CacheError> {
    serde_json::from_str(raw).map_err(|e| {
        CacheError::SerializationError(format!(
            "Invalid counts for scope {}: {}",
            scope.as_str(),
            e
        ))
    })
}

#[async_trait::async_trait]
impl IStabilityStore for SqliteStabilityStore {
    async fn load_counts(&self, scope: &ScopeKey) -> anyhow::Result<Vec<u64>> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT counts FROM stability_records WHERE scope = ?")
                .bind(scope.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(CacheError::from)?;

        match raw {
            Some(raw) => Ok(counts_from_json(scope, &raw)?),
            None => Ok(Vec::new()),
        }
    }

    async fn save_counts(&self, scope: &ScopeKey, counts: &[u64]) -> anyhow::Result<()> {
        let encoded = serde_json::to_string(counts)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO stability_records (scope, counts, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(scope) DO UPDATE SET counts = excluded.counts, \
             updated_at = excluded.updated_at",
        )
        .bind(scope.as_str())
        .bind(&encoded)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(CacheError::from)?;

        tracing::trace!(scope = scope.as_str(), counts = %encoded, "Saved stability record");
        Ok(())
    }

    async fn clear_counts(&self, scope: &ScopeKey) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM stability_records WHERE scope = ?")
            .bind(scope.as_str())
            .execute(&self.pool)
            .await
            .map_err(CacheError::from)?;

        tracing::trace!(scope = scope.as_str(), "Cleared stability record");
        Ok(())
    }
}
