//! strmsync Cache - In-process caches and local state persistence
//!
//! Provides:
//! - The content-address cache mapping remote paths to identifiers and
//!   identifiers to paths and metadata
//! - SQLite persistence for the deletion gate's stability records
//!
//! ## Architecture
//!
//! [`SqliteStabilityStore`] implements the `IStabilityStore` port from
//! `strmsync-core`; it is a driven (secondary) adapter. The
//! [`ContentAddressCache`] is a plain injectable object, constructed per
//! sync service and shared by every enumeration worker.
//!
//! ## Key Components
//!
//! - [`ContentAddressCache`] - TTL and capacity bounded bidirectional cache
//! - [`DatabasePool`] - State database pool with versioned schema
//! - [`SqliteStabilityStore`] - `IStabilityStore` implementation
//! - [`CacheError`] - Error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use strmsync_cache::{DatabasePool, SqliteStabilityStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/strmsync/state.db")).await?;
//! let store = SqliteStabilityStore::new(pool.pool().clone());
//! // Use store as IStabilityStore...
//! # Ok(())
//! # }
//! ```

pub mod content;
pub mod pool;
pub mod stability;

pub use content::ContentAddressCache;
pub use pool::{DatabasePool, IN_MEMORY, SCHEMA_VERSION};
pub use stability::SqliteStabilityStore;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization or deserialization of stored values failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::MigrationFailed("syntax error".into());
        assert_eq!(err.to_string(), "Migration failed: syntax error");
    }

    #[test]
    fn test_from_sqlx_error() {
        let err: CacheError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, CacheError::QueryFailed(_)));
    }
}
