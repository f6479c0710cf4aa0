//! State database for deletion stability records
//!
//! `state.database` names either a SQLite file or `:memory:`. Opening applies
//! the embedded schema and stamps it into `PRAGMA user_version`. A database
//! stamped by a newer schema is refused instead of being written with an
//! older layout.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use strmsync_core::config::StateConfig;

use crate::CacheError;

const SCHEMA: &str = include_str!("migrations/20261019_initial.sql");

/// Version stamped into `user_version` once [`SCHEMA`] is applied
pub const SCHEMA_VERSION: i64 = 1;

/// `state.database` value selecting a private in-memory database
pub const IN_MEMORY: &str = ":memory:";

/// Connection pool over the state database
///
/// File databases use WAL journaling so the CLI can read state while a sync
/// runs. An in-memory database keeps a single connection, as each SQLite
/// in-memory connection is a separate database.
pub struct DatabasePool {
    pool: SqlitePool,
    in_memory: bool,
}

impl std::fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabasePool")
            .field("in_memory", &self.in_memory)
            .field("connections", &self.pool.size())
            .finish()
    }
}

impl DatabasePool {
    /// Opens the database configured in the `state` section
    pub async fn from_config(config: &StateConfig) -> Result<Self, CacheError> {
        Self::new(&config.database).await
    }

    /// Opens `db_path`, or a private in-memory database for [`IN_MEMORY`]
    ///
    /// # Errors
    ///
    /// `CacheError::ConnectionFailed` if the directory or connection cannot
    /// be set up, `CacheError::MigrationFailed` if the schema cannot be
    /// applied or the file carries a newer schema version.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        let in_memory = db_path.as_os_str() == IN_MEMORY;
        let pool = if in_memory {
            connect_memory().await?
        } else {
            connect_file(db_path).await?
        };

        let previous = apply_schema(&pool).await?;
        info!(
            database = %db_path.display(),
            schema_version = SCHEMA_VERSION,
            previous_version = previous,
            "State database ready"
        );
        Ok(Self { pool, in_memory })
    }

    /// Private in-memory database, used by tests
    pub async fn in_memory() -> Result<Self, CacheError> {
        Self::new(Path::new(IN_MEMORY)).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    /// Schema version currently stamped in the database
    pub async fn schema_version(&self) -> Result<i64, CacheError> {
        read_version(&self.pool).await
    }
}

async fn connect_file(path: &Path) -> Result<SqlitePool, CacheError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            CacheError::ConnectionFailed(format!(
                "Cannot create state directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| {
            CacheError::ConnectionFailed(format!(
                "Cannot open state database {}: {}",
                path.display(),
                e
            ))
        })
}

async fn connect_memory() -> Result<SqlitePool, CacheError> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .map_err(|e| CacheError::ConnectionFailed(format!("Cannot open in-memory state: {}", e)))
}

async fn read_version(pool: &SqlitePool) -> Result<i64, CacheError> {
    sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .map_err(|e| CacheError::MigrationFailed(format!("Cannot read schema version: {}", e)))
}

/// Applies [`SCHEMA`] and returns the version found before
///
/// Every statement is `IF NOT EXISTS`, so reapplying is harmless.
async fn apply_schema(pool: &SqlitePool) -> Result<i64, CacheError> {
    let found = read_version(pool).await?;
    if found > SCHEMA_VERSION {
        return Err(CacheError::MigrationFailed(format!(
            "State database has schema version {}, newer than supported version {}",
            found, SCHEMA_VERSION
        )));
    }

    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| CacheError::MigrationFailed(format!("Cannot apply state schema: {}", e)))?;

    if found < SCHEMA_VERSION {
        let stamp = format!("PRAGMA user_version = {}", SCHEMA_VERSION);
        sqlx::raw_sql(&stamp)
            .execute(pool)
            .await
            .map_err(|e| CacheError::MigrationFailed(format!("Cannot stamp schema version: {}", e)))?;
        debug!(from = found, to = SCHEMA_VERSION, "State schema upgraded");
    }
    Ok(found)
}
