//! Integration tests for SqliteStabilityStore
//!
//! Each test creates a fresh in-memory database to keep tests isolated.

use std::path::Path;

use strmsync_cache::{DatabasePool, SqliteStabilityStore};
use strmsync_core::domain::{RemotePath, ScopeKey};
use strmsync_core::ports::IStabilityStore;

// ============================================================================
// Test helpers
// ============================================================================

async fn setup() -> (DatabasePool, SqliteStabilityStore) {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let store = SqliteStabilityStore::new(pool.pool().clone());
    (pool, store)
}

fn scope(local: &str, remote: &str) -> ScopeKey {
    ScopeKey::from_pair(Path::new(local), &RemotePath::new(remote).unwrap())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_unknown_scope_is_empty() {
    let (_pool, store) = setup().await;
    let counts = store.load_counts(&scope("/mnt/strm", "/Movies")).await.unwrap();
    assert!(counts.is_empty());
}

#[tokio::test]
async fn test_save_and_load_counts() {
    let (_pool, store) = setup().await;
    let key = scope("/mnt/strm", "/Movies");

    store.save_counts(&key, &[50, 51]).await.unwrap();
    assert_eq!(store.load_counts(&key).await.unwrap(), vec![50, 51]);
}

#[tokio::test]
async fn test_save_replaces_previous_counts() {
    let (_pool, store) = setup().await;
    let key = scope("/mnt/strm", "/Movies");

    store.save_counts(&key, &[10]).await.unwrap();
    store.save_counts(&key, &[10, 500, 5]).await.unwrap();
    assert_eq!(store.load_counts(&key).await.unwrap(), vec![10, 500, 5]);
}

#[tokio::test]
async fn test_scopes_are_independent() {
    let (_pool, store) = setup().await;
    let movies = scope("/mnt/strm", "/Movies");
    let shows = scope("/mnt/strm", "/Shows");

    store.save_counts(&movies, &[1, 2]).await.unwrap();
    store.save_counts(&shows, &[7]).await.unwrap();
    store.clear_counts(&movies).await.unwrap();

    assert!(store.load_counts(&movies).await.unwrap().is_empty());
    assert_eq!(store.load_counts(&shows).await.unwrap(), vec![7]);
}

#[tokio::test]
async fn test_clear_unknown_scope_is_ok() {
    let (_pool, store) = setup().await;
    store.clear_counts(&scope("/x", "/y")).await.unwrap();
}

#[tokio::test]
async fn test_updated_at_is_rfc3339() {
    let (pool, store) = setup().await;
    let key = scope("/mnt/strm", "/Movies");
    store.save_counts(&key, &[3]).await.unwrap();

    let updated_at: String =
        sqlx::query_scalar("SELECT updated_at FROM stability_records WHERE scope = ?")
            .bind(key.as_str())
            .fetch_one(pool.pool())
            .await
            .unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(&updated_at).is_ok());
}

#[tokio::test]
async fn test_corrupt_counts_surface_as_error() {
    let (pool, store) = setup().await;
    let key = scope("/mnt/strm", "/Movies");
    sqlx::query("INSERT INTO stability_records (scope, counts, updated_at) VALUES (?, ?, ?)")
        .bind(key.as_str())
        .bind("not json")
        .bind("2026-01-01T00:00:00Z")
        .execute(pool.pool())
        .await
        .unwrap();

    assert!(store.load_counts(&key).await.is_err());
}

#[tokio::test]
async fn test_history_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("state.db");
    let key = scope("/mnt/strm", "/Movies");

    {
        let pool = DatabasePool::new(&db_path).await.unwrap();
        let store = SqliteStabilityStore::new(pool.pool().clone());
        store.save_counts(&key, &[50, 50]).await.unwrap();
        pool.pool().close().await;
    }

    let pool = DatabasePool::new(&db_path).await.unwrap();
    let store = SqliteStabilityStore::new(pool.pool().clone());
    assert_eq!(store.load_counts(&key).await.unwrap(), vec![50, 50]);
}
