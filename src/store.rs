//! Title store: key-existence persistence for archived titles.
//!
//! The archival path only needs two operations, existence check and
//! insert, so the store is a small trait with a SQLite implementation
//! for deployments and an in-memory implementation for tests.

use std::path::Path;

use async_trait::async_trait;
use dashmap::DashSet;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::instrument;

/// Maximum connections in the SQLite pool. Kept low since SQLite uses
/// file-level locking.
const MAX_CONNECTIONS: u32 = 5;

/// Title store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database failure.
    #[error("title store database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Existence-keyed store of normalized titles.
#[async_trait]
pub trait TitleStore: Send + Sync {
    /// True when the normalized title was archived before.
    async fn exists(&self, title: &str) -> Result<bool, StoreError>;

    /// Records a normalized title as archived.
    async fn insert(&self, title: &str) -> Result<(), StoreError>;
}

/// SQLite-backed title store.
#[derive(Debug, Clone)]
pub struct SqliteTitleStore {
    pool: SqlitePool,
}

impl SqliteTitleStore {
    /// Opens (creating if needed) a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection or schema
    /// setup fails.
    #[instrument(skip(path), fields(path = %path.display()))]
    pub async fn new(path: &Path) -> Result<Self, StoreError> {
        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(&url)
            .await?;
        Self::init(pool).await
    }

    /// Creates an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    #[instrument]
    pub async fn new_in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query("CREATE TABLE IF NOT EXISTS archived_titles (title TEXT PRIMARY KEY)")
            .execute(&pool)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl TitleStore for SqliteTitleStore {
    async fn exists(&self, title: &str) -> Result<bool, StoreError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM archived_titles WHERE title = ?")
                .bind(title)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn insert(&self, title: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT OR IGNORE INTO archived_titles (title) VALUES (?)")
            .bind(title)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// In-memory title store used by tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryTitleStore {
    titles: DashSet<String>,
}

impl MemoryTitleStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TitleStore for MemoryTitleStore {
    async fn exists(&self, title: &str) -> Result<bool, StoreError> {
        Ok(self.titles.contains(title))
    }

    async fn insert(&self, title: &str) -> Result<(), StoreError> {
        self.titles.insert(title.to_string());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryTitleStore::new();
        assert!(!store.exists("dune").await.unwrap());
        store.insert("dune").await.unwrap();
        assert!(store.exists("dune").await.unwrap());
    }

    #[tokio::test]
    async fn test_sqlite_store_roundtrip() {
        let store = SqliteTitleStore::new_in_memory().await.unwrap();
        assert!(!store.exists("dune").await.unwrap());
        store.insert("dune").await.unwrap();
        assert!(store.exists("dune").await.unwrap());
        // Insert is idempotent.
        store.insert("dune").await.unwrap();
        assert!(store.exists("dune").await.unwrap());
    }
}
