//! Repository layer for database operations
//!
//! Implements the durable key-value store on SQLite.
//! Set writes run in a transaction under a process-wide write lock, which
//! gives per-key atomic read-modify-write across concurrent reconciliations.

use crate::error::Result;
use crate::storage::{KeyValueStore, SetUpdate};
use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Get a scalar preference
    pub async fn get_preference(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM preferences WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    /// Set a scalar preference
    pub async fn set_preference(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO preferences (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Set preference: {} = {}", key, value);
        Ok(())
    }

    async fn replace_members(
        tx: &mut Transaction<'_, Sqlite>,
        key: &str,
        values: &BTreeSet<String>,
    ) -> Result<()> {
        sqlx::query("DELETE FROM string_sets WHERE key = ?")
            .bind(key)
            .execute(&mut **tx)
            .await?;

        for value in values {
            sqlx::query("INSERT INTO string_sets (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut **tx)
                .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for Repository {
    async fn get_string_set(&self, key: &str) -> Result<BTreeSet<String>> {
        let values: Vec<String> = sqlx::query_scalar("SELECT value FROM string_sets WHERE key = ?")
            .bind(key)
            .fetch_all(&self.pool)
            .await?;

        Ok(values.into_iter().collect())
    }

    async fn put_string_set(&self, key: &str, values: &BTreeSet<String>) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut tx = self.pool.begin().await?;
        Self::replace_members(&mut tx, key, values).await?;
        tx.commit().await?;

        tracing::debug!("Stored {} value(s) under {}", values.len(), key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM string_sets WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM preferences WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::debug!("Removed key: {}", key);
        Ok(())
    }

    async fn update_string_set(&self, key: &str, update: SetUpdate) -> Result<BTreeSet<String>> {
        let _guard = self.write_lock.lock().await;

        let mut tx = self.pool.begin().await?;

        let current: Vec<String> = sqlx::query_scalar("SELECT value FROM string_sets WHERE key = ?")
            .bind(key)
            .fetch_all(&mut *tx)
            .await?;

        let mut values: BTreeSet<String> = current.into_iter().collect();
        update(&mut values);

        Self::replace_members(&mut tx, key, &values).await?;
        tx.commit().await?;

        Ok(values)
    }

    async fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        let value = self.get_preference(key).await?;
        Ok(value.map(|v| v == "true").unwrap_or(default))
    }

    async fn put_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set_preference(key, if value { "true" } else { "false" })
            .await
    }
}
