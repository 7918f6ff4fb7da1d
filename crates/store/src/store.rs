//! Key-value store trait and the SQLite implementation.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Flat, prefix-scannable store of JSON documents.
///
/// Counter documents are JSON objects carrying an integer `count` field.
/// The counter primitives are atomic per key on every backend, so concurrent
/// adjustments of one counter never lose updates.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch the value stored at `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Store `value` at `key`, replacing any existing value.
    async fn set(&self, key: &str, value: &Value) -> StoreResult<()>;

    /// Store `value` only if `key` is vacant. Returns whether it was written.
    async fn insert_if_absent(&self, key: &str, value: &Value) -> StoreResult<bool>;

    /// Remove `key`. Returns whether a value was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// All entries whose key starts with `prefix`, ordered by key.
    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Value)>>;

    /// Add one to the counter at `key` and return the new count.
    ///
    /// An absent counter is created from `seed` with `count` set to 1.
    async fn increment_counter(&self, key: &str, seed: &Value) -> StoreResult<i64>;

    /// Subtract one from the counter at `key`.
    ///
    /// Returns `None` when the counter is absent. A counter that reaches zero
    /// is removed; one already at or below zero is left untouched. Otherwise
    /// returns the resulting count.
    async fn decrement_counter(&self, key: &str) -> StoreResult<Option<i64>>;

    /// Create the backing schema if needed.
    async fn migrate(&self) -> StoreResult<()>;

    /// Check backend connectivity.
    async fn health_check(&self) -> StoreResult<()>;

    /// Fetch the value at `key`, failing with [`StoreError::NotFound`] if absent.
    async fn get_required(&self, key: &str) -> StoreResult<Value> {
        self.get(key)
            .await?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}

/// SQLite-backed store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path`.
    pub async fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        // A single connection serializes writers and avoids "database is locked".
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::info!(path = %path.display(), "Opened SQLite record store");
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let raw: Option<String> = sqlx::query_scalar("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        raw.map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn set(&self, key: &str, value: &Value) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO kv (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(serde_json::to_string(value)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_if_absent(&self, key: &str, value: &Value) -> StoreResult<bool> {
        let result =
            sqlx::query("INSERT INTO kv (key, value) VALUES (?, ?) ON CONFLICT(key) DO NOTHING")
                .bind(key)
                .bind(serde_json::to_string(value)?)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Value)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT key, value FROM kv WHERE substr(key, 1, length(?)) = ? ORDER BY key",
        )
        .bind(prefix)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(key, raw)| Ok((key, serde_json::from_str(&raw)?)))
            .collect()
    }

    async fn increment_counter(&self, key: &str, seed: &Value) -> StoreResult<i64> {
        let count: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO kv (key, value) VALUES (?, json_set(?, '$.count', 1))
            ON CONFLICT(key) DO UPDATE
            SET value = json_set(kv.value, '$.count',
                                 COALESCE(json_extract(kv.value, '$.count'), 0) + 1)
            RETURNING json_extract(value, '$.count')
            "#,
        )
        .bind(key)
        .bind(serde_json::to_string(seed)?)
        .fetch_one(&self.pool)
        .await?;

        count.ok_or_else(|| StoreError::Internal(format!("counter {key} has no count")))
    }

    async fn decrement_counter(&self, key: &str) -> StoreResult<Option<i64>> {
        let mut tx = self.pool.begin().await?;

        let decremented: Option<Option<i64>> = sqlx::query_scalar(
            r#"
            UPDATE kv
            SET value = json_set(value, '$.count', json_extract(value, '$.count') - 1)
            WHERE key = ? AND json_extract(value, '$.count') > 0
            RETURNING json_extract(value, '$.count')
            "#,
        )
        .bind(key)
        .fetch_optional(&mut *tx)
        .await?;

        let count = match decremented.flatten() {
            Some(0) => {
                sqlx::query("DELETE FROM kv WHERE key = ? AND json_extract(value, '$.count') = 0")
                    .bind(key)
                    .execute(&mut *tx)
                    .await?;
                Some(0)
            }
            Some(remaining) => Some(remaining),
            // Absent, or already at or below zero.
            None => {
                let current: Option<Option<i64>> = sqlx::query_scalar(
                    "SELECT json_extract(value, '$.count') FROM kv WHERE key = ?",
                )
                .bind(key)
                .fetch_optional(&mut *tx)
                .await?;
                current.map(|count| count.unwrap_or(0))
            }
        };

        tx.commit().await?;
        Ok(count)
    }

    async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
) WITHOUT ROWID
"#;
