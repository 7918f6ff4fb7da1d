//! PostgreSQL-backed store.

use crate::error::{StoreError, StoreResult};
use crate::store::KvStore;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::types::Json;
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use vaxtrack_core::config::PgSslMode;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value JSONB NOT NULL
)
"#;

/// PostgreSQL-backed store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Connect using a full connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> StoreResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Connect using individual parameters, so the password can come from
    /// its own environment variable.
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> StoreResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> StoreResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl KvStore for PostgresStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let value: Option<Json<Value>> = sqlx::query_scalar("SELECT value FROM kv WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.map(|Json(v)| v))
    }

    async fn set(&self, key: &str, value: &Value) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO kv (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(key)
        .bind(Json(value))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_if_absent(&self, key: &str, value: &Value) -> StoreResult<bool> {
        let result =
            sqlx::query("INSERT INTO kv (key, value) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING")
                .bind(key)
                .bind(Json(value))
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM kv WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Value)>> {
        let rows: Vec<(String, Json<Value>)> = sqlx::query_as(
            "SELECT key, value FROM kv \
             WHERE substr(key, 1, length($1)) = $1 \
             ORDER BY key COLLATE \"C\"",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(key, Json(value))| (key, value)).collect())
    }

    async fn increment_counter(&self, key: &str, seed: &Value) -> StoreResult<i64> {
        let count: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO kv (key, value) VALUES ($1, jsonb_set($2, '{count}', '1'::jsonb))
            ON CONFLICT (key) DO UPDATE
            SET value = jsonb_set(kv.value, '{count}',
                                  to_jsonb(COALESCE((kv.value->>'count')::bigint, 0) + 1))
            RETURNING (value->>'count')::bigint
            "#,
        )
        .bind(key)
        .bind(Json(seed))
        .fetch_one(&self.pool)
        .await?;

        count.ok_or_else(|| StoreError::Internal(format!("counter {key} has no count")))
    }

    async fn decrement_counter(&self, key: &str) -> StoreResult<Option<i64>> {
        let mut tx = self.pool.begin().await?;

        let decremented: Option<Option<i64>> = sqlx::query_scalar(
            r#"
            UPDATE kv
            SET value = jsonb_set(value, '{count}', to_jsonb((value->>'count')::bigint - 1))
            WHERE key = $1 AND (value->>'count')::bigint > 0
            RETURNING (value->>'count')::bigint
            "#,
        )
        .bind(key)
        .fetch_optional(&mut *tx)
        .await?;

        let count = match decremented.flatten() {
            Some(0) => {
                sqlx::query("DELETE FROM kv WHERE key = $1 AND (value->>'count')::bigint = 0")
                    .bind(key)
                    .execute(&mut *tx)
                    .await?;
                Some(0)
            }
            Some(remaining) => Some(remaining),
            None => {
                let current: Option<Option<i64>> =
                    sqlx::query_scalar("SELECT (value->>'count')::bigint FROM kv WHERE key = $1")
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
