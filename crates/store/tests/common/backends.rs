//! Store backends for tests.

use std::sync::Arc;
use tempfile::TempDir;
use testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use vaxtrack_store::{KvStore, MemoryStore, PostgresStore, SqliteStore, StoreError, StoreResult};

/// Stable prefix for Docker/container startup failures in Postgres test setup.
pub const POSTGRES_CONTAINER_START_ERR_PREFIX: &str = "postgres-container-start:";

/// SQLite store in a temporary directory, removed on drop.
pub struct TestSqlite {
    pub store: Arc<SqliteStore>,
    _temp_dir: TempDir,
}

impl TestSqlite {
    pub async fn new() -> StoreResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let store = SqliteStore::new(temp_dir.path().join("test.db")).await?;
        Ok(Self {
            store: Arc::new(store),
            _temp_dir: temp_dir,
        })
    }

    pub fn store(&self) -> Arc<dyn KvStore> {
        self.store.clone()
    }
}

/// PostgreSQL store backed by a testcontainer.
pub struct TestPostgres {
    pub store: Arc<PostgresStore>,
    _container: ContainerAsync<Postgres>,
}

impl TestPostgres {
    pub async fn new() -> StoreResult<Self> {
        let container = Postgres::default()
            .with_tag("15-alpine")
            .start()
            .await
            .map_err(|e| {
                StoreError::Internal(format!(
                    "{} Failed to start PostgreSQL container: {e}",
                    POSTGRES_CONTAINER_START_ERR_PREFIX
                ))
            })?;

        let host = container.get_host().await.expect("Failed to get host");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("Failed to get port");

        let url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);
        let store = PostgresStore::from_url(&url, 5, None).await?;

        Ok(Self {
            store: Arc::new(store),
            _container: container,
        })
    }

    pub fn store(&self) -> Arc<dyn KvStore> {
        self.store.clone()
    }
}

/// Run a test against the memory, SQLite and PostgreSQL backends.
///
/// PostgreSQL is skipped when `SKIP_POSTGRES_TESTS` is set or Docker is
/// unavailable.
pub async fn run_store_test_all<F, Fut>(test_fn: F)
where
    F: Fn(Arc<dyn KvStore>) -> Fut + Clone,
    Fut: std::future::Future<Output = ()>,
{
    test_fn.clone()(Arc::new(MemoryStore::new())).await;

    let sqlite = TestSqlite::new()
        .await
        .expect("Failed to create SQLite test store");
    test_fn.clone()(sqlite.store()).await;

    if std::env::var("SKIP_POSTGRES_TESTS").is_err() {
        match TestPostgres::new().await {
            Ok(postgres) => test_fn(postgres.store()).await,
            Err(err) => eprintln!("Skipping PostgreSQL store tests: {err}"),
        }
    }
}
