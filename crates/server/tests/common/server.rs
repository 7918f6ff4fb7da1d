//! Server test utilities.

use std::sync::Arc;
use tempfile::TempDir;
use vaxtrack_core::config::{AppConfig, StoreConfig};
use vaxtrack_server::{AppState, NotificationQueue, RecordManager, create_router};
use vaxtrack_store::{KvStore, SqliteStore};

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server backed by a temporary SQLite database.
    pub async fn new() -> Self {
        Self::build(|_| {}, NotificationQueue::disabled()).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        Self::build(modifier, NotificationQueue::disabled()).await
    }

    /// Create a test server that hands confirmation emails to `notifications`.
    pub async fn with_notifications(notifications: NotificationQueue) -> Self {
        Self::build(|_| {}, notifications).await
    }

    async fn build<F>(modifier: F, notifications: NotificationQueue) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("vaxtrack.db");

        let store: Arc<dyn KvStore> = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .expect("Failed to create record store"),
        );

        let mut config = AppConfig::for_testing();
        config.store = StoreConfig::Sqlite { path: db_path };
        modifier(&mut config);

        let records = RecordManager::new(store.clone(), notifications);
        let state = AppState::with_records(config, store, records);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying store.
    pub fn store(&self) -> Arc<dyn KvStore> {
        self.state.store.clone()
    }

    /// Current value of the counter at `key`, if present.
    pub async fn counter(&self, key: &str) -> Option<i64> {
        self.store()
            .get(key)
            .await
            .expect("Failed to read counter")
            .and_then(|value| value["count"].as_i64())
    }
}
