//! Application state shared across handlers.

use crate::notify::NotificationQueue;
use crate::records::RecordManager;
use std::sync::Arc;
use vaxtrack_core::config::AppConfig;
use vaxtrack_store::KvStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Record store backend.
    pub store: Arc<dyn KvStore>,
    /// Record lifecycle manager; the only writer of records and counters.
    pub records: Arc<RecordManager>,
    /// Normalized SHA-256 hex digest of the shared API token.
    pub token_hash: Arc<str>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn KvStore>,
        notifications: NotificationQueue,
    ) -> Self {
        let records = RecordManager::new(store.clone(), notifications);
        Self::with_records(config, store, records)
    }

    /// Create a state around an existing record manager.
    pub fn with_records(
        config: AppConfig,
        store: Arc<dyn KvStore>,
        records: RecordManager,
    ) -> Self {
        let token_hash: Arc<str> = Arc::from(config.auth.normalized_hash());
        Self {
            config: Arc::new(config),
            store,
            records: Arc::new(records),
            token_hash,
        }
    }

    /// Maximum accepted request body size.
    pub fn max_body_bytes(&self) -> usize {
        self.config.server.max_body_bytes
    }
}
