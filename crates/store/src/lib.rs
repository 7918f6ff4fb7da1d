//! Key-value record store for VaxTrack.
//!
//! Records and per-region counters live in one flat keyspace of JSON
//! documents (see [`vaxtrack_core::keys`]). Three backends implement
//! [`KvStore`]:
//! - SQLite for single-node deployments
//! - PostgreSQL for shared deployments
//! - an in-memory map for tests

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use store::{KvStore, SqliteStore};

use std::sync::Arc;
use vaxtrack_core::config::StoreConfig;

/// Create a store from configuration.
pub async fn from_config(config: &StoreConfig) -> StoreResult<Arc<dyn KvStore>> {
    match config {
        StoreConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store) as Arc<dyn KvStore>)
        }
        StoreConfig::Postgres {
            url,
            host,
            port,
            username,
            password,
            database,
            ssl_mode,
            max_connections,
            statement_timeout_ms,
        } => {
            let store = if let Some(url) = url {
                tracing::info!("Connecting to PostgreSQL using connection URL");
                PostgresStore::from_url(url, *max_connections, *statement_timeout_ms).await?
            } else if let (Some(host), Some(database)) = (host.as_ref(), database.as_ref()) {
                PostgresStore::from_params(
                    host,
                    port.unwrap_or(5432),
                    username.as_deref(),
                    password.as_deref(),
                    database,
                    *ssl_mode,
                    *max_connections,
                    *statement_timeout_ms,
                )
                .await?
            } else {
                return Err(StoreError::Config(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ));
            };
            Ok(Arc::new(store) as Arc<dyn KvStore>)
        }
        StoreConfig::Memory => {
            tracing::warn!("Using in-memory record store; records are lost on restart");
            Ok(Arc::new(MemoryStore::new()) as Arc<dyn KvStore>)
        }
    }
}
