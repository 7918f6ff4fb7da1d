//! In-process store for tests and throwaway deployments.

use crate::error::{StoreError, StoreResult};
use crate::store::KvStore;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Ordered in-memory map. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn count_of(value: &Value) -> i64 {
    value.get("count").and_then(Value::as_i64).unwrap_or(0)
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &Value) -> StoreResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn insert_if_absent(&self, key: &str, value: &Value) -> StoreResult<bool> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.clone());
        Ok(true)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Value)>> {
        let entries = self.entries.read().await;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    async fn increment_counter(&self, key: &str, seed: &Value) -> StoreResult<i64> {
        if !seed.is_object() {
            return Err(StoreError::Internal(format!("counter seed for {key} is not an object")));
        }
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key.to_string()).or_insert_with(|| {
            let mut seed = seed.clone();
            seed["count"] = json!(0);
            seed
        });
        let Some(fields) = entry.as_object_mut() else {
            return Err(StoreError::Internal(format!("counter {key} is not an object")));
        };
        let count = fields.get("count").and_then(Value::as_i64).unwrap_or(0) + 1;
        fields.insert("count".to_string(), json!(count));
        Ok(count)
    }

    async fn decrement_counter(&self, key: &str) -> StoreResult<Option<i64>> {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(key) else {
            return Ok(None);
        };

        let current = count_of(entry);
        if current <= 0 {
            return Ok(Some(current));
        }
        if current == 1 {
            entries.remove(key);
            return Ok(Some(0));
        }
        entry["count"] = json!(current - 1);
        Ok(Some(current - 1))
    }

    async fn migrate(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}
