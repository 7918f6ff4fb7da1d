//! Record lifecycle: registration, lookup, deletion, bulk import and
//! dashboard statistics.
//!
//! Every write to `vaccination:*` goes through [`RecordManager`], which keeps
//! the `state:*` and `district:*` counters in step with the live record set.
//! Counter updates use the store's atomic increment and decrement, so
//! concurrent requests never lose a count. The record write and its two
//! counter updates are still three separate store operations.

use crate::error::{ApiError, ApiResult};
use crate::metrics::{
    BULK_IMPORT_ERRORS, CERT_ID_COLLISIONS, RECORDS_DELETED, RECORDS_IMPORTED, RECORDS_REGISTERED,
};
use crate::notify::NotificationQueue;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use time::OffsetDateTime;
use vaxtrack_core::keys::{
    DISTRICT_PREFIX, RECORD_PREFIX, STATE_PREFIX, district_key, record_key, state_key,
};
use vaxtrack_core::{
    CertId, CertIdSource, DashboardStats, DistrictCounter, MAX_CERT_ID_ATTEMPTS, RandomCertIds,
    RecordDraft, RecordPayload, StateCounter, VaccinationRecord,
};
use vaxtrack_store::KvStore;

/// Outcome of a bulk import.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub errors: usize,
}

impl ImportSummary {
    pub fn message(&self) -> String {
        format!("Inserted {} records, {} errors", self.inserted, self.errors)
    }
}

/// Owner of the record keyspace and its derived counters.
pub struct RecordManager {
    store: Arc<dyn KvStore>,
    cert_ids: Arc<dyn CertIdSource>,
    notifications: NotificationQueue,
}

impl RecordManager {
    pub fn new(store: Arc<dyn KvStore>, notifications: NotificationQueue) -> Self {
        Self::with_cert_ids(store, Arc::new(RandomCertIds), notifications)
    }

    /// Create a manager that draws candidate IDs from `cert_ids`.
    pub fn with_cert_ids(
        store: Arc<dyn KvStore>,
        cert_ids: Arc<dyn CertIdSource>,
        notifications: NotificationQueue,
    ) -> Self {
        Self {
            store,
            cert_ids,
            notifications,
        }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Validate `payload`, assign it a fresh certificate ID and persist it.
    ///
    /// The confirmation email is queued after the record and counters are
    /// written; queueing never fails the registration.
    pub async fn register(&self, payload: RecordPayload) -> ApiResult<VaccinationRecord> {
        let draft = payload.into_registration()?;
        let record = self.claim_cert_id(draft, OffsetDateTime::now_utc()).await?;
        self.increment_counters(&record).await?;

        RECORDS_REGISTERED.inc();
        tracing::info!(
            cert_id = %record.cert_id,
            state = %record.state,
            district = %record.district,
            "Registered vaccination record"
        );

        self.notifications.enqueue(&record);
        Ok(record)
    }

    /// Try candidates until one is claimed with an atomic insert-if-absent.
    async fn claim_cert_id(
        &self,
        draft: RecordDraft,
        created_at: OffsetDateTime,
    ) -> ApiResult<VaccinationRecord> {
        for attempt in 1..=MAX_CERT_ID_ATTEMPTS {
            let record = draft
                .clone()
                .into_record(self.cert_ids.next_candidate(), created_at);
            let value = serde_json::to_value(&record).map_err(vaxtrack_core::Error::from)?;

            if self
                .store
                .insert_if_absent(&record_key(&record.cert_id), &value)
                .await?
            {
                return Ok(record);
            }

            CERT_ID_COLLISIONS.inc();
            tracing::debug!(cert_id = %record.cert_id, attempt, "Certificate ID already taken");
        }

        tracing::error!(
            attempts = MAX_CERT_ID_ATTEMPTS,
            "Could not allocate a unique certificate ID"
        );
        Err(vaxtrack_core::Error::GenerationExhausted {
            attempts: MAX_CERT_ID_ATTEMPTS,
        }
        .into())
    }

    /// Look up a record by certificate ID.
    pub async fn get(&self, cert_id: &str) -> ApiResult<VaccinationRecord> {
        let cert_id = CertId::new(cert_id)?;
        let value = self.store.get_required(&record_key(&cert_id)).await?;
        decode(value)
    }

    /// Every stored record, ordered by certificate ID.
    pub async fn list(&self) -> ApiResult<Vec<VaccinationRecord>> {
        self.scan(RECORD_PREFIX).await
    }

    /// Remove a record and decrement its counters. Returns the removed record.
    ///
    /// An entry that no longer decodes is still removed, but its counters
    /// cannot be located and are left as they are; `None` is returned then.
    pub async fn delete(&self, cert_id: &str) -> ApiResult<Option<VaccinationRecord>> {
        let cert_id = CertId::new(cert_id)?;
        let key = record_key(&cert_id);

        let value = self.store.get_required(&key).await?;
        let record = match serde_json::from_value::<VaccinationRecord>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(
                    cert_id = %cert_id,
                    error = %e,
                    "Removing unreadable record; counters not adjusted"
                );
                None
            }
        };

        // A concurrent delete may have won; only the one that removed the
        // key adjusts the counters.
        if !self.store.delete(&key).await? {
            return Err(record_not_found(&cert_id));
        }

        if let Some(record) = &record {
            self.decrement_counter(&state_key(&record.state)).await?;
            self.decrement_counter(&district_key(&record.state, &record.district))
                .await?;
        }

        RECORDS_DELETED.inc();
        tracing::info!(cert_id = %cert_id, "Deleted vaccination record");
        Ok(record)
    }

    /// Insert pre-identified records one at a time.
    ///
    /// Invalid elements and elements whose certificate ID is already taken
    /// are skipped and counted as errors. Nothing is overwritten and no
    /// confirmation emails are sent.
    pub async fn import(&self, records: Vec<Value>) -> ImportSummary {
        let mut summary = ImportSummary::default();

        for (index, value) in records.into_iter().enumerate() {
            match self.import_one(value).await {
                Ok(()) => summary.inserted += 1,
                Err(e) => {
                    summary.errors += 1;
                    if e.status_code().is_server_error() {
                        tracing::error!(index, error = %e, "Bulk import element failed");
                    } else {
                        tracing::warn!(index, error = %e, "Bulk import element skipped");
                    }
                }
            }
        }

        RECORDS_IMPORTED.inc_by(summary.inserted as u64);
        BULK_IMPORT_ERRORS.inc_by(summary.errors as u64);
        tracing::info!(
            inserted = summary.inserted,
            errors = summary.errors,
            "Bulk import finished"
        );
        summary
    }

    async fn import_one(&self, value: Value) -> ApiResult<()> {
        let payload: RecordPayload = serde_json::from_value(value)
            .map_err(|e| ApiError::Validation(format!("invalid record: {e}")))?;
        let (cert_id, draft) = payload.into_import()?;
        let record = draft.into_record(cert_id, OffsetDateTime::now_utc());
        let value = serde_json::to_value(&record).map_err(vaxtrack_core::Error::from)?;

        if !self
            .store
            .insert_if_absent(&record_key(&record.cert_id), &value)
            .await?
        {
            return Err(ApiError::Validation(format!(
                "record {} already exists",
                record.cert_id
            )));
        }

        self.increment_counters(&record).await
    }

    /// Aggregate statistics over the full record set and both counter families.
    pub async fn dashboard(&self) -> ApiResult<DashboardStats> {
        let records: Vec<VaccinationRecord> = self.scan(RECORD_PREFIX).await?;
        let states: Vec<StateCounter> = self.scan(STATE_PREFIX).await?;
        let districts: Vec<DistrictCounter> = self.scan(DISTRICT_PREFIX).await?;
        Ok(DashboardStats::aggregate(&records, states, districts))
    }

    async fn increment_counters(&self, record: &VaccinationRecord) -> ApiResult<()> {
        let state_seed = serde_json::to_value(StateCounter::seed(&record.state))
            .map_err(vaxtrack_core::Error::from)?;
        self.store
            .increment_counter(&state_key(&record.state), &state_seed)
            .await?;

        let district_seed =
            serde_json::to_value(DistrictCounter::seed(&record.state, &record.district))
                .map_err(vaxtrack_core::Error::from)?;
        self.store
            .increment_counter(
                &district_key(&record.state, &record.district),
                &district_seed,
            )
            .await?;
        Ok(())
    }

    async fn decrement_counter(&self, key: &str) -> ApiResult<()> {
        match self.store.decrement_counter(key).await? {
            None => tracing::warn!(key, "Counter missing while deleting record"),
            Some(count) if count < 0 => tracing::warn!(key, count, "Counter below zero"),
            Some(_) => {}
        }
        Ok(())
    }

    /// Decode every entry under `prefix`, skipping entries that fail to parse.
    async fn scan<T: DeserializeOwned>(&self, prefix: &str) -> ApiResult<Vec<T>> {
        let entries = self.store.scan_prefix(prefix).await?;
        let mut items = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match serde_json::from_value(value) {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!(key = %key, error = %e, "Skipping unreadable entry"),
            }
        }
        Ok(items)
    }
}

fn record_not_found(cert_id: &CertId) -> ApiError {
    ApiError::NotFound(format!("record {cert_id} not found"))
}

fn decode(value: Value) -> ApiResult<VaccinationRecord> {
    serde_json::from_value(value).map_err(|e| vaxtrack_core::Error::from(e).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use time::macros::date;
    use vaxtrack_store::MemoryStore;

    /// Hands out a fixed sequence of candidates.
    struct ScriptedCertIds(Mutex<VecDeque<CertId>>);

    impl ScriptedCertIds {
        fn new(ids: impl IntoIterator<Item = CertId>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(ids.into_iter().collect())))
        }
    }

    impl CertIdSource for ScriptedCertIds {
        fn next_candidate(&self) -> CertId {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .expect("script ran out of candidates")
        }
    }

    fn candidate(n: u32) -> CertId {
        CertId::from_parts(date!(2025 - 03 - 01), n)
    }

    fn payload(vaccine: &str, state: &str, district: &str) -> RecordPayload {
        serde_json::from_value(json!({
            "name": "Meera Iyer",
            "email": "meera@example.com",
            "state": state,
            "district": district,
            "vaccineType": vaccine,
            "dose": "1",
            "dateAdministered": "2025-03-01"
        }))
        .unwrap()
    }

    fn import_value(cert_id: &str, state: &str) -> Value {
        json!({
            "certId": cert_id,
            "name": "Imported",
            "state": state,
            "district": "Central",
            "vaccineType": "Moderna",
            "dose": 2,
            "dateAdministered": "2024-11-20"
        })
    }

    fn manager() -> RecordManager {
        RecordManager::new(Arc::new(MemoryStore::new()), NotificationQueue::disabled())
    }

    async fn count(store: &Arc<dyn KvStore>, key: &str) -> Option<i64> {
        store
            .get(key)
            .await
            .unwrap()
            .map(|value| value["count"].as_i64().unwrap())
    }

    #[tokio::test]
    async fn register_persists_record_and_counters() {
        let manager = manager();
        let record = manager
            .register(payload("Covishield", "Kerala", "Kochi"))
            .await
            .unwrap();

        assert!(CertId::parse(record.cert_id.as_str()).is_ok());
        assert_eq!(manager.get(record.cert_id.as_str()).await.unwrap(), record);
        assert_eq!(count(manager.store(), "state:Kerala").await, Some(1));
        assert_eq!(count(manager.store(), "district:Kerala:Kochi").await, Some(1));
    }

    #[tokio::test]
    async fn register_then_delete_restores_counters() {
        let manager = manager();
        let record = manager
            .register(payload("Covishield", "Kerala", "Kochi"))
            .await
            .unwrap();

        let removed = manager.delete(record.cert_id.as_str()).await.unwrap();
        assert_eq!(removed, Some(record.clone()));
        assert_eq!(count(manager.store(), "state:Kerala").await, None);
        assert_eq!(count(manager.store(), "district:Kerala:Kochi").await, None);
        assert!(matches!(
            manager.get(record.cert_id.as_str()).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            manager.delete(record.cert_id.as_str()).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_unreadable_record_without_touching_counters() {
        let manager = manager();
        let kept = manager
            .register(payload("Covishield", "Kerala", "Kochi"))
            .await
            .unwrap();
        let garbled = candidate(77);
        manager
            .store()
            .set(&record_key(&garbled), &json!({"certId": 12, "name": null}))
            .await
            .unwrap();
        assert_eq!(manager.list().await.unwrap(), vec![kept]);

        let removed = manager.delete(garbled.as_str()).await.unwrap();
        assert!(removed.is_none());
        assert!(manager.store().get(&record_key(&garbled)).await.unwrap().is_none());
        assert_eq!(count(manager.store(), "state:Kerala").await, Some(1));
        assert_eq!(count(manager.store(), "district:Kerala:Kochi").await, Some(1));
    }

    #[tokio::test]
    async fn registration_survives_nine_collisions() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        for n in 1..=9 {
            store
                .set(&record_key(&candidate(n)), &json!({"taken": true}))
                .await
                .unwrap();
        }
        let manager = RecordManager::with_cert_ids(
            store,
            ScriptedCertIds::new((1..=10).map(candidate)),
            NotificationQueue::disabled(),
        );

        let record = manager
            .register(payload("Covaxin", "Goa", "North Goa"))
            .await
            .unwrap();
        assert_eq!(record.cert_id, candidate(10));
        assert_eq!(
            manager.store().get(&record_key(&candidate(1))).await.unwrap(),
            Some(json!({"taken": true}))
        );
    }

    #[tokio::test]
    async fn registration_fails_after_ten_collisions() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        for n in 1..=10 {
            store
                .set(&record_key(&candidate(n)), &json!({"taken": true}))
                .await
                .unwrap();
        }
        let manager = RecordManager::with_cert_ids(
            store,
            ScriptedCertIds::new((1..=10).map(candidate)),
            NotificationQueue::disabled(),
        );

        let err = manager
            .register(payload("Covaxin", "Goa", "North Goa"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Core(vaxtrack_core::Error::GenerationExhausted { attempts: 10 })
        ));
        assert_eq!(count(manager.store(), "state:Goa").await, None);
        assert_eq!(manager.list().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn registration_rejects_missing_fields_without_writing() {
        let manager = manager();
        let payload: RecordPayload = serde_json::from_value(json!({"name": "Only"})).unwrap();
        let err = manager.register(payload).await.unwrap_err();
        assert_eq!(err.code(), "validation_error");
        assert!(manager.store().scan_prefix("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn registration_queues_confirmation() {
        let (queue, mut rx) = NotificationQueue::channel(4);
        let manager = RecordManager::new(Arc::new(MemoryStore::new()), queue);
        let record = manager
            .register(payload("Covishield", "Kerala", "Kochi"))
            .await
            .unwrap();

        let email = rx.try_recv().unwrap();
        assert_eq!(email.cert_id, record.cert_id);
        assert_eq!(email.to, "meera@example.com");
    }

    #[tokio::test]
    async fn import_skips_duplicates_and_invalid_elements() {
        let (queue, mut rx) = NotificationQueue::channel(16);
        let manager = RecordManager::new(Arc::new(MemoryStore::new()), queue);

        let mut batch: Vec<Value> = (1..=9)
            .map(|n| import_value(&format!("VAX-20241120-{n:06}"), "Delhi"))
            .collect();
        batch.push(import_value("VAX-20241120-000003", "Delhi"));
        batch.push(json!({"certId": "VAX-20241120-000099", "name": "No state"}));
        batch.push(json!("not an object"));

        let summary = manager.import(batch).await;
        assert_eq!(
            summary,
            ImportSummary {
                inserted: 9,
                errors: 3
            }
        );
        assert_eq!(summary.message(), "Inserted 9 records, 3 errors");
        assert_eq!(count(manager.store(), "state:Delhi").await, Some(9));
        assert_eq!(count(manager.store(), "district:Delhi:Central").await, Some(9));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn import_never_overwrites() {
        let manager = manager();
        let existing = manager
            .register(payload("Covishield", "Kerala", "Kochi"))
            .await
            .unwrap();

        let summary = manager
            .import(vec![import_value(existing.cert_id.as_str(), "Delhi")])
            .await;
        assert_eq!(
            summary,
            ImportSummary {
                inserted: 0,
                errors: 1
            }
        );
        assert_eq!(
            manager.get(existing.cert_id.as_str()).await.unwrap(),
            existing
        );
        assert_eq!(count(manager.store(), "state:Delhi").await, None);
    }

    #[tokio::test]
    async fn dashboard_aggregates_records_and_counters() {
        let manager = manager();
        for _ in 0..3 {
            manager
                .register(payload("Pfizer-BioNTech", "Kerala", "Kochi"))
                .await
                .unwrap();
        }
        for _ in 0..2 {
            manager
                .register(payload("Moderna", "Assam", "Jorhat"))
                .await
                .unwrap();
        }

        let stats = manager.dashboard().await.unwrap();
        assert_eq!(stats.total_vaccinations, 5);
        assert_eq!(stats.vaccine_types.len(), 2);
        assert_eq!(stats.vaccine_types["Pfizer-BioNTech"], 3);
        assert_eq!(stats.vaccine_types["Moderna"], 2);
        assert_eq!(stats.dose_distribution["1"], 5);
        assert_eq!(stats.dose_distribution["Booster"], 0);
        assert_eq!(stats.monthly_data["2025-03"], 5);

        let states: Vec<(&str, i64)> = stats
            .state_heatmap_data
            .iter()
            .map(|c| (c.state.as_str(), c.count))
            .collect();
        assert_eq!(states, vec![("Assam", 2), ("Kerala", 3)]);
        assert_eq!(stats.district_heatmap_data.len(), 2);
    }

    #[tokio::test]
    async fn list_skips_unreadable_entries() {
        let manager = manager();
        let record = manager
            .register(payload("Covishield", "Kerala", "Kochi"))
            .await
            .unwrap();
        manager
            .store()
            .set("vaccination:garbage", &json!({"oops": true}))
            .await
            .unwrap();

        let records = manager.list().await.unwrap();
        assert_eq!(records, vec![record]);
    }
}
