//! In-memory record store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use depot_core::error::{EntityKind, Error};
use depot_core::record::{DEFAULT_MAX_CAS_ATTEMPTS, apply_with_cas, paginate};
use depot_core::traits::{CasOutcome, RecordStore, VersionedStore};
use depot_core::{FieldMutation, Page, Query, Record, RecordId, Result, Version, Versioned};

/// Record store holding every record in a map.
///
/// The store starts connected. After [`disconnect`](RecordStore::disconnect)
/// every operation fails with `Unavailable` until it is connected again;
/// the records survive the round trip.
///
/// Versions come from one store-wide counter, so a record that is deleted
/// and created again never repeats a version a stale writer may hold.
#[derive(Debug)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<RecordId, Versioned<Record>>>,
    clock: AtomicU64,
    connected: AtomicBool,
    max_cas_attempts: usize,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
            connected: AtomicBool::new(true),
            max_cas_attempts: DEFAULT_MAX_CAS_ATTEMPTS,
        }
    }

    /// Override how many version conflicts a field mutation tolerates.
    pub fn with_max_cas_attempts(mut self, attempts: usize) -> Self {
        self.max_cas_attempts = attempts;
        self
    }

    /// Number of records held.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn next_version(&self) -> Version {
        self.clock.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::unavailable("memory record store is disconnected"))
        }
    }
}

#[async_trait]
impl VersionedStore for MemoryRecordStore {
    async fn load_versioned(&self, id: &RecordId) -> Result<Option<Versioned<Record>>> {
        self.ensure_connected()?;
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn compare_and_swap(&self, expected: Version, record: &Record) -> Result<CasOutcome> {
        self.ensure_connected()?;
        let mut records = self.records.write().await;
        let Some(stored) = records.get_mut(record.id()) else {
            return Ok(CasOutcome::Missing);
        };
        if stored.version != expected {
            return Ok(CasOutcome::Conflict);
        }
        stored.version = self.next_version();
        stored.value = record.clone();
        Ok(CasOutcome::Swapped(stored.version))
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::Release);
        debug!("Disconnected memory record store");
        Ok(())
    }

    async fn get_one(&self, id: &RecordId) -> Result<Option<Record>> {
        self.ensure_connected()?;
        Ok(self.records.read().await.get(id).map(|v| v.value.clone()))
    }

    async fn get_many(&self, ids: &[RecordId]) -> Result<Vec<Option<Record>>> {
        self.ensure_connected()?;
        let records = self.records.read().await;
        Ok(ids
            .iter()
            .map(|id| records.get(id).map(|v| v.value.clone()))
            .collect())
    }

    #[instrument(skip(self))]
    async fn query(&self, query: &Query) -> Result<Page> {
        self.ensure_connected()?;
        let records = self.records.read().await;
        paginate(records.values().map(|v| &v.value), query)
    }

    #[instrument(skip(self, record), fields(id = %record.id()))]
    async fn create(&self, record: Record) -> Result<Record> {
        self.ensure_connected()?;
        let mut records = self.records.write().await;
        if records.contains_key(record.id()) {
            return Err(Error::AlreadyExists {
                kind: EntityKind::Record,
                name: record.id().to_string(),
            });
        }
        records.insert(
            record.id().clone(),
            Versioned {
                version: self.next_version(),
                value: record.clone(),
            },
        );
        debug!("Created record");
        Ok(record)
    }

    #[instrument(skip(self, record), fields(id = %record.id()))]
    async fn update(&self, record: Record) -> Result<Record> {
        self.ensure_connected()?;
        let mut records = self.records.write().await;
        let stored = records
            .get_mut(record.id())
            .ok_or_else(|| Error::record_not_found(record.id().as_str()))?;
        stored.value.merge(record);
        stored.version = self.next_version();
        debug!(version = stored.version, "Updated record");
        Ok(stored.value.clone())
    }

    #[instrument(skip(self, record), fields(id = %record.id()))]
    async fn upsert(&self, record: Record) -> Result<Record> {
        self.ensure_connected()?;
        let mut records = self.records.write().await;
        match records.get_mut(record.id()) {
            Some(stored) => {
                stored.value.merge(record);
                stored.version = self.next_version();
                Ok(stored.value.clone())
            }
            None => {
                records.insert(
                    record.id().clone(),
                    Versioned {
                        version: self.next_version(),
                        value: record.clone(),
                    },
                );
                Ok(record)
            }
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &RecordId) -> Result<()> {
        self.ensure_connected()?;
        match self.records.write().await.remove(id) {
            Some(_) => {
                debug!("Deleted record");
                Ok(())
            }
            None => Err(Error::record_not_found(id.as_str())),
        }
    }

    #[instrument(skip(self, mutation))]
    async fn mutate(&self, id: &RecordId, key: &str, mutation: FieldMutation) -> Result<Record> {
        self.ensure_connected()?;
        apply_with_cas(self, id, key, &mutation, self.max_cas_attempts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        Record::from_json(value).unwrap()
    }

    #[tokio::test]
    async fn versions_advance_on_every_write() {
        let store = MemoryRecordStore::new();
        let id = RecordId::new("a").unwrap();
        store.create(record(json!({"id": "a"}))).await.unwrap();
        assert_eq!(store.load_versioned(&id).await.unwrap().unwrap().version, 1);

        store.upsert(record(json!({"id": "a", "x": 1}))).await.unwrap();
        store.increment(&id, "n", 1.into()).await.unwrap();
        assert_eq!(store.load_versioned(&id).await.unwrap().unwrap().version, 3);
    }

    #[tokio::test]
    async fn stale_swap_conflicts() {
        let store = MemoryRecordStore::new();
        let r = store.create(record(json!({"id": "a"}))).await.unwrap();
        assert_eq!(
            store.compare_and_swap(1, &r).await.unwrap(),
            CasOutcome::Swapped(2)
        );
        assert_eq!(
            store.compare_and_swap(1, &r).await.unwrap(),
            CasOutcome::Conflict
        );

        let ghost = record(json!({"id": "ghost"}));
        assert_eq!(
            store.compare_and_swap(1, &ghost).await.unwrap(),
            CasOutcome::Missing
        );
    }

    #[tokio::test]
    async fn recreated_record_never_reuses_a_version() {
        let store = MemoryRecordStore::new();
        let id = RecordId::new("a").unwrap();
        store
            .create(record(json!({"id": "a", "n": 5, "old": true})))
            .await
            .unwrap();
        let stale = store.load_versioned(&id).await.unwrap().unwrap();

        store.delete(&id).await.unwrap();
        store
            .create(record(json!({"id": "a", "fresh": true})))
            .await
            .unwrap();

        let mut overwrite = stale.value.clone();
        FieldMutation::Increment(1.into())
            .apply(&mut overwrite, "n")
            .unwrap();
        assert_eq!(
            store.compare_and_swap(stale.version, &overwrite).await.unwrap(),
            CasOutcome::Conflict
        );
        assert_eq!(
            store.get_one(&id).await.unwrap().unwrap().to_json(),
            json!({"id": "a", "fresh": true})
        );
    }

    #[tokio::test]
    async fn disconnected_store_is_unavailable() {
        let store = MemoryRecordStore::new();
        store.create(record(json!({"id": "a"}))).await.unwrap();
        store.disconnect().await.unwrap();

        let id = RecordId::new("a").unwrap();
        let err = store.get_one(&id).await.unwrap_err();
        assert!(err.is_retryable());

        store.connect().await.unwrap();
        assert!(store.get_one(&id).await.unwrap().is_some());
    }
}
