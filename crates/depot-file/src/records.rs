//! File-backed record store.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{debug, instrument};

use depot_core::error::{EntityKind, Error, InvalidArgumentError};
use depot_core::record::{DEFAULT_MAX_CAS_ATTEMPTS, apply_with_cas, paginate};
use depot_core::traits::{CasOutcome, RecordStore, VersionedStore};
use depot_core::{FieldMutation, Page, Query, Record, RecordId, Result, Version, Versioned};

use crate::store::FileStore;

const MAX_TABLE_NAME_LEN: usize = 80;

fn validate_table(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && table.len() <= MAX_TABLE_NAME_LEN
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(InvalidArgumentError::Other {
            message: format!(
                "table name '{}' must be 1-{} characters of [A-Za-z0-9_-]",
                table, MAX_TABLE_NAME_LEN
            ),
        }
        .into())
    }
}

/// Record store keeping one JSON file per record.
///
/// Each file holds the record together with its version. Writes to a table
/// are serialized through the table's lock file, so several processes may
/// open the same table. Versions come from a per-table counter kept next to
/// the records, so a deleted and recreated record never repeats one.
#[derive(Debug)]
pub struct FileRecordStore {
    store: FileStore,
    table: String,
    connected: AtomicBool,
    max_cas_attempts: usize,
}

impl FileRecordStore {
    /// Open `table` under the given file store.
    pub fn new(store: FileStore, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_table(&table)?;
        Ok(Self {
            store,
            table,
            connected: AtomicBool::new(true),
            max_cas_attempts: DEFAULT_MAX_CAS_ATTEMPTS,
        })
    }

    /// Override how many version conflicts a field mutation tolerates.
    pub fn with_max_cas_attempts(mut self, attempts: usize) -> Self {
        self.max_cas_attempts = attempts;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::unavailable(format!(
                "file record store for table '{}' is disconnected",
                self.table
            )))
        }
    }

    fn read(&self, id: &RecordId) -> Result<Option<Versioned<Record>>> {
        self.store.read_json(&self.store.record_path(&self.table, id))
    }

    fn write(&self, versioned: &Versioned<Record>) -> Result<()> {
        let path = self.store.record_path(&self.table, versioned.value.id());
        self.store.write_json(&path, versioned)
    }

    /// Issue the next version for this table. Callers hold the table lock.
    fn next_version(&self) -> Result<Version> {
        let path = self.store.table_clock_path(&self.table);
        let version = self.store.read_json::<Version>(&path)?.unwrap_or(0) + 1;
        self.store.write_json(&path, &version)?;
        Ok(version)
    }

    /// Every stored record, in file name order.
    fn scan(&self) -> Result<Vec<Record>> {
        let dir = self.store.records_dir(&self.table);
        let mut records = Vec::new();
        for path in self.store.json_files(&dir)? {
            // A record deleted since the directory listing is skipped.
            if let Some(versioned) = self.store.read_json::<Versioned<Record>>(&path)? {
                records.push(versioned.value);
            }
        }
        Ok(records)
    }

    /// Merge `record` into the stored one, creating it when absent and
    /// `create_missing` is set.
    fn merge(&self, record: Record, create_missing: bool) -> Result<Record> {
        let _lock = self.store.lock(&self.store.table_lock_path(&self.table))?;
        let updated = match self.read(record.id())? {
            Some(mut stored) => {
                stored.value.merge(record);
                stored.version = self.next_version()?;
                stored
            }
            None if create_missing => Versioned {
                version: self.next_version()?,
                value: record,
            },
            None => return Err(Error::record_not_found(record.id().as_str())),
        };
        self.write(&updated)?;
        debug!(id = %updated.value.id(), version = updated.version, "Wrote record");
        Ok(updated.value)
    }
}

#[async_trait]
impl VersionedStore for FileRecordStore {
    async fn load_versioned(&self, id: &RecordId) -> Result<Option<Versioned<Record>>> {
        self.ensure_connected()?;
        self.read(id)
    }

    async fn compare_and_swap(&self, expected: Version, record: &Record) -> Result<CasOutcome> {
        self.ensure_connected()?;
        let _lock = self.store.lock(&self.store.table_lock_path(&self.table))?;
        let Some(stored) = self.read(record.id())? else {
            return Ok(CasOutcome::Missing);
        };
        if stored.version != expected {
            return Ok(CasOutcome::Conflict);
        }
        let version = self.next_version()?;
        self.write(&Versioned {
            version,
            value: record.clone(),
        })?;
        Ok(CasOutcome::Swapped(version))
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    #[instrument(skip(self), fields(table = %self.table))]
    async fn connect(&self) -> Result<()> {
        self.store.ensure_dir(&self.store.records_dir(&self.table))?;
        self.connected.store(true, Ordering::Release);
        debug!("Connected file record store");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::Release);
        Ok(())
    }

    async fn get_one(&self, id: &RecordId) -> Result<Option<Record>> {
        self.ensure_connected()?;
        Ok(self.read(id)?.map(|v| v.value))
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn query(&self, query: &Query) -> Result<Page> {
        self.ensure_connected()?;
        let records = self.scan()?;
        paginate(&records, query)
    }

    #[instrument(skip(self, record), fields(table = %self.table, id = %record.id()))]
    async fn create(&self, record: Record) -> Result<Record> {
        self.ensure_connected()?;
        let _lock = self.store.lock(&self.store.table_lock_path(&self.table))?;
        if self.read(record.id())?.is_some() {
            return Err(Error::AlreadyExists {
                kind: EntityKind::Record,
                name: record.id().to_string(),
            });
        }
        self.write(&Versioned {
            version: self.next_version()?,
            value: record.clone(),
        })?;
        debug!("Created record");
        Ok(record)
    }

    #[instrument(skip(self, record), fields(table = %self.table, id = %record.id()))]
    async fn update(&self, record: Record) -> Result<Record> {
        self.ensure_connected()?;
        self.merge(record, false)
    }

    #[instrument(skip(self, record), fields(table = %self.table, id = %record.id()))]
    async fn upsert(&self, record: Record) -> Result<Record> {
        self.ensure_connected()?;
        self.merge(record, true)
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn delete(&self, id: &RecordId) -> Result<()> {
        self.ensure_connected()?;
        let _lock = self.store.lock(&self.store.table_lock_path(&self.table))?;
        let path = self.store.record_path(&self.table, id);
        if !self.store.remove_file(&path)? {
            return Err(Error::record_not_found(id.as_str()));
        }
        debug!("Deleted record");
        Ok(())
    }

    #[instrument(skip(self, mutation), fields(table = %self.table))]
    async fn mutate(&self, id: &RecordId, key: &str, mutation: FieldMutation) -> Result<Record> {
        self.ensure_connected()?;
        apply_with_cas(self, id, key, &mutation, self.max_cas_attempts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_are_validated() {
        let store = FileStore::new("/tmp/unused");
        assert!(FileRecordStore::new(store.clone(), "users").is_ok());
        assert!(FileRecordStore::new(store.clone(), "").is_err());
        assert!(FileRecordStore::new(store.clone(), "../etc").is_err());
        assert!(FileRecordStore::new(store, "a".repeat(81)).is_err());
    }
}
