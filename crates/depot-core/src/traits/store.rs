//! Record store traits.

use async_trait::async_trait;

use crate::Result;
use crate::record::{
    Cursor, FieldMutation, FieldValue, Number, Page, Query, Record, Version, Versioned,
};
use crate::types::RecordId;

/// Outcome of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The write committed; carries the new version.
    Swapped(Version),
    /// Another writer committed first.
    Conflict,
    /// The record was deleted in the meantime.
    Missing,
}

/// Versioned read and conditional write, the primitives behind atomic
/// field mutations.
#[async_trait]
pub trait VersionedStore: Send + Sync {
    /// Read a record together with its current version.
    async fn load_versioned(&self, id: &RecordId) -> Result<Option<Versioned<Record>>>;

    /// Replace the record only if its stored version is still `expected`.
    async fn compare_and_swap(&self, expected: Version, record: &Record) -> Result<CasOutcome>;
}

/// A single logical table of records keyed by id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Acquire backing resources. Idempotent.
    async fn connect(&self) -> Result<()>;

    /// Release backing resources. Later calls fail with `Unavailable`
    /// until the store is connected again.
    async fn disconnect(&self) -> Result<()>;

    /// Fetch a record. Absence is `Ok(None)`.
    async fn get_one(&self, id: &RecordId) -> Result<Option<Record>>;

    /// Enumerate every record ordered by id.
    async fn get_all(&self, cursor: Option<Cursor>, page_size: Option<usize>) -> Result<Page> {
        self.query(&Query::all(cursor, page_size)).await
    }

    /// Fetch several records; the result lines up with `ids`.
    async fn get_many(&self, ids: &[RecordId]) -> Result<Vec<Option<Record>>> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            records.push(self.get_one(id).await?);
        }
        Ok(records)
    }

    /// Run a filtered, sorted, paginated query.
    async fn query(&self, query: &Query) -> Result<Page>;

    /// Insert a new record. Fails with `AlreadyExists` if the id is taken.
    async fn create(&self, record: Record) -> Result<Record>;

    /// Overwrite the given fields of an existing record.
    async fn update(&self, record: Record) -> Result<Record>;

    /// Update the record if it exists, otherwise create it.
    async fn upsert(&self, record: Record) -> Result<Record>;

    async fn delete(&self, id: &RecordId) -> Result<()>;

    /// Apply a field mutation atomically.
    async fn mutate(&self, id: &RecordId, key: &str, mutation: FieldMutation) -> Result<Record>;

    async fn increment(&self, id: &RecordId, key: &str, delta: Number) -> Result<Record> {
        self.mutate(id, key, FieldMutation::Increment(delta)).await
    }

    async fn append_to_list(&self, id: &RecordId, key: &str, value: FieldValue) -> Result<Record> {
        self.mutate(id, key, FieldMutation::Append(value)).await
    }

    async fn remove_from_list(
        &self,
        id: &RecordId,
        key: &str,
        value: FieldValue,
    ) -> Result<Record> {
        self.mutate(id, key, FieldMutation::RemoveFromList(value)).await
    }

    async fn add_to_set(&self, id: &RecordId, key: &str, value: FieldValue) -> Result<Record> {
        self.mutate(id, key, FieldMutation::AddToSet(value)).await
    }

    async fn remove_from_set(
        &self,
        id: &RecordId,
        key: &str,
        value: FieldValue,
    ) -> Result<Record> {
        self.mutate(id, key, FieldMutation::RemoveFromSet(value)).await
    }
}
