//! Field-level mutations and the compare-and-swap loop that applies them.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{FieldValue, Number, Record};
use crate::error::{Error, InvalidArgumentError};
use crate::traits::{CasOutcome, VersionedStore};
use crate::types::RecordId;

/// Monotonic per-record version used for optimistic concurrency.
pub type Version = u64;

/// A value tagged with the version it was read at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: Version,
    pub value: T,
}

/// Attempts made by [`apply_with_cas`] before giving up.
pub const DEFAULT_MAX_CAS_ATTEMPTS: usize = 128;

/// A partial update to a single field of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldMutation {
    /// Add to a numeric field; an absent field starts at the delta.
    Increment(Number),
    /// Append to a list field; an absent field becomes a one-element list.
    Append(FieldValue),
    /// Remove every equal element from a list field.
    RemoveFromList(FieldValue),
    /// Add to a set field unless already present.
    AddToSet(FieldValue),
    /// Remove from a set field; removing an absent member is a no-op.
    RemoveFromSet(FieldValue),
}

impl FieldMutation {
    /// Apply the mutation to `record[key]` in place.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` when the field holds an incompatible value,
    /// `InvalidArgument` when `key` is `id` or a dotted path. Mutations
    /// address top-level fields only.
    pub fn apply(&self, record: &mut Record, key: &str) -> Result<(), Error> {
        if key.contains('.') {
            return Err(InvalidArgumentError::Record {
                reason: format!("cannot mutate nested path '{key}', only top-level fields"),
            }
            .into());
        }
        let current = record.get(key);
        let updated = match (self, current) {
            (FieldMutation::Increment(delta), None) => FieldValue::Number(*delta),
            (FieldMutation::Increment(delta), Some(FieldValue::Number(n))) => {
                FieldValue::Number(n.add(*delta))
            }

            (FieldMutation::Append(value), None) => FieldValue::List(vec![value.clone()]),
            (FieldMutation::Append(value), Some(FieldValue::List(items))) => {
                let mut items = items.clone();
                items.push(value.clone());
                FieldValue::List(items)
            }

            (FieldMutation::RemoveFromList(_), None) => FieldValue::List(Vec::new()),
            (FieldMutation::RemoveFromList(value), Some(FieldValue::List(items))) => {
                FieldValue::List(items.iter().filter(|v| *v != value).cloned().collect())
            }

            (FieldMutation::AddToSet(value), None) => FieldValue::Set(vec![value.clone()]),
            (FieldMutation::AddToSet(value), Some(FieldValue::Set(items))) => {
                let mut items = items.clone();
                if !items.contains(value) {
                    items.push(value.clone());
                }
                FieldValue::Set(items)
            }

            (FieldMutation::RemoveFromSet(_), None) => FieldValue::Set(Vec::new()),
            (FieldMutation::RemoveFromSet(value), Some(FieldValue::Set(items))) => {
                FieldValue::Set(items.iter().filter(|v| *v != value).cloned().collect())
            }

            (mutation, Some(found)) => {
                return Err(Error::TypeMismatch {
                    key: key.to_string(),
                    expected: mutation.expected_type(),
                    found: found.type_name(),
                });
            }
        };

        record.set(key, updated)?;
        Ok(())
    }

    /// The field type this mutation operates on.
    pub fn expected_type(&self) -> &'static str {
        match self {
            FieldMutation::Increment(_) => "number",
            FieldMutation::Append(_) | FieldMutation::RemoveFromList(_) => "list",
            FieldMutation::AddToSet(_) | FieldMutation::RemoveFromSet(_) => "set",
        }
    }
}

/// Apply a field mutation atomically through optimistic concurrency.
///
/// Loads the record with its version, applies the mutation to a copy and
/// swaps it in only if the stored version is unchanged. A conflict means a
/// concurrent writer committed first; the loop reloads and tries again.
///
/// # Errors
///
/// `NotFound` if the record does not exist (or disappears mid-loop),
/// errors from [`FieldMutation::apply`], and `Unavailable` once
/// `max_attempts` conflicts have been seen.
pub async fn apply_with_cas<S>(
    store: &S,
    id: &RecordId,
    key: &str,
    mutation: &FieldMutation,
    max_attempts: usize,
) -> Result<Record, Error>
where
    S: VersionedStore + ?Sized,
{
    for attempt in 1..=max_attempts.max(1) {
        let Some(current) = store.load_versioned(id).await? else {
            return Err(Error::record_not_found(id.as_str()));
        };

        let mut record = current.value;
        mutation.apply(&mut record, key)?;

        match store.compare_and_swap(current.version, &record).await? {
            CasOutcome::Swapped(version) => {
                debug!(%id, key, version, attempt, "Applied field mutation");
                return Ok(record);
            }
            CasOutcome::Conflict => {
                debug!(%id, key, attempt, "Version conflict, retrying");
                tokio::task::yield_now().await;
            }
            CasOutcome::Missing => return Err(Error::record_not_found(id.as_str())),
        }
    }

    warn!(%id, key, max_attempts, "Gave up after repeated version conflicts");
    Err(Error::unavailable(format!(
        "too much contention updating '{}' on record '{}'",
        key, id
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        Record::from_json(value).unwrap()
    }

    #[test]
    fn increment_creates_and_adds() {
        let mut r = record(json!({"id": "a"}));
        FieldMutation::Increment(5.into()).apply(&mut r, "n").unwrap();
        FieldMutation::Increment(2.into()).apply(&mut r, "n").unwrap();
        assert_eq!(r.get("n"), Some(&FieldValue::from(7)));
    }

    #[test]
    fn increment_rejects_non_numbers() {
        let mut r = record(json!({"id": "a", "n": "seven"}));
        let err = FieldMutation::Increment(1.into())
            .apply(&mut r, "n")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch {
                expected: "number",
                found: "string",
                ..
            }
        ));
    }

    #[test]
    fn list_append_and_remove_all_occurrences() {
        let mut r = record(json!({"id": "a", "l": [1, 2, 1]}));
        FieldMutation::Append(3.into()).apply(&mut r, "l").unwrap();
        FieldMutation::RemoveFromList(1.into())
            .apply(&mut r, "l")
            .unwrap();
        assert_eq!(r.to_json()["l"], json!([2, 3]));
    }

    #[test]
    fn list_ops_reject_sets() {
        let mut r = record(json!({"id": "a", "s": {"$set": [1]}}));
        assert!(FieldMutation::Append(2.into()).apply(&mut r, "s").is_err());
    }

    #[test]
    fn set_ops_keep_members_unique() {
        let mut r = record(json!({"id": "a"}));
        FieldMutation::AddToSet("x".into()).apply(&mut r, "s").unwrap();
        FieldMutation::AddToSet("x".into()).apply(&mut r, "s").unwrap();
        FieldMutation::RemoveFromSet("y".into())
            .apply(&mut r, "s")
            .unwrap();
        assert_eq!(r.get("s"), Some(&FieldValue::Set(vec!["x".into()])));
    }

    #[test]
    fn set_ops_reject_lists() {
        let mut r = record(json!({"id": "a", "s": [1]}));
        let err = FieldMutation::AddToSet(1.into())
            .apply(&mut r, "s")
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { expected: "set", .. }));
    }

    #[test]
    fn id_cannot_be_mutated() {
        let mut r = record(json!({"id": "a"}));
        assert!(FieldMutation::Increment(1.into()).apply(&mut r, "id").is_err());
    }

    #[test]
    fn dotted_keys_are_rejected() {
        let mut r = record(json!({"id": "a", "stats": {"views": 1}}));
        let err = FieldMutation::Increment(1.into())
            .apply(&mut r, "stats.views")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(r.get("stats.views").is_none());
        assert_eq!(
            r.lookup("stats.views").as_deref(),
            Some(&FieldValue::Number(1.into()))
        );
    }

    /// Store that reports a conflict for the first `conflicts` swaps.
    struct Flaky {
        record: std::sync::Mutex<Versioned<Record>>,
        conflicts: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl VersionedStore for Flaky {
        async fn load_versioned(&self, _id: &RecordId) -> crate::Result<Option<Versioned<Record>>> {
            Ok(Some(self.record.lock().unwrap().clone()))
        }

        async fn compare_and_swap(
            &self,
            expected: Version,
            record: &Record,
        ) -> crate::Result<CasOutcome> {
            use std::sync::atomic::Ordering;
            if self
                .conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Ok(CasOutcome::Conflict);
            }
            let mut stored = self.record.lock().unwrap();
            assert_eq!(stored.version, expected);
            stored.version += 1;
            stored.value = record.clone();
            Ok(CasOutcome::Swapped(stored.version))
        }
    }

    fn flaky(conflicts: usize) -> Flaky {
        Flaky {
            record: std::sync::Mutex::new(Versioned {
                version: 1,
                value: record(json!({"id": "a", "n": 1})),
            }),
            conflicts: conflicts.into(),
        }
    }

    #[tokio::test]
    async fn cas_retries_after_conflict() {
        let store = flaky(3);
        let id = RecordId::new("a").unwrap();
        let updated = apply_with_cas(&store, &id, "n", &FieldMutation::Increment(1.into()), 8)
            .await
            .unwrap();
        assert_eq!(updated.get("n"), Some(&FieldValue::from(2)));
        assert_eq!(store.record.lock().unwrap().version, 2);
    }

    #[tokio::test]
    async fn cas_gives_up_when_contention_persists() {
        let store = flaky(10);
        let id = RecordId::new("a").unwrap();
        let err = apply_with_cas(&store, &id, "n", &FieldMutation::Increment(1.into()), 4)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
