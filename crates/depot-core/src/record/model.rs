//! The record type.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::FieldValue;
use crate::error::{Error, InvalidArgumentError};
use crate::types::RecordId;

/// Name of the reserved primary-key field.
pub const ID_FIELD: &str = "id";

/// A uniquely identified mapping of named fields.
///
/// The id is fixed at construction. The field map never contains the `id`
/// key; attempts to set it fail instead of silently re-keying the record.
///
/// The JSON form is a flat object with the id under `"id"`:
///
/// ```
/// use depot_core::Record;
/// use serde_json::json;
///
/// let record = Record::from_json(json!({"id": "u1", "name": "Ada"})).unwrap();
/// assert_eq!(record.id().as_str(), "u1");
/// assert_eq!(record.to_json(), json!({"id": "u1", "name": "Ada"}));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: RecordId,
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Create an empty record with the given id.
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            fields: BTreeMap::new(),
        }
    }

    /// Parse a record from a JSON object carrying a string `id`.
    pub fn from_json(value: Value) -> Result<Self, Error> {
        let Value::Object(mut obj) = value else {
            return Err(InvalidArgumentError::Record {
                reason: "record must be a JSON object".to_string(),
            }
            .into());
        };

        let id = match obj.remove(ID_FIELD) {
            Some(Value::String(id)) => RecordId::new(id)?,
            Some(_) => {
                return Err(InvalidArgumentError::Record {
                    reason: "'id' must be a string".to_string(),
                }
                .into());
            }
            None => {
                return Err(InvalidArgumentError::Record {
                    reason: "record must contain an 'id' field".to_string(),
                }
                .into());
            }
        };

        Ok(Self {
            id,
            fields: obj
                .into_iter()
                .map(|(k, v)| (k, FieldValue::from(v)))
                .collect(),
        })
    }

    /// Convert to the flat JSON form.
    pub fn to_json(&self) -> Value {
        let mut obj = serde_json::Map::new();
        obj.insert(ID_FIELD.to_string(), Value::String(self.id.to_string()));
        for (k, v) in &self.fields {
            obj.insert(k.clone(), v.to_json());
        }
        Value::Object(obj)
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    /// Get a top-level field.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Resolve a dotted path (`address.city`) against the record.
    ///
    /// The path `id` resolves to the record id as a string value.
    pub fn lookup(&self, path: &str) -> Option<Cow<'_, FieldValue>> {
        if path == ID_FIELD {
            return Some(Cow::Owned(FieldValue::String(self.id.to_string())));
        }

        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = current.get(segment)?;
        }
        Some(Cow::Borrowed(current))
    }

    /// Set a top-level field, returning the previous value.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` when `key` is `id` or empty.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Result<Option<FieldValue>, Error> {
        let key = key.into();
        if key == ID_FIELD {
            return Err(InvalidArgumentError::Record {
                reason: "the 'id' field is immutable".to_string(),
            }
            .into());
        }
        if key.is_empty() {
            return Err(InvalidArgumentError::Record {
                reason: "field names cannot be empty".to_string(),
            }
            .into());
        }
        Ok(self.fields.insert(key, value.into()))
    }

    /// Builder form of [`Record::set`].
    pub fn with(
        mut self,
        key: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Result<Self, Error> {
        self.set(key, value)?;
        Ok(self)
    }

    /// Remove a top-level field.
    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.fields.remove(key)
    }

    /// Overwrite this record's fields with every field present in `patch`.
    ///
    /// Fields absent from `patch` are left untouched.
    pub fn merge(&mut self, patch: Record) {
        self.fields.extend(patch.fields);
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(ID_FIELD, &self.id)?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Record::from_json(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_requires_string_id() {
        assert!(Record::from_json(json!({"name": "x"})).is_err());
        assert!(Record::from_json(json!({"id": 7})).is_err());
        assert!(Record::from_json(json!(["id"])).is_err());
    }

    #[test]
    fn id_is_immutable() {
        let mut record = Record::new(RecordId::new("r1").unwrap());
        let err = record.set("id", "r2").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(record.id().as_str(), "r1");
    }

    #[test]
    fn lookup_follows_dotted_paths() {
        let record = Record::from_json(json!({
            "id": "r1",
            "address": {"city": "Oslo", "geo": {"lat": 59.9}}
        }))
        .unwrap();

        assert_eq!(
            record.lookup("address.city").unwrap().as_ref(),
            &FieldValue::from("Oslo")
        );
        assert_eq!(
            record.lookup("address.geo.lat").unwrap().as_ref(),
            &FieldValue::from(59.9)
        );
        assert!(record.lookup("address.zip").is_none());
        assert_eq!(
            record.lookup("id").unwrap().as_ref(),
            &FieldValue::from("r1")
        );
    }

    #[test]
    fn merge_overwrites_only_given_fields() {
        let mut base = Record::from_json(json!({"id": "r1", "a": 1, "b": 2})).unwrap();
        let patch = Record::from_json(json!({"id": "r1", "b": 3, "c": 4})).unwrap();
        base.merge(patch);
        assert_eq!(base.to_json(), json!({"id": "r1", "a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn serde_round_trip_keeps_sets() {
        let record = Record::from_json(json!({"id": "r1", "tags": {"$set": ["a"]}})).unwrap();
        let text = serde_json::to_string(&record).unwrap();
        let parsed: Record = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(parsed.get("tags").unwrap().type_name(), "set");
    }
}
