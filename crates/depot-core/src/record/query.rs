//! Queries, cursors and pagination.
//!
//! Every adapter funnels `get_all` and `query` through [`paginate`], which
//! filters, sorts by `(sort value, id)` and resumes after the position
//! encoded in the cursor. Resuming by position rather than offset keeps
//! pages stable when records elsewhere in the table come and go.

use std::cmp::Ordering;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use super::{FieldValue, Filter, Record};
use crate::error::{Error, InvalidArgumentError};
use crate::types::RecordId;

/// Page size used when the caller does not pass one.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Upper bound on page size; larger requests are clamped.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Sort direction for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl std::str::FromStr for SortDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(InvalidArgumentError::Other {
                message: format!("unknown sort direction '{}'", s),
            }
            .into()),
        }
    }
}

/// An opaque pagination token.
///
/// A cursor is only valid for the query that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

#[derive(Serialize, Deserialize)]
struct CursorPosition {
    #[serde(rename = "q")]
    fingerprint: u64,
    #[serde(rename = "k")]
    sort_value: FieldValue,
    #[serde(rename = "i")]
    id: RecordId,
}

fn invalid_cursor(reason: impl Into<String>) -> Error {
    InvalidArgumentError::Cursor {
        reason: reason.into(),
    }
    .into()
}

impl Cursor {
    /// Wrap a token received from a caller.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn encode(fingerprint: u64, sort_value: FieldValue, id: RecordId) -> Result<Self, Error> {
        let position = CursorPosition {
            fingerprint,
            sort_value,
            id,
        };
        let bytes = serde_json::to_vec(&position)?;
        Ok(Self(URL_SAFE_NO_PAD.encode(bytes)))
    }

    fn decode(&self, fingerprint: u64) -> Result<(FieldValue, RecordId), Error> {
        let bytes = URL_SAFE_NO_PAD
            .decode(self.0.as_bytes())
            .map_err(|e| invalid_cursor(e.to_string()))?;
        let position: CursorPosition =
            serde_json::from_slice(&bytes).map_err(|e| invalid_cursor(e.to_string()))?;

        if position.fingerprint != fingerprint {
            return Err(invalid_cursor("cursor was issued for a different query"));
        }

        Ok((position.sort_value, position.id))
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A page of records plus the cursor for the next page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<Record>,
    /// `None` once enumeration is exhausted.
    pub last: Option<Cursor>,
}

/// Query parameters.
///
/// ```
/// use depot_core::{Filter, Query, SortDirection};
///
/// let query = Query::new(Filter::gte("age", 18))
///     .sort_by("age", SortDirection::Desc)
///     .page_size(20);
/// assert_eq!(query.sort_key(), "age");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub cursor: Option<Cursor>,
    pub page_size: Option<usize>,
    /// Field path to sort by; `id` when absent.
    pub sort_key: Option<String>,
    pub sort: SortDirection,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Enumerate every record by id, optionally resuming from a cursor.
    pub fn all(cursor: Option<Cursor>, page_size: Option<usize>) -> Self {
        Self {
            cursor,
            page_size,
            ..Self::default()
        }
    }

    pub fn sort_by(mut self, key: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_key = Some(key.into());
        self.sort = direction;
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn after(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn sort_key(&self) -> &str {
        self.sort_key.as_deref().unwrap_or(super::model::ID_FIELD)
    }

    fn resolved_page_size(&self) -> Result<usize, Error> {
        match self.page_size {
            None => Ok(DEFAULT_PAGE_SIZE),
            Some(0) => Err(InvalidArgumentError::Other {
                message: "page size must be at least 1".to_string(),
            }
            .into()),
            Some(n) => Ok(n.min(MAX_PAGE_SIZE)),
        }
    }

    /// Digest of everything that shapes the result order, binding cursors
    /// to the query that issued them. Stable across builds and processes,
    /// since cursors outlive both.
    fn fingerprint(&self) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(format!("{:?}", self.filter).as_bytes());
        hasher.update(&[0]);
        hasher.update(self.sort_key().as_bytes());
        hasher.update(&[0]);
        hasher.update(match self.sort {
            SortDirection::Asc => b"asc".as_slice(),
            SortDirection::Desc => b"desc".as_slice(),
        });

        let mut head = [0u8; 8];
        head.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
        u64::from_le_bytes(head)
    }
}

/// Run a query over an in-memory snapshot of records.
///
/// # Errors
///
/// Fails with `InvalidArgument` for a malformed filter, an empty sort key,
/// a zero page size, or a cursor that is malformed or belongs to another
/// query.
pub fn paginate<'a, I>(records: I, query: &Query) -> Result<Page, Error>
where
    I: IntoIterator<Item = &'a Record>,
{
    query.filter.validate()?;
    let page_size = query.resolved_page_size()?;
    let sort_key = query.sort_key();
    if sort_key.is_empty() {
        return Err(InvalidArgumentError::Other {
            message: "sort key cannot be empty".to_string(),
        }
        .into());
    }

    let fingerprint = query.fingerprint();
    let position = query
        .cursor
        .as_ref()
        .map(|cursor| cursor.decode(fingerprint))
        .transpose()?;

    let order = |a: (&FieldValue, &RecordId), b: (&FieldValue, &RecordId)| -> Ordering {
        let ord = a.0.total_cmp(b.0).then_with(|| a.1.cmp(b.1));
        match query.sort {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    };

    let mut matching: Vec<(FieldValue, &Record)> = records
        .into_iter()
        .filter(|record| query.filter.matches(record))
        .map(|record| {
            let value = record
                .lookup(sort_key)
                .map(|v| v.into_owned())
                .unwrap_or(FieldValue::Null);
            (value, record)
        })
        .collect();

    matching.sort_by(|a, b| order((&a.0, a.1.id()), (&b.0, b.1.id())));

    let start = match &position {
        Some((value, id)) => {
            matching.partition_point(|(v, r)| order((v, r.id()), (value, id)) != Ordering::Greater)
        }
        None => 0,
    };

    let remaining = &matching[start..];
    let has_more = remaining.len() > page_size;
    let page: Vec<&(FieldValue, &Record)> = remaining.iter().take(page_size).collect();

    let last = match (has_more, page.last()) {
        (true, Some((value, record))) => Some(Cursor::encode(
            fingerprint,
            value.clone(),
            record.id().clone(),
        )?),
        _ => None,
    };

    Ok(Page {
        items: page.into_iter().map(|(_, record)| (*record).clone()).collect(),
        last,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                Record::from_json(json!({
                    "id": format!("r{:03}", i),
                    "score": (i % 7) as i64,
                }))
                .unwrap()
            })
            .collect()
    }

    fn collect_all(records: &[Record], query: Query) -> Vec<String> {
        let mut ids = Vec::new();
        let mut query = query;
        loop {
            let page = paginate(records, &query).unwrap();
            ids.extend(page.items.iter().map(|r| r.id().to_string()));
            match page.last {
                Some(cursor) => query = query.after(Some(cursor)),
                None => break,
            }
        }
        ids
    }

    #[test]
    fn enumerates_everything_once_for_any_page_size() {
        let data = records(23);
        for size in [1, 2, 5, 22, 23, 24, 100] {
            let ids = collect_all(&data, Query::all(None, Some(size)));
            assert_eq!(ids.len(), 23, "page size {}", size);
            let mut sorted = ids.clone();
            sorted.sort();
            sorted.dedup();
            assert_eq!(sorted.len(), 23);
            assert_eq!(ids, sorted);
        }
    }

    #[test]
    fn sorts_by_key_with_id_tiebreak() {
        let data = records(10);
        let ids = collect_all(
            &data,
            Query::new(Filter::All)
                .sort_by("score", SortDirection::Desc)
                .page_size(3),
        );
        let scores: Vec<i64> = ids
            .iter()
            .map(|id| {
                let idx: usize = id[1..].parse().unwrap();
                (idx % 7) as i64
            })
            .collect();
        let mut expected = scores.clone();
        expected.sort_by(|a, b| b.cmp(a));
        assert_eq!(scores, expected);
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn last_is_none_on_final_page() {
        let data = records(4);
        let page = paginate(&data, &Query::all(None, Some(4))).unwrap();
        assert_eq!(page.items.len(), 4);
        assert!(page.last.is_none());
    }

    #[test]
    fn cursor_survives_deletion_of_last_seen_record() {
        let mut data = records(6);
        let first = paginate(&data, &Query::all(None, Some(2))).unwrap();
        let cursor = first.last.clone().unwrap();
        data.retain(|r| r.id().as_str() != "r001");
        let second = paginate(&data, &Query::all(Some(cursor), Some(2))).unwrap();
        let ids: Vec<_> = second.items.iter().map(|r| r.id().as_str()).collect();
        assert_eq!(ids, vec!["r002", "r003"]);
    }

    #[test]
    fn cursor_from_other_query_is_rejected() {
        let data = records(5);
        let page = paginate(&data, &Query::all(None, Some(2))).unwrap();
        let query = Query::new(Filter::gt("score", 1)).after(page.last);
        let err = paginate(&data, &query).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidArgument(InvalidArgumentError::Cursor { .. })
        ));
    }

    #[test]
    fn fingerprint_covers_order_but_not_paging() {
        let base = Query::new(Filter::gt("score", 1)).sort_by("score", SortDirection::Desc);
        let rebuilt = Query::new(Filter::gt("score", 1))
            .sort_by("score", SortDirection::Desc)
            .page_size(7)
            .after(Some(Cursor::new("anything")));
        assert_eq!(base.fingerprint(), rebuilt.fingerprint());

        let ascending = base.clone().sort_by("score", SortDirection::Asc);
        assert_ne!(base.fingerprint(), ascending.fingerprint());
        let other_key = base.clone().sort_by("name", SortDirection::Desc);
        assert_ne!(base.fingerprint(), other_key.fingerprint());
        let other_filter = Query::new(Filter::gt("score", 2)).sort_by("score", SortDirection::Desc);
        assert_ne!(base.fingerprint(), other_filter.fingerprint());
    }

    #[test]
    fn cursor_resumes_on_an_equal_query() {
        let data = records(5);
        let build = || Query::new(Filter::gt("score", 0)).sort_by("score", SortDirection::Asc);
        let first = paginate(&data, &build().page_size(2)).unwrap();
        let second = paginate(&data, &build().page_size(2).after(first.last)).unwrap();
        assert_eq!(second.items.len(), 2);
    }

    #[test]
    fn garbage_cursor_is_rejected() {
        let data = records(2);
        let query = Query::all(Some(Cursor::new("not a cursor!")), None);
        assert!(paginate(&data, &query).is_err());
    }

    #[test]
    fn zero_page_size_is_rejected_and_large_is_clamped() {
        let data = records(3);
        assert!(paginate(&data, &Query::all(None, Some(0))).is_err());
        let page = paginate(&data, &Query::all(None, Some(usize::MAX))).unwrap();
        assert_eq!(page.items.len(), 3);
    }

    #[test]
    fn missing_sort_values_sort_first() {
        let data = vec![
            Record::from_json(json!({"id": "a", "rank": 2})).unwrap(),
            Record::from_json(json!({"id": "b"})).unwrap(),
            Record::from_json(json!({"id": "c", "rank": 1})).unwrap(),
        ];
        let page = paginate(
            &data,
            &Query::new(Filter::All).sort_by("rank", SortDirection::Asc),
        )
        .unwrap();
        let ids: Vec<_> = page.items.iter().map(|r| r.id().as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }
}
