//! Query filters.

use serde_json::Value;

use super::{FieldValue, Record};
use crate::error::{Error, InvalidArgumentError};

/// A predicate over records.
///
/// Keys are dotted paths resolved with [`Record::lookup`]; `id` addresses
/// the record id.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// Matches every record.
    #[default]
    All,
    Eq(String, FieldValue),
    /// Matches when the field is absent or differs from the value.
    Ne(String, FieldValue),
    Gt(String, FieldValue),
    Gte(String, FieldValue),
    Lt(String, FieldValue),
    Lte(String, FieldValue),
    /// Matches when the field equals any of the values.
    In(String, Vec<FieldValue>),
    /// List/set membership, substring for strings, key presence for maps.
    Contains(String, FieldValue),
    /// Matches when the field is present (a null value counts as present).
    Exists(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

fn invalid(reason: impl Into<String>) -> Error {
    InvalidArgumentError::Filter {
        reason: reason.into(),
    }
    .into()
}

impl Filter {
    pub fn eq(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Filter::Eq(key.into(), value.into())
    }

    pub fn ne(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Filter::Ne(key.into(), value.into())
    }

    pub fn gt(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Filter::Gt(key.into(), value.into())
    }

    pub fn gte(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Filter::Gte(key.into(), value.into())
    }

    pub fn lt(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Filter::Lt(key.into(), value.into())
    }

    pub fn lte(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Filter::Lte(key.into(), value.into())
    }

    pub fn contains(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Filter::Contains(key.into(), value.into())
    }

    pub fn exists(key: impl Into<String>) -> Self {
        Filter::Exists(key.into())
    }

    /// Check that the filter is well formed.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` for empty keys, empty `And`/`Or`/`In`
    /// lists, and range comparisons against non-scalar operands.
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Filter::All => Ok(()),
            Filter::Eq(key, _) | Filter::Ne(key, _) | Filter::Contains(key, _) => {
                validate_key(key)
            }
            Filter::Exists(key) => validate_key(key),
            Filter::Gt(key, value)
            | Filter::Gte(key, value)
            | Filter::Lt(key, value)
            | Filter::Lte(key, value) => {
                validate_key(key)?;
                if !value.is_scalar() || matches!(value, FieldValue::Null) {
                    return Err(invalid(format!(
                        "range comparison on '{}' needs a bool, number or string operand, got a {}",
                        key,
                        value.type_name()
                    )));
                }
                Ok(())
            }
            Filter::In(key, values) => {
                validate_key(key)?;
                if values.is_empty() {
                    return Err(invalid(format!("'in' on '{}' needs at least one value", key)));
                }
                Ok(())
            }
            Filter::And(filters) | Filter::Or(filters) => {
                if filters.is_empty() {
                    return Err(invalid("'and'/'or' need at least one clause"));
                }
                filters.iter().try_for_each(Filter::validate)
            }
            Filter::Not(inner) => inner.validate(),
        }
    }

    /// Evaluate the filter against a record.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(key, value) => record.lookup(key).is_some_and(|v| v.as_ref() == value),
            Filter::Ne(key, value) => !record.lookup(key).is_some_and(|v| v.as_ref() == value),
            Filter::Gt(key, value) => compare(record, key, value, |o| o.is_gt()),
            Filter::Gte(key, value) => compare(record, key, value, |o| o.is_ge()),
            Filter::Lt(key, value) => compare(record, key, value, |o| o.is_lt()),
            Filter::Lte(key, value) => compare(record, key, value, |o| o.is_le()),
            Filter::In(key, values) => record
                .lookup(key)
                .is_some_and(|v| values.iter().any(|candidate| candidate == v.as_ref())),
            Filter::Contains(key, value) => {
                record
                    .lookup(key)
                    .is_some_and(|field| match (field.as_ref(), value) {
                        (FieldValue::List(items) | FieldValue::Set(items), _) => {
                            items.contains(value)
                        }
                        (FieldValue::String(haystack), FieldValue::String(needle)) => {
                            haystack.contains(needle.as_str())
                        }
                        (FieldValue::Map(map), FieldValue::String(key)) => map.contains_key(key),
                        _ => false,
                    })
            }
            Filter::Exists(key) => record.lookup(key).is_some(),
            Filter::And(filters) => filters.iter().all(|f| f.matches(record)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(record)),
            Filter::Not(inner) => !inner.matches(record),
        }
    }

    /// Parse the JSON filter form.
    ///
    /// ```text
    /// {}                                   all records
    /// {"status": "open"}                   equality
    /// {"age": {"$gte": 18, "$lt": 65}}     operators on one field
    /// {"$or": [{...}, {...}]}              disjunction ($and, $not alike)
    /// ```
    ///
    /// Supported field operators: `$eq $ne $gt $gte $lt $lte $in $contains
    /// $exists`. A value of the form `{"$set": [...]}` is a literal set.
    pub fn from_json(value: &Value) -> Result<Self, Error> {
        let obj = value
            .as_object()
            .ok_or_else(|| invalid("filter must be a JSON object"))?;

        let mut clauses = Vec::new();
        for (key, operand) in obj {
            match key.as_str() {
                "$and" | "$or" => {
                    let items = operand
                        .as_array()
                        .ok_or_else(|| invalid(format!("'{}' takes an array of filters", key)))?;
                    let parsed = items
                        .iter()
                        .map(Filter::from_json)
                        .collect::<Result<Vec<_>, _>>()?;
                    clauses.push(if key == "$and" {
                        Filter::And(parsed)
                    } else {
                        Filter::Or(parsed)
                    });
                }
                "$not" => clauses.push(Filter::Not(Box::new(Filter::from_json(operand)?))),
                other if other.starts_with('$') => {
                    return Err(invalid(format!("unknown top-level operator '{}'", other)));
                }
                field => clauses.extend(parse_field(field, operand)?),
            }
        }

        let filter = match clauses.len() {
            0 => Filter::All,
            1 => clauses.remove(0),
            _ => Filter::And(clauses),
        };
        filter.validate()?;
        Ok(filter)
    }
}

fn validate_key(key: &str) -> Result<(), Error> {
    if key.is_empty() || key.split('.').any(str::is_empty) {
        return Err(invalid(format!("'{}' is not a valid field path", key)));
    }
    Ok(())
}

fn compare(
    record: &Record,
    key: &str,
    operand: &FieldValue,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> bool {
    let Some(field) = record.lookup(key) else {
        return false;
    };
    let field = field.as_ref();
    // Range comparisons only hold between values of the same kind.
    if std::mem::discriminant(field) != std::mem::discriminant(operand) {
        return false;
    }
    accept(field.total_cmp(operand))
}

fn is_operator_object(value: &Value) -> bool {
    value.as_object().is_some_and(|obj| {
        !obj.is_empty()
            && obj.keys().all(|k| k.starts_with('$'))
            && !(obj.len() == 1 && obj.contains_key(super::value::SET_MARKER))
    })
}

fn parse_field(field: &str, operand: &Value) -> Result<Vec<Filter>, Error> {
    if !is_operator_object(operand) {
        return Ok(vec![Filter::Eq(
            field.to_string(),
            FieldValue::from(operand.clone()),
        )]);
    }

    let mut filters = Vec::new();
    // Checked by is_operator_object.
    let Some(ops) = operand.as_object() else {
        return Ok(filters);
    };

    for (op, arg) in ops {
        let key = field.to_string();
        let value = || FieldValue::from(arg.clone());
        let filter = match op.as_str() {
            "$eq" => Filter::Eq(key, value()),
            "$ne" => Filter::Ne(key, value()),
            "$gt" => Filter::Gt(key, value()),
            "$gte" => Filter::Gte(key, value()),
            "$lt" => Filter::Lt(key, value()),
            "$lte" => Filter::Lte(key, value()),
            "$contains" => Filter::Contains(key, value()),
            "$in" => {
                let items = arg
                    .as_array()
                    .ok_or_else(|| invalid(format!("'$in' on '{}' takes an array", field)))?;
                Filter::In(key, items.iter().cloned().map(FieldValue::from).collect())
            }
            "$exists" => match arg {
                Value::Bool(true) => Filter::Exists(key),
                Value::Bool(false) => Filter::Not(Box::new(Filter::Exists(key))),
                _ => return Err(invalid(format!("'$exists' on '{}' takes a bool", field))),
            },
            other => {
                return Err(invalid(format!(
                    "unknown operator '{}' on '{}'",
                    other, field
                )));
            }
        };
        filters.push(filter);
    }
    Ok(filters)
}
