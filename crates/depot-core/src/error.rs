//! Error types for depot operations.
//!
//! Every contract operation fails with an [`Error`] whose variant tells the
//! caller what went wrong. Only [`Error::Unavailable`] is worth retrying.

use std::fmt;
use thiserror::Error;

/// The kind of entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Record,
    Queue,
    Message,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Record => "record",
            EntityKind::Queue => "queue",
            EntityKind::Message => "message",
        };
        f.write_str(name)
    }
}

/// The unified error type for depot operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The targeted record, queue or message does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: EntityKind, name: String },

    /// A record with the same id already exists.
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: EntityKind, name: String },

    /// A field-level operation hit a field holding an incompatible value.
    #[error("field '{key}' holds a {found}, expected a {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Malformed input (filter, cursor, id, option).
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] InvalidArgumentError),

    /// Transient backing-service failure.
    #[error("backend unavailable: {message}")]
    Unavailable { message: String },
}

impl Error {
    pub fn record_not_found(id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: EntityKind::Record,
            name: id.into(),
        }
    }

    pub fn queue_not_found(name: impl Into<String>) -> Self {
        Error::NotFound {
            kind: EntityKind::Queue,
            name: name.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Error::Unavailable {
            message: message.into(),
        }
    }

    /// Returns true if the caller may retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Unavailable { .. })
    }

    /// Returns true for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Unavailable {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidArgument(InvalidArgumentError::Json {
            message: err.to_string(),
        })
    }
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidArgumentError {
    /// Invalid record id.
    #[error("invalid record id '{value}': {reason}")]
    RecordId { value: String, reason: String },

    /// Invalid queue name.
    #[error("invalid queue name '{value}': {reason}")]
    QueueName { value: String, reason: String },

    /// Invalid backend URL.
    #[error("invalid backend URL '{value}': {reason}")]
    BackendUrl { value: String, reason: String },

    /// Malformed query filter.
    #[error("invalid filter: {reason}")]
    Filter { reason: String },

    /// Malformed or mismatched pagination cursor.
    #[error("invalid cursor: {reason}")]
    Cursor { reason: String },

    /// Record payload that is not a usable record.
    #[error("invalid record: {reason}")]
    Record { reason: String },

    /// Queue option outside its allowed range.
    #[error("invalid queue option '{option}': {reason}")]
    QueueOption { option: &'static str, reason: String },

    /// Receipt handle that no longer matches the current delivery.
    #[error("receipt handle for message '{message_id}' is no longer valid")]
    StaleReceipt { message_id: String },

    /// JSON (de)serialization failure.
    #[error("malformed JSON: {message}")]
    Json { message: String },

    /// Generic invalid input.
    #[error("{message}")]
    Other { message: String },
}
