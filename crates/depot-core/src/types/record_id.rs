//! Record id type.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, InvalidArgumentError};

/// A validated record id.
///
/// Record ids are the primary key of a record store. The accepted alphabet
/// keeps every id usable as a file name, so adapters can map ids onto
/// storage paths without escaping.
///
/// # Example
///
/// ```
/// use depot_core::RecordId;
///
/// let id = RecordId::new("user:42").unwrap();
/// assert_eq!(id.as_str(), "user:42");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    /// Create a new record id from a string, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid record id.
    pub fn new(s: impl Into<String>) -> Result<Self, Error> {
        let s = s.into();
        Self::validate(&s)?;
        Ok(Self(s))
    }

    /// Returns the id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), Error> {
        // - 1-512 characters
        // - a-z, A-Z, 0-9, '.', '-', '_', '~', ':'
        // - not "." or ".."
        let invalid = |reason: String| -> Error {
            InvalidArgumentError::RecordId {
                value: s.to_string(),
                reason,
            }
            .into()
        };

        if s.is_empty() {
            return Err(invalid("cannot be empty".to_string()));
        }

        if s.len() > 512 {
            return Err(invalid(
                "exceeds maximum length of 512 characters".to_string(),
            ));
        }

        if s == "." || s == ".." {
            return Err(invalid("cannot be '.' or '..'".to_string()));
        }

        if let Some(c) = s
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '.' | '-' | '_' | '~' | ':'))
        {
            return Err(invalid(format!("contains invalid character '{}'", c)));
        }

        Ok(())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RecordId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<&str> for RecordId {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RecordId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
