//! Queue name type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, InvalidArgumentError};

const FIFO_SUFFIX: &str = ".fifo";

/// A validated queue name.
///
/// Names are 1-80 characters of ASCII alphanumerics, `-` and `_`, with an
/// optional `.fifo` suffix (which counts toward the length).
///
/// # Example
///
/// ```
/// use depot_core::QueueName;
///
/// let name = QueueName::new("orders.fifo").unwrap();
/// assert!(name.has_fifo_suffix());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueName(String);

impl QueueName {
    /// Create a new queue name from a string, validating the format.
    pub fn new(s: impl Into<String>) -> Result<Self, Error> {
        let s = s.into();
        Self::validate(&s)?;
        Ok(Self(s))
    }

    /// Returns the name string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the name ends in `.fifo`.
    pub fn has_fifo_suffix(&self) -> bool {
        self.0.ends_with(FIFO_SUFFIX)
    }

    fn validate(s: &str) -> Result<(), Error> {
        let invalid = |reason: String| -> Error {
            InvalidArgumentError::QueueName {
                value: s.to_string(),
                reason,
            }
            .into()
        };

        if s.is_empty() {
            return Err(invalid("cannot be empty".to_string()));
        }

        if s.len() > 80 {
            return Err(invalid(
                "exceeds maximum length of 80 characters".to_string(),
            ));
        }

        let base = s.strip_suffix(FIFO_SUFFIX).unwrap_or(s);
        if base.is_empty() {
            return Err(invalid("must have a name before '.fifo'".to_string()));
        }

        if let Some(c) = base
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
        {
            return Err(invalid(format!("contains invalid character '{}'", c)));
        }

        Ok(())
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for QueueName {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<QueueName> for String {
    fn from(name: QueueName) -> Self {
        name.0
    }
}

impl AsRef<str> for QueueName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(QueueName::new("jobs").is_ok());
        assert!(QueueName::new("email_outbound-2").is_ok());
        assert!(QueueName::new("payments.fifo").unwrap().has_fifo_suffix());
    }

    #[test]
    fn invalid_empty_and_bare_suffix() {
        assert!(QueueName::new("").is_err());
        assert!(QueueName::new(".fifo").is_err());
    }

    #[test]
    fn invalid_characters() {
        assert!(QueueName::new("jobs.high").is_err());
        assert!(QueueName::new("jobs queue").is_err());
    }

    #[test]
    fn invalid_too_long() {
        assert!(QueueName::new("q".repeat(81)).is_err());
        assert!(QueueName::new("q".repeat(80)).is_ok());
    }
}
