//! Backend URL type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

use crate::error::{Error, InvalidArgumentError};

/// A validated backend locator.
///
/// Two schemes are understood:
///
/// - `memory:` selects the non-persistent in-memory adapters.
/// - `file:///path/to/root` selects the filesystem adapters rooted at
///   the given directory.
///
/// # Example
///
/// ```
/// use depot_core::BackendUrl;
///
/// let local = BackendUrl::new("file:///tmp/depot").unwrap();
/// assert!(local.is_local());
///
/// let memory = BackendUrl::new("memory:").unwrap();
/// assert!(memory.is_memory());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BackendUrl(Url);

impl BackendUrl {
    /// Create a new backend URL from a string, validating the format.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let url = Url::parse(s).map_err(|e| InvalidArgumentError::BackendUrl {
            value: s.to_string(),
            reason: e.to_string(),
        })?;

        Self::validate(&url, s)?;

        Ok(Self(url))
    }

    /// Build a `file://` backend URL from a filesystem path.
    pub fn from_directory(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let url = Url::from_directory_path(path).map_err(|_| InvalidArgumentError::BackendUrl {
            value: path.display().to_string(),
            reason: "path must be absolute".to_string(),
        })?;
        Ok(Self(url))
    }

    /// Returns the URL as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the URL scheme ("memory" or "file").
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// Returns true if this is a filesystem backend (file:// URL).
    pub fn is_local(&self) -> bool {
        self.0.scheme() == "file"
    }

    /// Returns true if this is the in-memory backend.
    pub fn is_memory(&self) -> bool {
        self.0.scheme() == "memory"
    }

    /// Returns the filesystem path for file:// URLs.
    ///
    /// Returns `None` for non-file URLs.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        if self.is_local() {
            self.0.to_file_path().ok()
        } else {
            None
        }
    }

    fn validate(url: &Url, original: &str) -> Result<(), Error> {
        match url.scheme() {
            "memory" => Ok(()),
            "file" => {
                if url.path().is_empty() || url.path() == "/" {
                    return Err(InvalidArgumentError::BackendUrl {
                        value: original.to_string(),
                        reason: "file:// URL must name a directory".to_string(),
                    }
                    .into());
                }
                Ok(())
            }
            other => Err(InvalidArgumentError::BackendUrl {
                value: original.to_string(),
                reason: format!("unsupported scheme '{}' (expected file or memory)", other),
            }
            .into()),
        }
    }
}

impl fmt::Display for BackendUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BackendUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for BackendUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for BackendUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BackendUrl::new(&s).map_err(serde::de::Error::custom)
    }
}

impl AsRef<str> for BackendUrl {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}
