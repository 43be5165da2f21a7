//! Subcommand implementations.

pub mod queues;
pub mod records;

use anyhow::{Context, Result};
use serde_json::Value;

/// Parse a command-line value as JSON, falling back to a plain string.
///
/// `42` and `{"a":1}` parse as JSON; `hello` becomes `"hello"`.
pub(crate) fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Parse a command-line argument that must be valid JSON.
pub(crate) fn parse_json(raw: &str, what: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("{} is not valid JSON", what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_words_become_strings() {
        assert_eq!(parse_value("hello"), json!("hello"));
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value("[1,2]"), json!([1, 2]));
        assert_eq!(parse_value("\"quoted\""), json!("quoted"));
    }

    #[test]
    fn strict_json_reports_the_argument() {
        let err = parse_json("{oops", "record").unwrap_err();
        assert!(err.to_string().contains("record"));
    }
}
