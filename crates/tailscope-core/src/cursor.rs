//! Opaque fetch cursor
//!
//! The deployment hands back a cursor with every batch; the client never
//! fabricates one, it only echoes the last one it received.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-issued token bounding what has already been fetched
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cursor {
    Numeric(i64),
    Text(String),
}

impl Cursor {
    /// Encoding used when the cursor travels in a query string
    pub fn to_query_value(&self) -> String {
        match self {
            Cursor::Numeric(n) => n.to_string(),
            Cursor::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Numeric(n) => write!(f, "{}", n),
            Cursor::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for Cursor {
    fn from(n: i64) -> Self {
        Cursor::Numeric(n)
    }
}

impl From<&str> for Cursor {
    fn from(s: &str) -> Self {
        Cursor::Text(s.to_string())
    }
}

impl From<String> for Cursor {
    fn from(s: String) -> Self {
        Cursor::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_decodes_numbers_and_strings() {
        let n: Cursor = serde_json::from_str("1700000000123").unwrap();
        assert_eq!(n, Cursor::Numeric(1_700_000_000_123));

        let s: Cursor = serde_json::from_str(r#""opaque-token""#).unwrap();
        assert_eq!(s, Cursor::from("opaque-token"));
    }

    #[test]
    fn test_query_value() {
        assert_eq!(Cursor::from(7).to_query_value(), "7");
        assert_eq!(Cursor::from("a b").to_query_value(), "a b");
        assert_eq!(Cursor::from("b").to_string(), "\"b\"");
    }
}
