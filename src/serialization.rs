//! Text Serialization - JSON in, JSON out
//!
//! Encoding is a stable pretty-print. Decoding never fails past this
//! boundary: malformed text becomes a `ParseOutcome::Malformed`.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(Value),
    Malformed(String),
}

impl ParseOutcome {
    pub fn value(&self) -> Option<&Value> {
        match self {
            ParseOutcome::Parsed(value) => Some(value),
            ParseOutcome::Malformed(_) => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseOutcome::Parsed(_))
    }
}

/// Pretty-print with two-space indentation, keys in source order
pub fn encode(value: &Value) -> String {
    // Serializing a Value cannot fail: every key is already a string.
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Pretty-print a sequence of values as a JSON array
pub fn encode_sequence<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = &'a Value>,
{
    let array: Vec<&Value> = values.into_iter().collect();
    serde_json::to_string_pretty(&array).unwrap_or_default()
}

pub fn decode(text: &str) -> ParseOutcome {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => ParseOutcome::Parsed(value),
        Err(e) => ParseOutcome::Malformed(e.to_string()),
    }
}
