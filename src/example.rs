//! Bundled example specification, the default editor content

use serde_json::Value;

use crate::serialization::{self, ParseOutcome};

const EXAMPLE_SPEC_SOURCE: &str = include_str!("../assets/example-spec.json");

/// The example specification as structured data
pub fn example_spec() -> Option<Value> {
    match serialization::decode(EXAMPLE_SPEC_SOURCE) {
        ParseOutcome::Parsed(value) => Some(value),
        ParseOutcome::Malformed(_) => None,
    }
}

/// The example specification, pretty-printed the way the editor shows it
pub fn example_spec_text() -> String {
    example_spec()
        .map(|value| serialization::encode(&value))
        .unwrap_or_else(|| EXAMPLE_SPEC_SOURCE.to_string())
}
