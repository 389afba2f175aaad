//! Rule Generation - Collaborator Contract and Artifact
//!
//! A generator turns a specification that validated cleanly into rules.
//! Order is the generator's order. Nothing downstream re-sorts it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::serialization;

/// File name of the downloadable rule set
pub const RULES_FILE_NAME: &str = "tests.json";

/// Media type of the downloadable rule set
pub const RULES_MEDIA_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Specification is missing {0}")]
    MissingInput(String),

    #[error("Cannot generate rules: {0}")]
    Unsupported(String),
}

/// Generates rules from a validated specification.
///
/// Only called for input the paired `SpecValidator` accepted. An error here
/// is a defect in the generator, not in the user's specification.
pub trait RuleGenerator {
    fn generate(&self, spec: &Value) -> Result<GeneratedRules, GeneratorError>;
}

impl<F> RuleGenerator for F
where
    F: Fn(&Value) -> Result<GeneratedRules, GeneratorError>,
{
    fn generate(&self, spec: &Value) -> Result<GeneratedRules, GeneratorError> {
        self(spec)
    }
}

/// Generated rules keyed by rule identifier, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratedRules {
    rules: IndexMap<String, Value>,
}

impl GeneratedRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule. A repeated identifier replaces the body in place.
    pub fn insert(&mut self, id: impl Into<String>, body: Value) {
        self.rules.insert(id.into(), body);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.rules.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Rule bodies in generator order
    pub fn bodies(&self) -> impl Iterator<Item = &Value> {
        self.rules.values()
    }

    /// Pretty-printed array of rule bodies, the content of `tests.json`
    pub fn to_tests_json(&self) -> String {
        serialization::encode_sequence(self.bodies())
    }
}

impl FromIterator<(String, Value)> for GeneratedRules {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> GeneratedRules {
        let mut rules = GeneratedRules::new();
        rules.insert("VR-ZZ-0002", json!({"Identifier": "VR-ZZ-0002"}));
        rules.insert("VR-ZZ-0000", json!({"Identifier": "VR-ZZ-0000"}));
        rules.insert("VR-ZZ-0001", json!({"Identifier": "VR-ZZ-0001"}));
        rules
    }

    #[test]
    fn test_bodies_keep_insertion_order() {
        let rules = sample();
        let ids: Vec<_> = rules.ids().collect();
        assert_eq!(ids, ["VR-ZZ-0002", "VR-ZZ-0000", "VR-ZZ-0001"]);
        let first = rules.bodies().next().unwrap();
        assert_eq!(first["Identifier"], "VR-ZZ-0002");
    }

    #[test]
    fn test_tests_json_is_array_of_values() {
        let text = sample().to_tests_json();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            parsed,
            json!([
                {"Identifier": "VR-ZZ-0002"},
                {"Identifier": "VR-ZZ-0000"},
                {"Identifier": "VR-ZZ-0001"}
            ])
        );
    }

    #[test]
    fn test_serializes_as_mapping() {
        let value = serde_json::to_value(sample()).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["VR-ZZ-0002", "VR-ZZ-0000", "VR-ZZ-0001"]);
    }

    #[test]
    fn test_empty_rules() {
        let rules = GeneratedRules::new();
        assert!(rules.is_empty());
        assert_eq!(rules.to_tests_json(), "[]");
    }
}
