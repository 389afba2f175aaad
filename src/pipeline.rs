//! Derivation Pipeline - Single Entry Point
//!
//! CRITICAL: generation only ever runs on text that parsed AND validated.
//! `derive` is pure: same text in, same derivation out, no I/O.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::generator::{GeneratedRules, GeneratorError, RuleGenerator};
use crate::serialization::{self, ParseOutcome};
use crate::validation::{SpecValidator, ValidationOutcome};

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The generator rejected a specification its validator accepted
    #[error("Rule generator failed on a validated specification: {0}")]
    ContractViolation(#[from] GeneratorError),
}

/// Message reported when the input text is not JSON
pub fn parse_failure_message(reason: &str) -> String {
    format!("Could not parse specification text as JSON: {}.", reason)
}

/// Everything derived from one input text
#[derive(Debug, Clone, PartialEq)]
pub struct Derivation {
    pub parse: ParseOutcome,
    pub validation: ValidationOutcome,
    pub artifact: Option<GeneratedRules>,
}

impl Derivation {
    pub fn is_valid(&self) -> bool {
        self.validation.is_valid()
    }

    pub fn errors(&self) -> &[String] {
        self.validation.errors()
    }

    pub fn artifact(&self) -> Option<&GeneratedRules> {
        self.artifact.as_ref()
    }

    /// Rule bodies in generator order, empty when there is no artifact
    pub fn rule_bodies(&self) -> Vec<&Value> {
        self.artifact
            .as_ref()
            .map(|rules| rules.bodies().collect())
            .unwrap_or_default()
    }

    /// Content of `tests.json`, present only for a valid specification
    pub fn tests_json(&self) -> Option<String> {
        self.artifact.as_ref().map(GeneratedRules::to_tests_json)
    }
}

/// The derivation pipeline: parse, validate, generate
pub struct DerivationPipeline<V, G> {
    validator: V,
    generator: G,
}

impl<V, G> DerivationPipeline<V, G>
where
    V: SpecValidator,
    G: RuleGenerator,
{
    pub fn new(validator: V, generator: G) -> Self {
        Self {
            validator,
            generator,
        }
    }

    /// Derive parse, validation and artifact from `input`.
    ///
    /// Malformed text and rejected specifications are ordinary outcomes.
    /// The only error is a generator failing on a validated specification.
    pub fn derive(&self, input: &str) -> Result<Derivation, PipelineError> {
        let parse = serialization::decode(input);

        let (validation, artifact) = match &parse {
            ParseOutcome::Malformed(reason) => (
                ValidationOutcome::Invalid(vec![parse_failure_message(reason)]),
                None,
            ),
            ParseOutcome::Parsed(value) => {
                match ValidationOutcome::from_errors(self.validator.validate(value)) {
                    ValidationOutcome::Valid => {
                        let rules = self.generator.generate(value)?;
                        (ValidationOutcome::Valid, Some(rules))
                    }
                    invalid => (invalid, None),
                }
            }
        };

        debug!(
            input_len = input.len(),
            parsed = parse.is_parsed(),
            errors = validation.errors().len(),
            rules = artifact.as_ref().map_or(0, GeneratedRules::len),
            "derived specification state"
        );

        Ok(Derivation {
            parse,
            validation,
            artifact,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    fn requires_name(spec: &Value) -> Vec<String> {
        match spec.get("Name") {
            Some(Value::String(_)) => vec![],
            _ => vec!["Missing required field \"Name\".".to_string()],
        }
    }

    fn one_rule_per_name(spec: &Value) -> Result<GeneratedRules, GeneratorError> {
        let name = spec["Name"].as_str().unwrap_or_default();
        let mut rules = GeneratedRules::new();
        rules.insert(format!("R-{}", name), json!({"Name": name}));
        Ok(rules)
    }

    #[test]
    fn test_malformed_yields_single_error() {
        let pipeline = DerivationPipeline::new(requires_name, one_rule_per_name);
        let derived = pipeline.derive("{").unwrap();
        assert!(!derived.is_valid());
        assert_eq!(derived.errors().len(), 1);
        assert!(derived.errors()[0].starts_with("Could not parse specification text as JSON: "));
        assert!(derived.errors()[0].ends_with('.'));
        assert!(derived.artifact().is_none());
    }

    #[test]
    fn test_schema_errors_verbatim() {
        let validator = |_: &Value| vec!["b".to_string(), "a".to_string()];
        let pipeline = DerivationPipeline::new(validator, one_rule_per_name);
        let derived = pipeline.derive("{}").unwrap();
        assert_eq!(derived.errors(), ["b", "a"]);
        assert!(derived.tests_json().is_none());
        assert!(derived.rule_bodies().is_empty());
    }

    #[test]
    fn test_valid_produces_artifact() {
        let pipeline = DerivationPipeline::new(requires_name, one_rule_per_name);
        let derived = pipeline.derive(r#"{"Name": "x"}"#).unwrap();
        assert!(derived.is_valid());
        assert_eq!(derived.rule_bodies(), vec![&json!({"Name": "x"})]);
    }

    #[test]
    fn test_generator_not_called_when_invalid() {
        let calls = Cell::new(0);
        let generator = |spec: &Value| {
            calls.set(calls.get() + 1);
            one_rule_per_name(spec)
        };
        let pipeline = DerivationPipeline::new(requires_name, generator);
        pipeline.derive("{}").unwrap();
        pipeline.derive("nope").unwrap();
        assert_eq!(calls.get(), 0);
        pipeline.derive(r#"{"Name": "y"}"#).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_generator_failure_propagates() {
        let generator = |_: &Value| -> Result<GeneratedRules, GeneratorError> {
            Err(GeneratorError::Unsupported("boom".into()))
        };
        let pipeline = DerivationPipeline::new(requires_name, generator);
        let err = pipeline.derive(r#"{"Name": "x"}"#).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_derive_is_repeatable() {
        let pipeline = DerivationPipeline::new(requires_name, one_rule_per_name);
        let text = r#"{"Name": "same"}"#;
        assert_eq!(pipeline.derive(text).unwrap(), pipeline.derive(text).unwrap());
    }
}
