//! Validation - Collaborator Contract and Outcome
//!
//! The validator itself is external: anything implementing `SpecValidator`
//! can sit behind the pipeline. It reports problems, the pipeline decides.

use serde::Serialize;
use serde_json::Value;

/// Placeholder shown when a specification has no validation errors
pub const NO_ERRORS: &str = "(None.)";

/// Validates a parsed specification.
///
/// Implementations must be deterministic and must not depend on anything
/// but `spec`. An empty vector means "no errors"; otherwise the messages are
/// reported verbatim and in order.
pub trait SpecValidator {
    fn validate(&self, spec: &Value) -> Vec<String>;
}

impl<F> SpecValidator for F
where
    F: Fn(&Value) -> Vec<String>,
{
    fn validate(&self, spec: &Value) -> Vec<String> {
        self(spec)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "errors", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Valid,
    /// Never empty
    Invalid(Vec<String>),
}

impl ValidationOutcome {
    /// Collapse validator output into an outcome
    pub fn from_errors(errors: Vec<String>) -> Self {
        if errors.is_empty() {
            ValidationOutcome::Valid
        } else {
            ValidationOutcome::Invalid(errors)
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }

    pub fn errors(&self) -> &[String] {
        match self {
            ValidationOutcome::Valid => &[],
            ValidationOutcome::Invalid(errors) => errors,
        }
    }

    /// Text for the validation panel: the placeholder, the lone message,
    /// or a numbered list.
    pub fn display(&self) -> String {
        match self.errors() {
            [] => NO_ERRORS.to_string(),
            [single] => single.clone(),
            many => many
                .iter()
                .enumerate()
                .map(|(i, message)| format!("{}. {}", i + 1, message))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}
