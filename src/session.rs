//! Editor Session - input text and its derivation, always in step
//!
//! The input text is the only mutable state. Every edit re-derives from
//! scratch before returning, so the derivation never lags the text.

use crate::generator::RuleGenerator;
use crate::pipeline::{Derivation, DerivationPipeline, PipelineError};
use crate::share::initial_input_text;
use crate::validation::SpecValidator;

pub struct EditorSession<V, G> {
    pipeline: DerivationPipeline<V, G>,
    input: String,
    derived: Derivation,
}

impl<V, G> EditorSession<V, G>
where
    V: SpecValidator,
    G: RuleGenerator,
{
    pub fn new(pipeline: DerivationPipeline<V, G>, input: impl Into<String>) -> Result<Self, PipelineError> {
        let input = input.into();
        let derived = pipeline.derive(&input)?;
        Ok(Self {
            pipeline,
            input,
            derived,
        })
    }

    /// Seed from a page location's `spec` parameter, else the bundled example
    pub fn from_location(
        pipeline: DerivationPipeline<V, G>,
        location: Option<&str>,
    ) -> Result<Self, PipelineError> {
        Self::new(pipeline, initial_input_text(location))
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn derivation(&self) -> &Derivation {
        &self.derived
    }

    /// Replace the input text.
    ///
    /// On a collaborator failure the session keeps its previous text and
    /// derivation, so the two stay consistent.
    pub fn edit(&mut self, input: impl Into<String>) -> Result<&Derivation, PipelineError> {
        let input = input.into();
        let derived = self.pipeline.derive(&input)?;
        self.input = input;
        self.derived = derived;
        Ok(&self.derived)
    }
}
