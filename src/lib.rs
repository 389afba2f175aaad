//! DCC Rules Core - specification editor pipeline
//!
//! # Ground Rules
//! 1. Input Text Is The Only State
//! 2. Derivation Is Pure And Total
//! 3. Validators Report, The Pipeline Decides
//! 4. Rules Keep Generator Order
//! 5. Share Links Round-Trip Exactly
//! 6. Acknowledgments End With Their Animation

pub mod serialization;
pub mod validation;
pub mod generator;
pub mod pipeline;
pub mod session;
pub mod share;
pub mod export;
pub mod example;
pub mod hashing;
pub mod vaccination;

pub use serialization::{decode, encode, ParseOutcome};
pub use validation::{SpecValidator, ValidationOutcome};
pub use generator::{GeneratedRules, GeneratorError, RuleGenerator};
pub use pipeline::{Derivation, DerivationPipeline, PipelineError};
pub use session::EditorSession;
pub use share::{decode_from_location, encode_to_shareable_url, initial_input_text, ShareLinkError};
pub use export::{Ack, AckIndicator, ExportAction, ExportChannel, ExportError, ExportFile, SaveReceipt};
pub use vaccination::{VaccinationRuleGenerator, VaccinationValidator};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pipeline wired to the bundled vaccination rules engine
pub fn reference_pipeline() -> DerivationPipeline<VaccinationValidator, VaccinationRuleGenerator> {
    DerivationPipeline::new(VaccinationValidator::new(), VaccinationRuleGenerator::default())
}
