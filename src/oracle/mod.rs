//! Extraction and synthesis oracles.
//!
//! Both steps are opaque to the pipeline: an extractor turns free text into
//! a [`Specification`], a synthesizer turns a specification (plus feedback
//! from the previous failed attempt) into simulation source code.

mod command;
mod fence;

use thiserror::Error;

use crate::spec::{SpecError, Specification};

pub use command::{CommandExtractor, CommandOracle, CommandSynthesizer};
pub use fence::{extract_json_object, strip_code_fences, unescape_html_entities};

/// Trace format generated code must print, handed to synthesizers.
pub const TRACE_FORMAT: &str = "\
[SIM] Starting simulation
[SIM][t=<float>] ENTER state=<name>
[SIM][t=<float>] WAIT <float>s for <name>
[SIM][t=<float>] TRANSITION <from> -> <to> (reason=<text>)
[SIM][t=<float>] END state=<final>
[SIM][t=<float>] ERROR <text>";

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("failed to run oracle '{program}': {message}")]
    Launch { program: String, message: String },

    #[error("oracle '{program}' timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("oracle '{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("oracle returned an empty answer")]
    EmptyAnswer,

    #[error("oracle answer contains no JSON object")]
    NoJsonObject,

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error("failed to encode oracle request: {0}")]
    Request(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type OracleResult<T> = Result<T, OracleError>;

/// Free text → specification.
pub trait SpecExtractor {
    fn extract(&self, text: &str) -> OracleResult<Specification>;
}

/// Specification (+ feedback) → simulation code.
pub trait CodeSynthesizer {
    fn synthesize(&self, spec: &Specification, feedback: Option<&str>) -> OracleResult<String>;
}

impl<F> SpecExtractor for F
where
    F: Fn(&str) -> OracleResult<Specification>,
{
    fn extract(&self, text: &str) -> OracleResult<Specification> {
        self(text)
    }
}

impl<F> CodeSynthesizer for F
where
    F: Fn(&Specification, Option<&str>) -> OracleResult<String>,
{
    fn synthesize(&self, spec: &Specification, feedback: Option<&str>) -> OracleResult<String> {
        self(spec, feedback)
    }
}

/// Parse an extraction answer: strip fences, find the JSON object, and
/// reject specifications with nothing in them.
pub fn parse_spec_answer(answer: &str) -> OracleResult<Specification> {
    let cleaned = strip_code_fences(answer);
    if cleaned.is_empty() {
        return Err(OracleError::EmptyAnswer);
    }
    let json = extract_json_object(&cleaned).ok_or(OracleError::NoJsonObject)?;
    Ok(Specification::from_json_checked(json)?)
}

/// Treats the input text as specification JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSpecExtractor;

impl SpecExtractor for JsonSpecExtractor {
    fn extract(&self, text: &str) -> OracleResult<Specification> {
        parse_spec_answer(text)
    }
}
