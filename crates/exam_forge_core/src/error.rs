//! crates/exam_forge_core/src/error.rs
//!
//! Errors raised by the generation pipeline itself.

use std::fmt;

use crate::ports::PortError;

/// Why a generation produced no usable result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationFailure {
    /// The service answered with no output at all.
    EmptyOutput,
    /// The output did not match the mode's shape.
    MalformedOutput,
    /// The output broke a cardinality or membership rule of the mode.
    ConstraintViolated,
    /// The service call itself failed.
    ServiceUnavailable,
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GenerationFailure::EmptyOutput => "empty-output",
            GenerationFailure::MalformedOutput => "malformed-output",
            GenerationFailure::ConstraintViolated => "constraint-violated",
            GenerationFailure::ServiceUnavailable => "service-unavailable",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    /// No usable input was supplied for the selected mode.
    #[error("No study material was provided")]
    InputMissing,

    #[error("Generation failed ({kind}): {detail}")]
    GenerationFailed {
        kind: GenerationFailure,
        detail: String,
    },
}

impl StudyError {
    pub fn generation(kind: GenerationFailure, detail: impl Into<String>) -> Self {
        StudyError::GenerationFailed {
            kind,
            detail: detail.into(),
        }
    }

    /// The failure kind, if this is a generation failure.
    pub fn failure_kind(&self) -> Option<GenerationFailure> {
        match self {
            StudyError::GenerationFailed { kind, .. } => Some(*kind),
            StudyError::InputMissing => None,
        }
    }
}

impl From<PortError> for StudyError {
    fn from(e: PortError) -> Self {
        StudyError::generation(GenerationFailure::ServiceUnavailable, e.to_string())
    }
}
