//! Engine error types.

use statecode_encoding::{ContainerId, EncodingError, EvaluatorId};
use thiserror::Error;

/// Errors from executing an instruction stream.
///
/// A failure aborts the current stream only; side effects already produced
/// stay, and later `execute` calls for other containers are unaffected.
/// The host decides whether to raise an internal error event for it.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("evaluation of evaluator {evaluator} failed: {reason}")]
    Evaluation {
        evaluator: EvaluatorId,
        reason: String,
    },

    #[error("data model property '{name}': {reason}")]
    Property { name: String, reason: String },

    #[error("invalid <send> in {location}: {reason}")]
    Send { location: String, reason: String },

    #[error("invalid delay '{value}': {reason}")]
    InvalidDelay { value: String, reason: String },

    #[error("container id {id} does not reference an instruction stream")]
    InvalidContainer { id: ContainerId },

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

impl EngineError {
    /// Returns the internal event name the host should raise for this
    /// failure.
    pub fn error_event(&self) -> &'static str {
        match self {
            EngineError::Evaluation { .. } => "error.execution",
            EngineError::Property { .. } => "error.execution",
            EngineError::Send { .. } => "error.communication",
            EngineError::InvalidDelay { .. } => "error.execution",
            EngineError::InvalidContainer { .. } => "error.platform",
            EngineError::Encoding(_) => "error.platform",
        }
    }
}
