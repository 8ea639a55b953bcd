//! Inference error taxonomy.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    #[error("unsatisfiable inference query: {0}")]
    Unsatisfiable(String),

    #[error("inference did not converge within the configured step budget")]
    InferenceTimeout,

    #[error("if_ condition is neither a known boolean nor ANYTHING: {0}")]
    InvalidCondition(String),

    #[error(transparent)]
    Core(#[from] myia_core::CoreError),
}
