//! Error types for the intelligence core

use thiserror::Error;

/// Contract violations raised by the insight engine.
///
/// "Not enough data" is never an error: the engine answers with an empty
/// result instead. These variants are reserved for malformed input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InsightError {
    #[error("Query vector is empty")]
    EmptyQuery,

    #[error("Embedding dimension mismatch for candidate {id}: expected {expected}, got {actual}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("Vector length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("Invalid limit: {0} (must be positive)")]
    InvalidLimit(usize),

    #[error("Invalid transaction record: {0}")]
    InvalidRecord(String),
}

impl InsightError {
    pub fn dimension_mismatch(id: impl Into<String>, expected: usize, actual: usize) -> Self {
        InsightError::DimensionMismatch {
            id: id.into(),
            expected,
            actual,
        }
    }

    pub fn invalid_record(msg: impl Into<String>) -> Self {
        InsightError::InvalidRecord(msg.into())
    }
}

/// Result type alias for insight operations
pub type InsightResult<T> = Result<T, InsightError>;
