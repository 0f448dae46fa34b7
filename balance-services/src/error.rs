//! Service-level error type

use balance_core::InsightError;
use balance_embedding::EmbeddingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Insight(#[from] InsightError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Categorization error: {0}")]
    Categorization(String),

    #[error("Fallback write failed after store error ({store_error}): {source}")]
    FallbackWrite {
        store_error: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is not configured")]
    Unavailable(&'static str),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }

    /// True when the caller sent malformed input rather than a collaborator failing
    ///
    /// Dimension mismatches come from stored embeddings, so they are not the caller's fault.
    pub fn is_client_error(&self) -> bool {
        match self {
            ServiceError::Insight(InsightError::DimensionMismatch { .. }) => false,
            ServiceError::Insight(_) | ServiceError::Validation(_) => true,
            ServiceError::Embedding(EmbeddingError::EmptyInput) => true,
            _ => false,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
