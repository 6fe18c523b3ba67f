//! Error taxonomy shared by every stage of the pipeline.
//!
//! Errors fall into two families. User-facing negative results
//! ([`RagError::EmptyIndex`], [`RagError::NoRelevantContext`],
//! [`RagError::InvalidInput`], [`RagError::NotFound`]) are normal outcomes
//! that callers surface as "no answer" messages. Service failures
//! ([`RagError::EmbeddingService`], [`RagError::CompletionService`]) are
//! retryable by the caller. The remaining variants indicate misconfiguration
//! or storage trouble.

use thiserror::Error;

pub type RagResult<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RagError {
    /// Invalid chunking, dedup, or provider parameters.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The embedding call failed or returned an empty/malformed result.
    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// A vector with the wrong dimensionality reached the index.
    #[error("dimension mismatch: index holds {expected}-d vectors, got {actual}-d")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A search was attempted before anything was indexed.
    #[error("no lecture material has been indexed yet")]
    EmptyIndex,

    /// Retrieval found chunks but none fit into the context budget.
    #[error("couldn't find relevant lecture material for this question")]
    NoRelevantContext,

    /// The completion call failed or returned no choices.
    #[error("completion service error: {0}")]
    CompletionService(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl RagError {
    /// True for valid negative outcomes that should reach the user as a
    /// 4xx-style message rather than a service failure.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            RagError::EmptyIndex
                | RagError::NoRelevantContext
                | RagError::InvalidInput(_)
                | RagError::NotFound(_)
        )
    }

    /// True when retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RagError::EmbeddingService(_) | RagError::CompletionService(_)
        )
    }

    /// Stable machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::Configuration(_) => "configuration",
            RagError::EmbeddingService(_) => "embedding_failed",
            RagError::DimensionMismatch { .. } => "dimension_mismatch",
            RagError::EmptyIndex => "no_material",
            RagError::NoRelevantContext => "no_relevant_context",
            RagError::CompletionService(_) => "completion_failed",
            RagError::Storage(_) => "storage",
            RagError::InvalidInput(_) => "invalid_input",
            RagError::NotFound(_) => "not_found",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(RagError::EmptyIndex.is_user_facing());
        assert!(RagError::NoRelevantContext.is_user_facing());
        assert!(!RagError::EmptyIndex.is_retryable());

        let e = RagError::EmbeddingService("timeout".into());
        assert!(e.is_retryable());
        assert!(!e.is_user_facing());

        let d = RagError::DimensionMismatch {
            expected: 3,
            actual: 4,
        };
        assert!(!d.is_user_facing());
        assert!(!d.is_retryable());
    }

    #[test]
    fn test_display_mentions_dimensions() {
        let d = RagError::DimensionMismatch {
            expected: 1536,
            actual: 768,
        };
        let msg = d.to_string();
        assert!(msg.contains("1536"));
        assert!(msg.contains("768"));
    }
}
