use embedding::{AlignmentError, EmbeddingError};
use index::IndexError;
use thiserror::Error;

/// Failures surfaced by ingestion and search.
///
/// The variants separate "the request was wrong" ([`RetrievalError::Alignment`],
/// [`RetrievalError::InvalidRequest`]) from "a collaborator failed"
/// (everything else).
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Alignment(#[from] AlignmentError),
    #[error("embedding failed: {0}")]
    Embedding(EmbeddingError),
    #[error("storage failed: {0}")]
    Storage(IndexError),
    #[error("search failed: {0}")]
    Search(IndexError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<EmbeddingError> for RetrievalError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::Alignment(inner) => RetrievalError::Alignment(inner),
            other => RetrievalError::Embedding(other),
        }
    }
}

impl RetrievalError {
    /// True when the caller, not a collaborator, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RetrievalError::Alignment(_) | RetrievalError::InvalidRequest(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_inside_embedding_error_is_unwrapped() {
        let err: RetrievalError = EmbeddingError::Alignment(AlignmentError::new("embed", 2, 1)).into();
        assert!(matches!(err, RetrievalError::Alignment(_)));
        assert!(err.is_client_error());

        let err: RetrievalError = EmbeddingError::Unavailable("down".into()).into();
        assert!(matches!(err, RetrievalError::Embedding(_)));
        assert!(!err.is_client_error());
    }
}
