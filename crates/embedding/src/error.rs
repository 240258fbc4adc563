use thiserror::Error;

/// A sequence of embeddings does not line up 1:1 with the texts it claims to
/// describe.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{context}: expected {expected} entries, got {actual}")]
pub struct AlignmentError {
    pub context: &'static str,
    pub expected: usize,
    pub actual: usize,
}

impl AlignmentError {
    pub fn new(context: &'static str, expected: usize, actual: usize) -> Self {
        Self {
            context,
            expected,
            actual,
        }
    }

    /// `Ok` when the two counts agree.
    pub fn check(context: &'static str, expected: usize, actual: usize) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::new(context, expected, actual))
        }
    }
}

/// Errors raised by embedding backends.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("invalid embedding config: {0}")]
    InvalidConfig(String),

    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("embedding service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed embedding response: {0}")]
    InvalidResponse(String),

    #[error("dense dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Alignment(#[from] AlignmentError),

    #[error("embedder unavailable: {0}")]
    Unavailable(String),
}
