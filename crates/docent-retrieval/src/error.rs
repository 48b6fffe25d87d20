//! Error types for the retrieval subsystem.

use docent_core::error::DocentError;

/// Errors from the retrieval engine.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("retrieval unavailable: {0}")]
    Unavailable(String),
    #[error("embedding failed: {0}")]
    Embedding(String),
}

impl From<RetrievalError> for DocentError {
    fn from(err: RetrievalError) -> Self {
        DocentError::Retrieval(err.to_string())
    }
}
