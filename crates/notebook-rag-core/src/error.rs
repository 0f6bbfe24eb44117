//! Domain error taxonomy for the ingestion, retrieval, and assembly pipelines.
//!
//! Storage backends return `anyhow::Result`; those failures surface here as
//! [`NotebookError::Storage`]. Every other variant is a condition the caller
//! is expected to distinguish (HTTP status mapping, CLI messages, retries).

use thiserror::Error;

use crate::generation::GenerationError;

#[derive(Debug, Error)]
pub enum NotebookError {
    /// Missing required field, malformed URL, or an operation that is not
    /// allowed in the current state.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("source {source_id} has no content to process")]
    EmptyContent { source_id: String },

    #[error("chunking produced no chunks for source {source_id}")]
    NoChunksProduced { source_id: String },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("generation unavailable: {0}")]
    GenerationUnavailable(#[from] GenerationError),

    #[error("generator returned an invalid format: {0}")]
    InvalidGenerationFormat(String),

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl NotebookError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        NotebookError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        NotebookError::Validation(message.into())
    }
}

pub type Result<T, E = NotebookError> = std::result::Result<T, E>;
