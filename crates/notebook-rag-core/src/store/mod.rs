//! Storage abstraction for Notebook RAG.
//!
//! The [`Store`] trait has one typed method per persistence operation the
//! pipelines need, enabling pluggable backends (SQLite in the app crate,
//! [`memory::InMemoryStore`] here).
//!
//! Implementations must be `Send + Sync` and provide read-your-writes
//! visibility: a write is observable by the next read on the same store.
//! Creating a source or appending a message bumps the owning notebook's
//! `updated_at`.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    ArtifactContent, ArtifactKind, Chunk, Citation, Message, NewChunk, NewSource, Notebook,
    NotebookChunk, NotebookSummary, Role, Source, SourceStatus, StudyArtifact,
};

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create_notebook`](Store::create_notebook) | Insert a notebook |
/// | [`list_notebooks`](Store::list_notebooks) | Notebooks by recency, with child counts |
/// | [`delete_notebook`](Store::delete_notebook) | Delete a notebook and everything under it |
/// | [`create_source`](Store::create_source) | Insert a source |
/// | [`update_source_status`](Store::update_source_status) | Move a source through its lifecycle |
/// | [`delete_source`](Store::delete_source) | Delete a source and its chunks |
/// | [`create_chunk`](Store::create_chunk) | Persist one embedded chunk |
/// | [`list_chunks_by_notebook`](Store::list_chunks_by_notebook) | All chunks of a notebook, joined through sources |
/// | [`append_message`](Store::append_message) | Append to a notebook's conversation |
/// | [`create_study_artifact`](Store::create_study_artifact) | Persist a generated artifact |
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_notebook(&self, title: &str, description: &str) -> Result<Notebook>;

    async fn get_notebook(&self, id: &str) -> Result<Option<Notebook>>;

    /// Notebooks ordered by `updated_at` descending.
    async fn list_notebooks(&self, limit: i64, offset: i64) -> Result<Vec<NotebookSummary>>;

    /// Returns `false` if no such notebook existed.
    async fn delete_notebook(&self, id: &str) -> Result<bool>;

    async fn create_source(&self, source: &NewSource) -> Result<Source>;

    async fn get_source(&self, id: &str) -> Result<Option<Source>>;

    /// Sources of a notebook, newest first.
    async fn list_sources(&self, notebook_id: &str) -> Result<Vec<Source>>;

    /// Sets `status` and bumps the source's `updated_at`.
    async fn update_source_status(&self, id: &str, status: SourceStatus) -> Result<()>;

    /// Returns `false` if no such source existed.
    async fn delete_source(&self, id: &str) -> Result<bool>;

    async fn create_chunk(&self, chunk: &NewChunk) -> Result<Chunk>;

    /// Returns the number of chunks removed.
    async fn delete_chunks_by_source(&self, source_id: &str) -> Result<u64>;

    /// Chunks of a source ordered by `chunk_index`.
    async fn list_chunks_by_source(&self, source_id: &str) -> Result<Vec<Chunk>>;

    /// Chunks of every source in the notebook, ordered by source creation
    /// then `chunk_index`. Never returns chunks from other notebooks.
    async fn list_chunks_by_notebook(&self, notebook_id: &str) -> Result<Vec<NotebookChunk>>;

    async fn append_message(
        &self,
        notebook_id: &str,
        role: Role,
        content: &str,
        citations: &[Citation],
    ) -> Result<Message>;

    /// Messages of a notebook in append order.
    async fn list_messages(&self, notebook_id: &str) -> Result<Vec<Message>>;

    async fn create_study_artifact(
        &self,
        notebook_id: &str,
        title: &str,
        content: &ArtifactContent,
    ) -> Result<StudyArtifact>;

    /// Artifacts of a notebook, newest first, optionally of one kind.
    async fn list_study_artifacts(
        &self,
        notebook_id: &str,
        kind: Option<ArtifactKind>,
    ) -> Result<Vec<StudyArtifact>>;
}
