//! # Notebook RAG Core
//!
//! Shared logic for Notebook RAG: data models, chunking, the store
//! abstraction, retrieval, the citation engine, prompt construction, and
//! the ingestion and answer/artifact pipelines.
//!
//! This crate contains no tokio, sqlx, HTTP clients, or filesystem I/O.
//! External collaborators (storage, embedding model, language model,
//! extraction) are reached only through the traits defined here, so the
//! whole pipeline can run against [`store::memory::InMemoryStore`] and
//! [`embedding::HashEmbedder`] in tests.

pub mod artifact;
pub mod assemble;
pub mod chunk;
pub mod citation;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod ingest;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod source;
pub mod store;

pub use error::NotebookError;
