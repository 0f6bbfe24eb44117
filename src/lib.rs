//! # Notebook RAG
//!
//! Notebooks of text, URL, and PDF sources; grounded chat with inline
//! citations; generated briefings, quizzes, and flashcards.
//!
//! The pipeline itself (chunking, embedding contract, retrieval, citation
//! engine, prompt and artifact assembly) lives in `notebook-rag-core`. This
//! crate supplies the runtime pieces: SQLite storage, HTTP embedders and
//! generator, URL/PDF extraction, the `nb` CLI, and the HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │  Extractor  │──▶│   Ingestion   │──▶│  SQLite  │
//! │ URL / PDF   │   │ Chunk + Embed │   │  Store   │
//! └─────────────┘   └──────────────┘   └────┬─────┘
//!                                           │
//!                   ┌──────────────┐        │
//!                   │  Assembler   │◀───────┤ retrieve
//!                   │ chat / study │        │
//!                   └──────┬───────┘        │
//!                ┌─────────┴─────────┐      │
//!                ▼                   ▼      │
//!           ┌──────────┐       ┌──────────┐ │
//!           │   CLI    │       │   HTTP   │◀┘
//!           │  (nb)    │       │  (axum)  │
//!           └──────────┘       └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`app`] | Runtime wiring shared by CLI and server |
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite `Store` implementation |
//! | [`embedding`] | Embedder construction, OpenAI and Ollama clients |
//! | [`generation`] | Chat-completions generator |
//! | [`extract`] | Web page and PDF text extraction |
//! | [`server`] | HTTP API |

pub mod app;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod migrate;
pub mod server;
pub mod sqlite_store;
