//! Runtime wiring shared by the CLI and the HTTP server.
//!
//! [`App::open`] connects the database, applies migrations, and builds the
//! embedder, generator, and extractor selected by the config. Commands and
//! handlers go through the methods here so both surfaces behave identically.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use notebook_rag_core::assemble::{Assembler, AssemblerOptions, ChatReply};
use notebook_rag_core::embedding::Embedder;
use notebook_rag_core::extract::Extractor;
use notebook_rag_core::generation::Generator;
use notebook_rag_core::ingest::{ingest_source, IngestReport};
use notebook_rag_core::models::{Source, StudyArtifact};
use notebook_rag_core::retrieve::{retrieve, RetrievedChunk};
use notebook_rag_core::source::{add_source, SourceRequest};
use notebook_rag_core::store::Store;
use notebook_rag_core::NotebookError;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::extract::WebExtractor;
use crate::generation::create_generator;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

pub struct App {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub embedder: Arc<dyn Embedder>,
    pub extractor: Arc<dyn Extractor>,
    pub assembler: Assembler,
}

impl App {
    /// Connect to the configured database and build every collaborator.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;

        let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        let extractor: Arc<dyn Extractor> = Arc::new(WebExtractor::new(&config.extraction)?);

        info!(
            db = %config.db.path.display(),
            embedder = embedder.model_name(),
            generator = generator.model_name(),
            "app initialized"
        );

        Ok(Self::from_parts(
            config.clone(),
            store,
            embedder,
            generator,
            extractor,
        ))
    }

    /// Assemble an app from explicit collaborators.
    pub fn from_parts(
        config: Config,
        store: Arc<dyn Store>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        let options = AssemblerOptions {
            top_k: config.retrieval.top_k,
            chat_fallback: config.chat.on_generation_failure,
            quiz_questions: config.retrieval.quiz_questions,
        };
        let assembler = Assembler::new(store.clone(), embedder.clone(), generator, options);

        Self {
            config: Arc::new(config),
            store,
            embedder,
            extractor,
            assembler,
        }
    }

    pub async fn add_source(
        &self,
        notebook_id: &str,
        request: SourceRequest,
    ) -> Result<Source, NotebookError> {
        add_source(
            self.store.as_ref(),
            self.extractor.as_ref(),
            notebook_id,
            request,
        )
        .await
    }

    pub async fn ingest(&self, source_id: &str) -> Result<IngestReport, NotebookError> {
        ingest_source(
            self.store.as_ref(),
            self.embedder.as_ref(),
            source_id,
            self.config.chunking.max_tokens,
        )
        .await
    }

    pub async fn retrieve(
        &self,
        notebook_id: &str,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<RetrievedChunk>, NotebookError> {
        if self.store.get_notebook(notebook_id).await?.is_none() {
            return Err(NotebookError::not_found("notebook", notebook_id));
        }
        retrieve(
            self.store.as_ref(),
            self.embedder.as_ref(),
            notebook_id,
            query,
            top_k.unwrap_or(self.config.retrieval.top_k),
        )
        .await
    }

    pub async fn chat(
        &self,
        notebook_id: &str,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<ChatReply, NotebookError> {
        self.assembler.chat(notebook_id, question, top_k).await
    }

    pub async fn briefing(
        &self,
        notebook_id: &str,
        title: Option<&str>,
    ) -> Result<StudyArtifact, NotebookError> {
        self.assembler.generate_briefing(notebook_id, title).await
    }

    pub async fn quiz(
        &self,
        notebook_id: &str,
        title: Option<&str>,
        question_count: Option<usize>,
    ) -> Result<StudyArtifact, NotebookError> {
        self.assembler
            .generate_quiz(notebook_id, title, question_count)
            .await
    }

    pub async fn flashcards(
        &self,
        notebook_id: &str,
        title: Option<&str>,
    ) -> Result<StudyArtifact, NotebookError> {
        self.assembler.generate_flashcards(notebook_id, title).await
    }
}
