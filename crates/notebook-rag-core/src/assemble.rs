//! Answer and study-artifact assembly.
//!
//! Every request runs the same sequence: build context, build prompt, call
//! the generator, parse the response, persist. Nothing is persisted for an
//! artifact whose response fails to parse.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::artifact::{parse_briefing, parse_flashcards, parse_quiz};
use crate::citation::{cited_citations, format_citations};
use crate::embedding::Embedder;
use crate::error::{NotebookError, Result};
use crate::generation::{GenerateOptions, Generator, PromptMessage};
use crate::models::{
    ArtifactContent, ArtifactKind, Citation, Message, NotebookChunk, Role, StudyArtifact,
};
use crate::prompt;
use crate::retrieve::{retrieve, DEFAULT_TOP_K};
use crate::store::Store;

/// Reply persisted when retrieval finds nothing to ground an answer in.
pub const NO_INFORMATION_MESSAGE: &str =
    "I don't have any relevant information in the sources to answer your question.";

/// Reply persisted in place of a failed generation under
/// [`ChatFallback::Apologize`].
pub const APOLOGY_MESSAGE: &str =
    "Sorry, I couldn't generate an answer right now. Please try again in a moment.";

/// Default number of quiz questions requested.
pub const DEFAULT_QUIZ_QUESTIONS: usize = 10;

/// What chat does when the generator fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatFallback {
    /// Persist and return [`APOLOGY_MESSAGE`].
    #[default]
    Apologize,
    /// Return [`NotebookError::GenerationUnavailable`].
    Surface,
}

#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    pub top_k: usize,
    pub chat_fallback: ChatFallback,
    pub quiz_questions: usize,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            chat_fallback: ChatFallback::default(),
            quiz_questions: DEFAULT_QUIZ_QUESTIONS,
        }
    }
}

/// Result of one chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub user_message: Message,
    pub assistant_message: Message,
    /// Every chunk offered to the model, whether or not it was cited.
    pub context: Vec<Citation>,
    /// `true` when the reply is a fixed message rather than a generation.
    pub fallback: bool,
}

pub struct Assembler {
    store: Arc<dyn Store>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    options: AssemblerOptions,
}

impl Assembler {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        options: AssemblerOptions,
    ) -> Self {
        Self {
            store,
            embedder,
            generator,
            options,
        }
    }

    pub fn options(&self) -> &AssemblerOptions {
        &self.options
    }

    /// Answer `question` from the notebook's sources and record the turn.
    ///
    /// The user message is always persisted. With no retrievable chunks the
    /// reply is [`NO_INFORMATION_MESSAGE`] and the generator is not called.
    pub async fn chat(
        &self,
        notebook_id: &str,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<ChatReply> {
        if question.trim().is_empty() {
            return Err(NotebookError::validation("message is required"));
        }
        self.require_notebook(notebook_id).await?;

        let user_message = self
            .store
            .append_message(notebook_id, Role::User, question, &[])
            .await?;

        let top_k = top_k.unwrap_or(self.options.top_k);
        let retrieved = retrieve(
            self.store.as_ref(),
            self.embedder.as_ref(),
            notebook_id,
            question,
            top_k,
        )
        .await?;
        info!(notebook_id, chunks = retrieved.len(), "chat context retrieved");

        if retrieved.is_empty() {
            let assistant_message = self
                .store
                .append_message(notebook_id, Role::Assistant, NO_INFORMATION_MESSAGE, &[])
                .await?;
            return Ok(ChatReply {
                user_message,
                assistant_message,
                context: Vec::new(),
                fallback: true,
            });
        }

        let context: Vec<Citation> = retrieved.iter().map(Citation::from).collect();
        let messages = prompt::chat_prompt(
            question,
            &prompt::chat_context(&retrieved),
            &format_citations(&context),
        );

        let (content, cited, fallback) =
            match self.generator.generate(&messages, GenerateOptions::CHAT).await {
                Ok(answer) => {
                    let cited = cited_citations(&answer, &context);
                    (answer, cited, false)
                }
                Err(err) => match self.options.chat_fallback {
                    ChatFallback::Surface => return Err(err.into()),
                    ChatFallback::Apologize => {
                        warn!(notebook_id, error = %err, "generation failed, replying with apology");
                        (APOLOGY_MESSAGE.to_string(), Vec::new(), true)
                    }
                },
            };

        let assistant_message = self
            .store
            .append_message(notebook_id, Role::Assistant, &content, &cited)
            .await?;

        Ok(ChatReply {
            user_message,
            assistant_message,
            context,
            fallback,
        })
    }

    pub async fn generate_briefing(
        &self,
        notebook_id: &str,
        title: Option<&str>,
    ) -> Result<StudyArtifact> {
        let chunks = self.aggregate_chunks(notebook_id).await?;
        let messages = prompt::briefing_prompt(&prompt::aggregate_context(&chunks));
        self.generate_artifact(
            notebook_id,
            ArtifactKind::Briefing,
            title,
            &messages,
            GenerateOptions::BRIEFING,
            parse_briefing,
        )
        .await
    }

    pub async fn generate_quiz(
        &self,
        notebook_id: &str,
        title: Option<&str>,
        question_count: Option<usize>,
    ) -> Result<StudyArtifact> {
        let count = question_count.unwrap_or(self.options.quiz_questions);
        if count == 0 {
            return Err(NotebookError::validation(
                "question count must be at least 1",
            ));
        }
        let chunks = self.aggregate_chunks(notebook_id).await?;
        let messages = prompt::quiz_prompt(&prompt::aggregate_context(&chunks), count);
        self.generate_artifact(
            notebook_id,
            ArtifactKind::Quiz,
            title,
            &messages,
            GenerateOptions::QUIZ,
            parse_quiz,
        )
        .await
    }

    pub async fn generate_flashcards(
        &self,
        notebook_id: &str,
        title: Option<&str>,
    ) -> Result<StudyArtifact> {
        let chunks = self.aggregate_chunks(notebook_id).await?;
        let messages = prompt::flashcards_prompt(&prompt::aggregate_context(&chunks));
        self.generate_artifact(
            notebook_id,
            ArtifactKind::Flashcards,
            title,
            &messages,
            GenerateOptions::FLASHCARDS,
            parse_flashcards,
        )
        .await
    }

    async fn generate_artifact(
        &self,
        notebook_id: &str,
        kind: ArtifactKind,
        title: Option<&str>,
        messages: &[PromptMessage],
        options: GenerateOptions,
        parse: fn(&str) -> Result<ArtifactContent>,
    ) -> Result<StudyArtifact> {
        let raw = self.generator.generate(messages, options).await?;
        let content = parse(&raw).inspect_err(|err| {
            warn!(notebook_id, %kind, error = %err, "discarding unparseable generation");
        })?;

        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(kind.default_title());
        let artifact = self
            .store
            .create_study_artifact(notebook_id, title, &content)
            .await?;
        info!(notebook_id, %kind, artifact_id = %artifact.id, "study artifact created");
        Ok(artifact)
    }

    async fn aggregate_chunks(&self, notebook_id: &str) -> Result<Vec<NotebookChunk>> {
        self.require_notebook(notebook_id).await?;
        let chunks = self.store.list_chunks_by_notebook(notebook_id).await?;
        if chunks.is_empty() {
            return Err(NotebookError::validation("no content found in notebook"));
        }
        Ok(chunks)
    }

    async fn require_notebook(&self, notebook_id: &str) -> Result<()> {
        match self.store.get_notebook(notebook_id).await? {
            Some(_) => Ok(()),
            None => Err(NotebookError::not_found("notebook", notebook_id)),
        }
    }
}
