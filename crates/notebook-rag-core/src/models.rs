//! Core data models used throughout Notebook RAG.
//!
//! These types represent the notebooks, sources, chunks, conversation
//! messages, and study artifacts that flow through ingestion, retrieval,
//! and generation.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A notebook groups sources, the conversation about them, and the study
/// artifacts generated from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub id: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A notebook plus derived child counts, as returned by notebook listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotebookSummary {
    #[serde(flatten)]
    pub notebook: Notebook,
    pub source_count: i64,
    pub message_count: i64,
}

/// How a source's content was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Text,
    Url,
    Pdf,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Text => "text",
            SourceType::Url => "url",
            SourceType::Pdf => "pdf",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "text" => Ok(SourceType::Text),
            "url" => Ok(SourceType::Url),
            "pdf" => Ok(SourceType::Pdf),
            other => bail!("Unknown source type: '{}'. Use text, url, or pdf.", other),
        }
    }
}

/// Ingestion lifecycle of a source.
///
/// `Pending → Processing → Completed | Failed`. `Unsupported` is terminal
/// and only ever assigned at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Unsupported,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Pending => "pending",
            SourceStatus::Processing => "processing",
            SourceStatus::Completed => "completed",
            SourceStatus::Failed => "failed",
            SourceStatus::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "pending" => Ok(SourceStatus::Pending),
            "processing" => Ok(SourceStatus::Processing),
            "completed" => Ok(SourceStatus::Completed),
            "failed" => Ok(SourceStatus::Failed),
            "unsupported" => Ok(SourceStatus::Unsupported),
            other => bail!("Unknown source status: '{}'", other),
        }
    }
}

/// A piece of uploaded material belonging to exactly one notebook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub notebook_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    /// Raw extracted text.
    pub content: String,
    pub url: Option<String>,
    pub status: SourceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a [`Source`]. Ids and timestamps are assigned
/// by the store.
#[derive(Debug, Clone)]
pub struct NewSource {
    pub notebook_id: String,
    pub title: String,
    pub source_type: SourceType,
    pub content: String,
    pub url: Option<String>,
    pub status: SourceStatus,
}

/// A bounded slice of a source's text with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub source_id: String,
    pub content: String,
    /// 0-based position within the source, in original text order.
    pub chunk_index: i64,
    pub token_count: i64,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// Fields required to persist a [`Chunk`].
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub source_id: String,
    pub content: String,
    pub chunk_index: i64,
    pub token_count: i64,
    pub embedding: Vec<f32>,
}

/// A chunk joined with the metadata of its owning source.
#[derive(Debug, Clone, PartialEq)]
pub struct NotebookChunk {
    pub chunk: Chunk,
    pub source_title: String,
    pub source_type: SourceType,
    pub source_created_at: DateTime<Utc>,
}

/// Speaker of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => bail!("Unknown message role: '{}'", other),
        }
    }
}

/// Binding from a citation token to the chunk it references.
///
/// Keeps the full source id; the short prefix used in tokens is derived
/// by [`crate::citation::short_source_id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub source_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub source_title: String,
}

/// One entry of a notebook's append-only conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub notebook_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
    pub created_at: DateTime<Utc>,
}

/// Kind of a generated study artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Briefing,
    Quiz,
    Flashcards,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Briefing => "briefing",
            ArtifactKind::Quiz => "quiz",
            ArtifactKind::Flashcards => "flashcards",
        }
    }

    /// Title used when the caller does not supply one.
    pub fn default_title(&self) -> &'static str {
        match self {
            ArtifactKind::Briefing => "Briefing",
            ArtifactKind::Quiz => "Quiz",
            ArtifactKind::Flashcards => "Flashcards",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "briefing" => Ok(ArtifactKind::Briefing),
            "quiz" => Ok(ArtifactKind::Quiz),
            "flashcards" => Ok(ArtifactKind::Flashcards),
            other => bail!(
                "Unknown artifact kind: '{}'. Use briefing, quiz, or flashcards.",
                other
            ),
        }
    }
}

/// Question style within a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    ShortAnswer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub question: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

/// Typed body of a study artifact, one variant per artifact kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArtifactContent {
    Briefing { text: String },
    Quiz { questions: Vec<QuizQuestion> },
    Flashcards { cards: Vec<Flashcard> },
}

impl ArtifactContent {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            ArtifactContent::Briefing { .. } => ArtifactKind::Briefing,
            ArtifactContent::Quiz { .. } => ArtifactKind::Quiz,
            ArtifactContent::Flashcards { .. } => ArtifactKind::Flashcards,
        }
    }
}

/// A generated briefing, quiz, or flashcard set. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyArtifact {
    pub id: String,
    pub notebook_id: String,
    pub title: String,
    pub content: ArtifactContent,
    pub created_at: DateTime<Utc>,
}

impl StudyArtifact {
    pub fn kind(&self) -> ArtifactKind {
        self.content.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip_strings() {
        for status in [
            SourceStatus::Pending,
            SourceStatus::Processing,
            SourceStatus::Completed,
            SourceStatus::Failed,
            SourceStatus::Unsupported,
        ] {
            assert_eq!(status.as_str().parse::<SourceStatus>().unwrap(), status);
        }
        assert!("done".parse::<SourceStatus>().is_err());
    }

    #[test]
    fn test_artifact_content_tagged_json() {
        let content = ArtifactContent::Flashcards {
            cards: vec![Flashcard {
                front: "Q".to_string(),
                back: "A".to_string(),
            }],
        };
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["type"], "flashcards");
        assert_eq!(json["cards"][0]["front"], "Q");
        assert_eq!(content.kind(), ArtifactKind::Flashcards);
    }

    #[test]
    fn test_source_serializes_type_field() {
        let now = Utc::now();
        let source = Source {
            id: "s1".to_string(),
            notebook_id: "n1".to_string(),
            title: "Doc".to_string(),
            source_type: SourceType::Url,
            content: String::new(),
            url: Some("https://example.com".to_string()),
            status: SourceStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["type"], "url");
        assert_eq!(json["status"], "pending");
    }
}
