//! URL/PDF extraction collaborator interface.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::NotebookError;

/// Default length (in characters) below which an extractor should report
/// [`ExtractionStatus::Unsupported`].
pub const MIN_CONTENT_CHARS: usize = 50;

/// Input handed to an [`Extractor`].
#[derive(Debug, Clone, Copy)]
pub enum ExtractInput<'a> {
    Url(&'a str),
    Pdf(&'a [u8]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Ok,
    /// The extractor reached the content but judged it unusable (JS-only
    /// page, blocked domain, error page).
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extracted {
    pub title: Option<String>,
    pub content: String,
    pub status: ExtractionStatus,
}

impl Extracted {
    /// Whether the result cannot be ingested. Length thresholds are the
    /// extractor's call; only blank content is rejected here.
    pub fn is_unsupported(&self) -> bool {
        self.status == ExtractionStatus::Unsupported || self.content.trim().is_empty()
    }
}

/// Turns a URL or a PDF payload into text.
///
/// Hard failures (network, unreadable PDF) are
/// [`NotebookError::ExtractionFailed`]; low-value results are reported
/// through [`ExtractionStatus::Unsupported`].
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, input: ExtractInput<'_>) -> Result<Extracted, NotebookError>;
}
