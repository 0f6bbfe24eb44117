//! Parsing and validation of generated study artifacts.

use serde::Deserialize;

use crate::error::{NotebookError, Result};
use crate::models::{ArtifactContent, Flashcard, QuestionKind, QuizQuestion};

/// Remove one surrounding Markdown code fence, if present.
///
/// ```rust
/// use notebook_rag_core::artifact::strip_code_fence;
///
/// assert_eq!(strip_code_fence("```json\n[1]\n```"), "[1]");
/// assert_eq!(strip_code_fence("  [1] "), "[1]");
/// ```
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    match body.find('\n') {
        Some(nl) => body[nl + 1..].trim(),
        None => body.trim(),
    }
}

pub fn parse_briefing(raw: &str) -> Result<ArtifactContent> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(NotebookError::InvalidGenerationFormat(
            "briefing is empty".to_string(),
        ));
    }
    Ok(ArtifactContent::Briefing {
        text: text.to_string(),
    })
}

#[derive(Deserialize)]
struct QuizPayload {
    questions: Vec<QuizQuestion>,
}

pub fn parse_quiz(raw: &str) -> Result<ArtifactContent> {
    let payload: QuizPayload = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| NotebookError::InvalidGenerationFormat(format!("quiz JSON: {}", e)))?;

    if payload.questions.is_empty() {
        return Err(NotebookError::InvalidGenerationFormat(
            "quiz has no questions".to_string(),
        ));
    }
    for (i, q) in payload.questions.iter().enumerate() {
        if q.question.trim().is_empty() || q.answer.trim().is_empty() {
            return Err(NotebookError::InvalidGenerationFormat(format!(
                "question {} is missing its text or answer",
                i + 1
            )));
        }
        if q.kind == QuestionKind::MultipleChoice && q.options.len() < 2 {
            return Err(NotebookError::InvalidGenerationFormat(format!(
                "multiple choice question {} has fewer than two options",
                i + 1
            )));
        }
    }

    Ok(ArtifactContent::Quiz {
        questions: payload.questions,
    })
}

pub fn parse_flashcards(raw: &str) -> Result<ArtifactContent> {
    let cards: Vec<Flashcard> = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| NotebookError::InvalidGenerationFormat(format!("flashcards JSON: {}", e)))?;

    if cards.is_empty() {
        return Err(NotebookError::InvalidGenerationFormat(
            "no flashcards returned".to_string(),
        ));
    }
    if cards
        .iter()
        .any(|c| c.front.trim().is_empty() || c.back.trim().is_empty())
    {
        return Err(NotebookError::InvalidGenerationFormat(
            "flashcard with an empty side".to_string(),
        ));
    }

    Ok(ArtifactContent::Flashcards { cards })
}
