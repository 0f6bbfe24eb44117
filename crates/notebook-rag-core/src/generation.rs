//! Language-model collaborator interface.
//!
//! A [`Generator`] takes an ordered list of system/user messages and returns
//! a single completion string. It must fail rather than hang, with a
//! [`GenerationError`] that says why.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
}

/// One message of a generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }
}

/// Per-request sampling limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerateOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerateOptions {
    pub const CHAT: Self = Self {
        max_tokens: 1000,
        temperature: 0.1,
    };
    pub const BRIEFING: Self = Self {
        max_tokens: 2000,
        temperature: 0.1,
    };
    pub const QUIZ: Self = Self {
        max_tokens: 3000,
        temperature: 0.1,
    };
    pub const FLASHCARDS: Self = Self {
        max_tokens: 2000,
        temperature: 0.1,
    };
}

/// Why a generation call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("invalid credentials: {0}")]
    Unauthorized(String),
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),
    #[error("malformed request: {0}")]
    BadRequest(String),
    #[error("timed out after {0}s")]
    Timeout(u64),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("model returned no content")]
    EmptyResponse,
    #[error("generation provider is disabled")]
    Disabled,
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier used for requests.
    fn model_name(&self) -> &str;

    async fn generate(
        &self,
        messages: &[PromptMessage],
        options: GenerateOptions,
    ) -> Result<String, GenerationError>;
}
