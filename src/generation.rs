//! Chat-completions generator (Fireworks, OpenAI, or any compatible endpoint).
//!
//! Requests are a single attempt bounded by `generation.timeout_secs`; the
//! assembler decides what to do with a failure, so nothing retries here.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use notebook_rag_core::generation::{
    GenerateOptions, GenerationError, Generator, PromptMessage,
};

use crate::config::GenerationConfig;

/// Build the generator selected by `[generation] provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "chat_completions" => Ok(Arc::new(ChatCompletionsGenerator::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        other => bail!(
            "Unknown generation provider: '{}'. Must be chat_completions or disabled.",
            other
        ),
    }
}

/// Always fails with [`GenerationError::Disabled`].
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(
        &self,
        _messages: &[PromptMessage],
        _options: GenerateOptions,
    ) -> Result<String, GenerationError> {
        Err(GenerationError::Disabled)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Generator speaking the OpenAI-compatible `/chat/completions` protocol.
///
/// The API key is read from the environment variable named by
/// `generation.api_key_env` at construction. A missing key does not fail
/// construction; every call then returns [`GenerationError::Unauthorized`].
pub struct ChatCompletionsGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
    timeout_secs: u64,
    temperature: Option<f32>,
}

impl ChatCompletionsGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            warn!(
                env = %config.api_key_env,
                "generation API key not set; chat and study artifacts will fail"
            );
        }
        Self::with_key(config, api_key)
    }

    /// Construct with an explicit key instead of reading the environment.
    pub fn with_key(config: &GenerationConfig, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            model: config.model.clone(),
            api_key,
            api_key_env: config.api_key_env.clone(),
            timeout_secs: config.timeout_secs,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Generator for ChatCompletionsGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        messages: &[PromptMessage],
        options: GenerateOptions,
    ) -> Result<String, GenerationError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            GenerationError::Unauthorized(format!("{} is not set", self.api_key_env))
        })?;

        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: options.max_tokens,
            temperature: self.temperature.unwrap_or(options.temperature),
        };

        debug!(model = %self.model, messages = messages.len(), "chat completion request");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(e))?;
        extract_content(parsed)
    }
}

impl ChatCompletionsGenerator {
    fn transport_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(self.timeout_secs)
        } else {
            GenerationError::Upstream(e.to_string())
        }
    }
}

fn classify_status(status: u16, body: String) -> GenerationError {
    let lower = body.to_lowercase();
    match status {
        401 | 403 => GenerationError::Unauthorized(format!("HTTP {}: {}", status, body)),
        429 => GenerationError::QuotaExhausted(format!("HTTP {}: {}", status, body)),
        400..=499 if lower.contains("quota") || lower.contains("insufficient") => {
            GenerationError::QuotaExhausted(format!("HTTP {}: {}", status, body))
        }
        400..=499 => GenerationError::BadRequest(format!("HTTP {}: {}", status, body)),
        _ => GenerationError::Upstream(format!("HTTP {}: {}", status, body)),
    }
}

fn extract_content(response: ChatResponse) -> Result<String, GenerationError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(GenerationError::EmptyResponse)
}
