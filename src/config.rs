//! TOML configuration.
//!
//! Only `[db]` is required; every other section falls back to defaults.
//!
//! ```toml
//! [db]
//! path = "./data/nb.sqlite"
//!
//! [embedding]
//! provider = "hash"        # hash | openai | ollama
//!
//! [generation]
//! provider = "chat_completions"
//! model = "accounts/fireworks/models/llama-v3p1-8b-instruct"
//! api_key_env = "FIREWORKS_API_KEY"
//!
//! [chat]
//! on_generation_failure = "apologize"   # apologize | surface
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use notebook_rag_core::assemble::{ChatFallback, DEFAULT_QUIZ_QUESTIONS};
use notebook_rag_core::chunk::DEFAULT_MAX_TOKENS;
use notebook_rag_core::embedding::DEFAULT_DIMS;
use notebook_rag_core::extract::MIN_CONTENT_CHARS;
use notebook_rag_core::retrieve::DEFAULT_TOP_K;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_quiz_questions")]
    pub quiz_questions: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            quiz_questions: default_quiz_questions(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}
fn default_quiz_questions() -> usize {
    DEFAULT_QUIZ_QUESTIONS
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Endpoint override. Ollama uses it as the base URL.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    /// Vector size in effect for the configured provider.
    pub fn effective_dims(&self) -> usize {
        self.dims.unwrap_or(DEFAULT_DIMS)
    }
}

fn default_embedding_provider() -> String {
    "hash".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// `chat_completions` or `disabled`.
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_url")]
    pub url: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Overrides the per-request temperature when set.
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            url: default_generation_url(),
            model: default_generation_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            temperature: None,
        }
    }
}

fn default_generation_provider() -> String {
    "chat_completions".to_string()
}
fn default_generation_url() -> String {
    "https://api.fireworks.ai/inference/v1/chat/completions".to_string()
}
fn default_generation_model() -> String {
    "accounts/fireworks/models/llama-v3p1-8b-instruct".to_string()
}
fn default_api_key_env() -> String {
    "FIREWORKS_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    /// Environment variable holding a ScraperAPI key. Plain HTTP fetches are
    /// used when the variable is unset.
    #[serde(default = "default_scraper_api_key_env")]
    pub scraper_api_key_env: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            min_content_chars: default_min_content_chars(),
            max_content_chars: default_max_content_chars(),
            scraper_api_key_env: default_scraper_api_key_env(),
        }
    }
}

fn default_min_content_chars() -> usize {
    MIN_CONTENT_CHARS
}
fn default_max_content_chars() -> usize {
    50_000
}
fn default_scraper_api_key_env() -> String {
    "SCRAPER_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ChatConfig {
    #[serde(default)]
    pub on_generation_failure: ChatFallback,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.quiz_questions == 0 {
        anyhow::bail!("retrieval.quiz_questions must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "hash" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be hash, openai, or ollama.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }

    match config.generation.provider.as_str() {
        "chat_completions" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be chat_completions or disabled.",
            other
        ),
    }
    if let Some(t) = config.generation.temperature {
        if !(0.0..=2.0).contains(&t) {
            anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
        }
    }

    if config.extraction.max_content_chars < config.extraction.min_content_chars {
        anyhow::bail!("extraction.max_content_chars must be >= extraction.min_content_chars");
    }

    Ok(())
}
