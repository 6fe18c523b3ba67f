//! TOML configuration.
//!
//! Every section except `[db]` may be omitted; missing keys fall back to the
//! defaults below, which match the production deployment (cl100k tokens,
//! 500/50 windows, `text-embedding-3-small`, `gpt-3.5-turbo`, top 5 chunks
//! within a 3000-token context).
//!
//! ```toml
//! [db]
//! path = "./data/lrag.sqlite"
//!
//! [chunking]
//! chunk_size_tokens = 500
//! overlap_tokens = 50
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [server]
//! bind = "127.0.0.1:7400"
//! ```
//!
//! The OpenAI key is never read from this file; it comes from the
//! `OPENAI_API_KEY` environment variable.

use anyhow::{Context, Result};
use lecture_rag_core::chunk::ChunkingParams;
use lecture_rag_core::dedup::{DedupParams, DEFAULT_MAX_CHUNKS};
use lecture_rag_core::RagError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    5
}
fn default_busy_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size_tokens: usize,
    #[serde(default = "default_overlap")]
    pub overlap_tokens: usize,
    /// `"cl100k"` or `"char"`.
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size_tokens: default_chunk_size(),
            overlap_tokens: default_overlap(),
            tokenizer: default_tokenizer(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_overlap() -> usize {
    50
}
fn default_tokenizer() -> String {
    "cl100k".to_string()
}

impl ChunkingConfig {
    pub fn params(&self) -> Result<ChunkingParams, RagError> {
        ChunkingParams::new(self.chunk_size_tokens, self.overlap_tokens)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DedupConfig {
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            min_chars: default_min_chars(),
            similarity_threshold: default_similarity_threshold(),
            max_chunks: default_max_chunks(),
        }
    }
}

fn default_min_chars() -> usize {
    20
}
fn default_similarity_threshold() -> f32 {
    0.95
}
fn default_max_chunks() -> usize {
    DEFAULT_MAX_CHUNKS
}

impl DedupConfig {
    pub fn params(&self) -> Result<DedupParams, RagError> {
        Ok(DedupParams::new(self.min_chars, self.similarity_threshold)?
            .with_max_chunks(self.max_chunks))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"` or `"disabled"`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Extra attempts after the first one. Zero disables retrying.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: default_timeout_secs(),
            max_input_chars: default_max_input_chars(),
            api_base: default_api_base(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_input_chars() -> usize {
    10_000
}
fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    /// `"openai"` or `"disabled"`.
    #[serde(default = "default_completion_provider")]
    pub provider: String,
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_completion_provider(),
            model: default_completion_model(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_completion_timeout_secs(),
            api_base: default_api_base(),
        }
    }
}

fn default_completion_provider() -> String {
    "openai".to_string()
}
fn default_completion_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_max_output_tokens() -> u32 {
    800
}
fn default_temperature() -> f32 {
    0.7
}
fn default_completion_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_context_tokens: default_max_context_tokens(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_max_context_tokens() -> usize {
    3000
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
    "127.0.0.1:7400".to_string()
}

fn invalid(message: impl Into<String>) -> anyhow::Error {
    RagError::Configuration(message.into()).into()
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Read, parse, and validate the configuration file at `path`.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

fn validate(config: &Config) -> Result<()> {
    // Chunking and dedup carry their own invariants.
    config.chunking.params()?;
    config.dedup.params()?;

    if config.db.max_connections == 0 {
        return Err(invalid("db.max_connections must be > 0"));
    }

    match config.chunking.tokenizer.as_str() {
        "cl100k" | "char" => {}
        other => {
            return Err(invalid(format!(
                "chunking.tokenizer must be cl100k or char, got '{}'",
                other
            )))
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => {
            return Err(invalid(format!(
                "Unknown embedding provider: '{}'. Must be disabled or openai.",
                other
            )))
        }
    }
    if config.embedding.is_enabled() {
        if config.embedding.dims == 0 {
            return Err(invalid("embedding.dims must be > 0"));
        }
        if config.embedding.model.trim().is_empty() {
            return Err(invalid("embedding.model must not be empty"));
        }
    }
    if config.embedding.batch_size == 0 {
        return Err(invalid("embedding.batch_size must be > 0"));
    }
    if config.embedding.max_input_chars == 0 {
        return Err(invalid("embedding.max_input_chars must be > 0"));
    }

    match config.completion.provider.as_str() {
        "disabled" | "openai" => {}
        other => {
            return Err(invalid(format!(
                "Unknown completion provider: '{}'. Must be disabled or openai.",
                other
            )))
        }
    }
    if !(0.0..=2.0).contains(&config.completion.temperature) {
        return Err(invalid("completion.temperature must be in [0.0, 2.0]"));
    }
    if config.completion.max_output_tokens == 0 {
        return Err(invalid("completion.max_output_tokens must be > 0"));
    }

    if config.retrieval.top_k == 0 {
        return Err(invalid("retrieval.top_k must be >= 1"));
    }
    if config.retrieval.max_context_tokens == 0 {
        return Err(invalid("retrieval.max_context_tokens must be > 0"));
    }

    Ok(())
}
