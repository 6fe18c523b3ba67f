//! Embedding provider implementations.
//!
//! - **[`DisabledEmbedder`]** fails every call; used when
//!   `embedding.provider = "disabled"`.
//! - **[`OpenAiEmbedder`]** calls `POST {api_base}/embeddings` with batching
//!   and optional retry.
//!
//! Use [`create_embedder`] to pick one from configuration.
//!
//! Before sending, every input has its newlines replaced by spaces and is
//! cut to `max_input_chars` characters. Response vectors are put back in
//! input order using the `index` field.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use lecture_rag_core::embedding::{truncate_chars, Embedder};
use lecture_rag_core::{RagError, RagResult};

use crate::config::EmbeddingConfig;
use crate::openai::{api_key_from_env, OpenAiHttp};

pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed(&self, _texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        Err(RagError::EmbeddingService(
            "embedding provider is disabled".to_string(),
        ))
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedder {
    http: OpenAiHttp,
    model: String,
    dims: usize,
    batch_size: usize,
    max_input_chars: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        let http = OpenAiHttp::new(
            &config.api_base,
            api_key,
            config.timeout_secs,
            config.max_retries,
        )?;
        Ok(Self {
            http,
            model: config.model.clone(),
            dims: config.dims,
            batch_size: config.batch_size.max(1),
            max_input_chars: config.max_input_chars,
        })
    }

    /// Build from config, reading `OPENAI_API_KEY` from the environment.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Self::new(config, api_key_from_env()?)
    }

    fn prepare(&self, text: &str) -> String {
        truncate_chars(text, self.max_input_chars).replace('\n', " ")
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        let inputs: Vec<String> = texts.iter().map(|t| self.prepare(t)).collect();
        let body = serde_json::json!({
            "model": self.model,
            "input": inputs,
        });

        let json = self
            .http
            .post_json("embeddings", &body)
            .await
            .map_err(|e| RagError::EmbeddingService(e.to_string()))?;
        parse_embedding_response(json, texts.len(), self.dims)
    }
}

/// Decode an embeddings response and restore input order. Every vector
/// must have exactly `dims` components.
fn parse_embedding_response(
    json: serde_json::Value,
    expected: usize,
    dims: usize,
) -> RagResult<Vec<Vec<f32>>> {
    let response: EmbeddingResponse = serde_json::from_value(json).map_err(|e| {
        RagError::EmbeddingService(format!("invalid embeddings response: {}", e))
    })?;

    if response.data.len() != expected {
        return Err(RagError::EmbeddingService(format!(
            "expected {} embeddings, got {}",
            expected,
            response.data.len()
        )));
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in response.data {
        if item.embedding.is_empty() {
            return Err(RagError::EmbeddingService(format!(
                "empty embedding at index {}",
                item.index
            )));
        }
        if item.embedding.len() != dims {
            return Err(RagError::EmbeddingService(format!(
                "embedding at index {} has {} dimensions, configured {}",
                item.index,
                item.embedding.len(),
                dims
            )));
        }
        match slots.get_mut(item.index) {
            Some(slot) if slot.is_none() => *slot = Some(item.embedding),
            _ => {
                return Err(RagError::EmbeddingService(format!(
                    "unexpected embedding index {}",
                    item.index
                )))
            }
        }
    }

    // Every slot is filled: counts match and no index repeated.
    Ok(slots.into_iter().flatten().collect())
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        tracing::debug!(count = texts.len(), model = %self.model, "embedded texts");
        Ok(vectors)
    }
}

/// Create the configured [`Embedder`].
///
/// | Config Value | Embedder |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"openai"` | [`OpenAiEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => Ok(Arc::new(OpenAiEmbedder::from_config(config)?)),
        other => Err(RagError::Configuration(format!(
            "Unknown embedding provider: {}",
            other
        ))
        .into()),
    }
}
