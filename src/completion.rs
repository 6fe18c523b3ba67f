//! Chat-completion clients.
//!
//! [`OpenAiCompleter`] sends the prompt as a single user message to
//! `POST {api_base}/chat/completions` and returns the first choice's
//! content. [`DisabledCompleter`] fails every call.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use lecture_rag_core::embedding::Completer;
use lecture_rag_core::{RagError, RagResult};

use crate::config::CompletionConfig;
use crate::openai::{api_key_from_env, OpenAiHttp};

pub struct DisabledCompleter;

#[async_trait]
impl Completer for DisabledCompleter {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str, _max: u32, _temperature: f32) -> RagResult<String> {
        Err(RagError::CompletionService(
            "completion provider is disabled".to_string(),
        ))
    }
}

pub struct OpenAiCompleter {
    http: OpenAiHttp,
    model: String,
}

impl OpenAiCompleter {
    pub fn new(config: &CompletionConfig, api_key: String) -> Result<Self> {
        // Completions are never retried; a repeated call costs tokens.
        let http = OpenAiHttp::new(&config.api_base, api_key, config.timeout_secs, 0)?;
        Ok(Self {
            http,
            model: config.model.clone(),
        })
    }

    pub fn from_config(config: &CompletionConfig) -> Result<Self> {
        Self::new(config, api_key_from_env()?)
    }
}

#[async_trait]
impl Completer for OpenAiCompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        prompt: &str,
        max_output_tokens: u32,
        temperature: f32,
    ) -> RagResult<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": max_output_tokens,
            "temperature": temperature,
        });

        let json = self
            .http
            .post_json("chat/completions", &body)
            .await
            .map_err(|e| RagError::CompletionService(e.to_string()))?;

        json.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.pointer("/message/content"))
            .and_then(|content| content.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                RagError::CompletionService("completion returned no choices".to_string())
            })
    }
}

pub fn create_completer(config: &CompletionConfig) -> Result<Arc<dyn Completer>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledCompleter)),
        "openai" => Ok(Arc::new(OpenAiCompleter::from_config(config)?)),
        other => Err(RagError::Configuration(format!(
            "Unknown completion provider: {}",
            other
        ))
        .into()),
    }
}
