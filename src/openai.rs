//! Shared HTTP plumbing for the OpenAI-compatible endpoints.
//!
//! Both the embedding and the completion clients post JSON to
//! `{api_base}/{endpoint}` with a bearer token and optionally retry
//! transient failures.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! With `max_retries = 0` (the default) the first failure is final.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Read the API key from the environment.
pub fn api_key_from_env() -> Result<String> {
    std::env::var(API_KEY_ENV).map_err(|_| anyhow!("{} environment variable not set", API_KEY_ENV))
}

pub struct OpenAiHttp {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    max_retries: u32,
}

impl OpenAiHttp {
    pub fn new(api_base: &str, api_key: String, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            max_retries,
        })
    }

    /// POST `body` to `{api_base}/{endpoint}` and return the decoded JSON.
    pub async fn post_json(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.api_base, endpoint);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::warn!(
                    endpoint,
                    attempt,
                    delay_secs = delay.as_secs(),
                    "retrying OpenAI request"
                );
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("OpenAI request failed after retries")))
    }
}
