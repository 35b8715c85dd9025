//! llama.cpp server backend.
//!
//! Uses the OpenAI-style `/v1/completions` endpoint, whose reply is already
//! `{ "choices": [{ "text": ... }] }` shaped.

use super::{http_client, parse_body, BackendError, CompletionBackend, GenerationParams};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use swallow_common::config::BackendConfig;

const NAME: &str = "llamacpp";

/// Backend for a running `llama-server`.
pub struct LlamaCppBackend {
    base_url: String,
    model: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

impl LlamaCppBackend {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client: http_client(config),
        }
    }
}

#[async_trait]
impl CompletionBackend for LlamaCppBackend {
    fn name(&self) -> &str {
        NAME
    }

    async fn probe(&self) -> Result<(), BackendError> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(NAME, e))?;

        let status = response.status();
        if !status.is_success() {
            // 503 while the model is still loading
            return Err(BackendError::new(
                NAME,
                format!("Health check returned {}", status.as_u16()),
            )
            .with_status(status.as_u16()));
        }

        Ok(())
    }

    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<Value, BackendError> {
        let request = CompletionRequest {
            model: &self.model,
            prompt,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stop: (!params.stop.is_empty()).then_some(params.stop.as_slice()),
        };

        let url = format!("{}/v1/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(NAME, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::from_reqwest(NAME, e))?;

        if !status.is_success() {
            return Err(BackendError::new(
                NAME,
                format!("API error ({}): {}", status.as_u16(), body),
            )
            .with_status(status.as_u16()));
        }

        Ok(parse_body(NAME, body))
    }
}
