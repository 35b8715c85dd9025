//! Ollama backend.
//!
//! Connects to a local Ollama instance through `/api/generate` and normalises
//! its reply into the `choices` shape the rest of the server reads.

use super::{http_client, parse_body, BackendError, CompletionBackend, GenerationParams};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use swallow_common::config::BackendConfig;

const NAME: &str = "ollama";

/// Ollama backend for local models.
pub struct OllamaBackend {
    base_url: String,
    model: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions<'a>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions<'a> {
    temperature: f64,
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

impl OllamaBackend {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client: http_client(config),
        }
    }
}

/// Map `{ "response": ... }` onto `{ "choices": [{ "text": ... }] }`.
///
/// Replies without a string `response` are passed through untouched.
fn normalize_reply(reply: Value) -> Value {
    let text = match reply.get("response").and_then(Value::as_str) {
        Some(text) => text.to_string(),
        None => return reply,
    };

    let mut normalized = json!({ "choices": [{ "text": text }] });

    if let Some(reason) = reply.get("done_reason") {
        normalized["choices"][0]["finish_reason"] = reason.clone();
    }

    let prompt_tokens = reply.get("prompt_eval_count").and_then(Value::as_i64);
    let completion_tokens = reply.get("eval_count").and_then(Value::as_i64);
    if prompt_tokens.is_some() || completion_tokens.is_some() {
        let prompt_tokens = prompt_tokens.unwrap_or(0);
        let completion_tokens = completion_tokens.unwrap_or(0);
        normalized["usage"] = json!({
            "prompt_tokens": prompt_tokens,
            "completion_tokens": completion_tokens,
            "total_tokens": prompt_tokens + completion_tokens,
        });
    }

    normalized
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    fn name(&self) -> &str {
        NAME
    }

    async fn probe(&self) -> Result<(), BackendError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            let mut err = BackendError::from_reqwest(NAME, e);
            err.message.push_str(". Is Ollama running? (ollama serve)");
            err
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::new(
                NAME,
                format!("Model listing returned {}", status.as_u16()),
            )
            .with_status(status.as_u16()));
        }

        Ok(())
    }

    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<Value, BackendError> {
        let request = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: params.temperature,
                num_predict: params.max_tokens,
                stop: (!params.stop.is_empty()).then_some(params.stop.as_slice()),
            },
        };

        let url = format!("{}/api/generate", self.base_url);

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

        Ok(normalize_reply(parse_body(NAME, body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_url_from_config() {
        let config = BackendConfig {
            base_url: "http://localhost:11434/".into(),
            ..Default::default()
        };
        let backend = OllamaBackend::new(&config);
        assert_eq!(backend.base_url, "http://localhost:11434");
        assert_eq!(backend.name(), "ollama");
    }

    #[test]
    fn request_serializes_non_streaming() {
        let request = OllamaGenerateRequest {
            model: "swallow",
            prompt: "User: hello",
            stream: false,
            options: OllamaOptions {
                temperature: 0.7,
                num_predict: 512,
                stop: None,
            },
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"stream\":false"));
        assert!(json.contains("\"num_predict\":512"));
        assert!(!json.contains("stop"));
    }

    #[test]
    fn reply_normalized_with_usage() {
        let reply = json!({
            "model": "swallow",
            "response": "こんにちは",
            "done": true,
            "done_reason": "stop",
            "prompt_eval_count": 10,
            "eval_count": 5
        });
        let normalized = normalize_reply(reply);
        assert_eq!(normalized["choices"][0]["text"], "こんにちは");
        assert_eq!(normalized["choices"][0]["finish_reason"], "stop");
        assert_eq!(normalized["usage"]["total_tokens"], 15);
    }

    #[test]
    fn reply_without_response_passes_through() {
        let reply = json!({"error": "model not found"});
        assert_eq!(normalize_reply(reply.clone()), reply);
    }
}
