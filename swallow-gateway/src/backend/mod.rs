//! Text-generation backend abstraction.
//!
//! A backend takes one assembled prompt and returns the raw structured reply.
//! Reading the reply is left to [`crate::reply`] so that shape violations are
//! handled in one place.

mod llamacpp;
mod ollama;

pub use llamacpp::LlamaCppBackend;
pub use ollama::OllamaBackend;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use swallow_common::config::{BackendConfig, BackendKind};

// ============================================================================
// Backend Trait
// ============================================================================

/// Unified interface for completion backends.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Get the backend name.
    fn name(&self) -> &str;

    /// Check that the backend is reachable and ready to serve.
    async fn probe(&self) -> Result<(), BackendError>;

    /// Run one completion and return the raw reply.
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<Value, BackendError>;
}

/// Error from a backend call.
#[derive(Debug, Clone)]
pub struct BackendError {
    pub backend: String,
    pub message: String,
    pub status_code: Option<u16>,
    pub timed_out: bool,
}

impl BackendError {
    pub fn new(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            message: message.into(),
            status_code: None,
            timed_out: false,
        }
    }

    /// Wrap a transport error, keeping track of timeouts.
    pub fn from_reqwest(backend: &str, error: reqwest::Error) -> Self {
        let timed_out = error.is_timeout();
        let message = if timed_out {
            format!("Request timed out: {}", error)
        } else {
            format!("Request failed: {}", error)
        };
        Self {
            backend: backend.into(),
            message,
            status_code: error.status().map(|s| s.as_u16()),
            timed_out,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.backend, self.message)
    }
}

impl std::error::Error for BackendError {}

// ============================================================================
// Generation Parameters
// ============================================================================

/// Sampling parameters sent with each completion.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f64,
    /// Empty means the backend's own default.
    pub stop: Vec<String>,
}

impl GenerationParams {
    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            stop: config.stop.clone(),
        }
    }

    /// Per-request values win over these defaults.
    pub fn with_overrides(
        &self,
        max_tokens: Option<u32>,
        temperature: Option<f64>,
        stop: Option<Vec<String>>,
    ) -> Self {
        Self {
            max_tokens: max_tokens.unwrap_or(self.max_tokens),
            temperature: temperature.unwrap_or(self.temperature),
            stop: stop.unwrap_or_else(|| self.stop.clone()),
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.7,
            stop: Vec::new(),
        }
    }
}

// ============================================================================
// Construction
// ============================================================================

/// Build the configured backend without contacting it.
pub fn create_backend(config: &BackendConfig) -> Arc<dyn CompletionBackend> {
    match config.kind {
        BackendKind::LlamaCpp => Arc::new(LlamaCppBackend::new(config)),
        BackendKind::Ollama => Arc::new(OllamaBackend::new(config)),
    }
}

/// Build and probe the configured backend.
///
/// Returns `None` when the probe fails; the server then answers every
/// generation request with the "not initialized" error.
pub async fn init_backend(config: &BackendConfig) -> Option<Arc<dyn CompletionBackend>> {
    let backend = create_backend(config);

    match backend.probe().await {
        Ok(()) => {
            tracing::info!(
                backend = backend.name(),
                base_url = %config.base_url,
                model = %config.model,
                "LLM backend loaded successfully"
            );
            Some(backend)
        }
        Err(e) => {
            tracing::error!(
                backend = backend.name(),
                base_url = %config.base_url,
                error = %e,
                "Failed to load LLM backend"
            );
            None
        }
    }
}

/// Shared HTTP client construction for backends.
pub(crate) fn http_client(config: &BackendConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_secs))
        .connect_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Parse a 2xx body as JSON. Non-JSON bodies are returned as a JSON string
/// so the reply extractor treats them as malformed.
pub(crate) fn parse_body(backend: &str, body: String) -> Value {
    match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(backend, error = %e, "Backend reply is not JSON");
            Value::String(body)
        }
    }
}
