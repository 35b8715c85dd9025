//! Route definitions for the Swallow gateway.
//!
//! Provides the conversational completion endpoint, the stateless generate
//! endpoint, file hooks, a history snapshot and the health check.

use crate::backend::{CompletionBackend, GenerationParams};
use crate::error::GatewayError;
use crate::reply::{first_candidate_text, reply_text, SENTINEL_REPLY};
use crate::session::{SessionContext, Turn};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use swallow_common::config::Config;
use swallow_common::logging::generate_request_id;
use swallow_common::util::{format_bytes, tail_chars, truncate_with_ellipsis};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

/// Characters of the incoming prompt written to the log.
const PROMPT_LOG_HEAD: usize = 100;

/// Characters of the assembled prompt written to the log.
const FULL_PROMPT_LOG_TAIL: usize = 200;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionContext>,
    /// `None` when the backend failed to initialize.
    pub backend: Option<Arc<dyn CompletionBackend>>,
    pub defaults: GenerationParams,
    pub generate_max_tokens: u32,
}

impl AppState {
    pub fn new(config: &Config, backend: Option<Arc<dyn CompletionBackend>>) -> Self {
        Self {
            session: Arc::new(SessionContext::new(&config.session)),
            backend,
            defaults: GenerationParams::from_config(&config.backend),
            generate_max_tokens: config.backend.generate_max_tokens,
        }
    }

    fn backend(&self) -> Result<&Arc<dyn CompletionBackend>, GatewayError> {
        self.backend.as_ref().ok_or(GatewayError::BackendUnavailable)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request / Response Types
// ─────────────────────────────────────────────────────────────────────────────

/// Conversational completion request.
#[derive(Debug, Deserialize)]
pub struct CompletionRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub choices: Vec<Choice>,
}

/// Stateless generate request.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    #[default]
    Utf8,
    Base64,
}

/// File upload request.
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    pub file_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub encoding: ContentEncoding,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileSummary {
    pub file_id: String,
    pub size: usize,
}

/// File download response. `content` is base64.
#[derive(Debug, Serialize, Deserialize)]
pub struct FileResponse {
    pub file_id: String,
    pub content: String,
    pub size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileListResponse {
    pub files: Vec<FileSummary>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub turns: Vec<Turn>,
    pub capacity: usize,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
    pub backend_ready: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/completions", post(completions_handler))
        .route("/generate", post(generate_handler))
        .route("/v1/files", post(upload_handler).get(list_files_handler))
        .route("/v1/files/:id", get(download_handler))
        .route("/v1/history", get(history_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

// ─────────────────────────────────────────────────────────────────────────────
// Completion Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// One conversational exchange.
async fn completions_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CompletionResponse>, GatewayError> {
    let backend = state.backend()?.clone();

    let request: CompletionRequest = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::Internal(format!("Invalid request body: {}", e)))?;

    let span = tracing::info_span!("completion", request_id = %generate_request_id());

    async move {
        tracing::info!(
            prompt = %truncate_with_ellipsis(&request.prompt, PROMPT_LOG_HEAD),
            "Received prompt"
        );

        let params = state.defaults.with_overrides(
            request.max_tokens,
            request.temperature,
            request.stop,
        );

        let exchange = state.session.begin_exchange(&request.prompt).await;

        tracing::info!(
            annotations = exchange.annotation_count(),
            tail = %tail_chars(exchange.prompt(), FULL_PROMPT_LOG_TAIL),
            "Full prompt"
        );

        let output = backend.complete(exchange.prompt(), &params).await?;
        let text = reply_text(&output);

        let turns = exchange.commit(text.clone());
        tracing::info!(
            reply = %truncate_with_ellipsis(&text, PROMPT_LOG_HEAD),
            turns,
            "Generated response"
        );

        Ok::<_, GatewayError>(Json(CompletionResponse {
            choices: vec![Choice { text }],
        }))
    }
    .instrument(span)
    .await
}

/// Single-shot generation without history.
async fn generate_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<GenerateResponse>, GatewayError> {
    let backend = state.backend()?.clone();

    let request: GenerateRequest = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::Internal(format!("Invalid request body: {}", e)))?;

    let params = state
        .defaults
        .with_overrides(Some(state.generate_max_tokens), None, None);

    let output = backend.complete(&request.prompt, &params).await?;

    let response = match first_candidate_text(&output) {
        Some(text) => text.to_string(),
        None => {
            tracing::error!(output = %output, "Unexpected LLM output format");
            SENTINEL_REPLY.to_string()
        }
    };

    Ok(Json(GenerateResponse { response }))
}

// ─────────────────────────────────────────────────────────────────────────────
// File Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn upload_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<FileSummary>), GatewayError> {
    let request: UploadRequest = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::InvalidInput(format!("Invalid upload body: {}", e)))?;

    let content = match request.encoding {
        ContentEncoding::Utf8 => request.content.into_bytes(),
        ContentEncoding::Base64 => STANDARD.decode(request.content.as_bytes()).map_err(|e| {
            GatewayError::InvalidInput(format!("content is not valid base64: {}", e))
        })?,
    };

    let size = content.len();
    let file_id = state.session.upload(request.file_id, content);

    tracing::info!(file_id = %file_id, size = %format_bytes(size as u64), "File uploaded");

    Ok((StatusCode::CREATED, Json(FileSummary { file_id, size })))
}

async fn download_handler(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<FileResponse>, GatewayError> {
    let content = state
        .session
        .download(&file_id)
        .ok_or_else(|| GatewayError::NotFound(format!("File '{}' not found", file_id)))?;

    Ok(Json(FileResponse {
        size: content.len(),
        content: STANDARD.encode(&content),
        file_id,
    }))
}

async fn list_files_handler(State(state): State<AppState>) -> Json<FileListResponse> {
    let files = state
        .session
        .list_files()
        .into_iter()
        .map(|(file_id, size)| FileSummary { file_id, size })
        .collect();

    Json(FileListResponse { files })
}

// ─────────────────────────────────────────────────────────────────────────────
// Introspection Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn history_handler(State(state): State<AppState>) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        turns: state.session.history_snapshot(),
        capacity: state.session.max_turns(),
    })
}

/// Health check handler.
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let backend_ready = state.backend.is_some();
    let status = if backend_ready { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.into(),
        version: env!("CARGO_PKG_VERSION").into(),
        service: "swallow-gateway".into(),
        backend_ready,
    })
}
