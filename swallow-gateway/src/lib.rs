//! Swallow Gateway - single-session conversational front-end for a local
//! text-generation backend.
//!
//! This crate provides:
//! - A rolling conversation history rendered into each prompt
//! - File reference annotations for uploaded files mentioned by the user
//! - llama.cpp and Ollama completion backends
//! - A small HTTP surface for completions, file hooks and health
//!
//! ## Architecture
//!
//! ```text
//! Client → /v1/completions → SessionContext (resolve files, render prompt)
//!                                   ↓
//!                          CompletionBackend → reply extraction → History
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod reply;
pub mod resolver;
pub mod routes;
pub mod session;

pub use backend::{
    create_backend, init_backend, BackendError, CompletionBackend, GenerationParams,
    LlamaCppBackend, OllamaBackend,
};
pub use error::GatewayError;
pub use reply::{extract_reply, reply_text, Extraction, SENTINEL_REPLY};
pub use resolver::FileReferenceResolver;
pub use routes::{build_router, AppState};
pub use session::{Exchange, FileReferenceTable, History, Role, SessionContext, Turn};

use swallow_common::config::Config;

/// Start the gateway server.
///
/// A backend that fails its startup probe is logged and the server still
/// starts; generation requests then fail with "LLM not initialized".
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr = config.bind_addr();

    tracing::info!("Starting Swallow server on {}", addr);

    let backend = init_backend(&config.backend).await;
    let router = build_router(AppState::new(config, backend));

    let listener = bind_listener(config).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Swallow server stopped");
    Ok(())
}

/// Bind the configured address. Host names such as `localhost` are resolved.
pub async fn bind_listener(config: &Config) -> anyhow::Result<tokio::net::TcpListener> {
    let addr = config.bind_addr();
    tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_host_name() {
        let mut config = Config::default();
        config.network.bind = "localhost".into();
        config.network.port = 0;

        let listener = bind_listener(&config).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }

    #[tokio::test]
    async fn unresolvable_host_reports_address() {
        let mut config = Config::default();
        config.network.bind = "no-such-host.invalid".into();
        config.network.port = 0;

        let err = bind_listener(&config).await.unwrap_err();
        assert!(err.to_string().contains("no-such-host.invalid:0"));
    }
}
