//! Wire-format tests for the HTTP backends against a mock inference server.

use serde_json::json;
use std::time::Duration;
use swallow_common::config::{BackendConfig, BackendKind};
use swallow_gateway::backend::{create_backend, init_backend, GenerationParams};
use swallow_gateway::reply_text;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, kind: BackendKind) -> BackendConfig {
    BackendConfig {
        kind,
        base_url: server.uri(),
        model: "swallow-test".into(),
        timeout_secs: 5,
        connect_timeout_secs: 2,
        ..Default::default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// llama.cpp
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn llamacpp_posts_completion_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .and(body_partial_json(json!({
            "model": "swallow-test",
            "prompt": "User: hi",
            "max_tokens": 64,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cmpl-1",
            "choices": [{"text": " Hello!", "index": 0}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = create_backend(&config_for(&server, BackendKind::LlamaCpp));
    let params = GenerationParams::default().with_overrides(Some(64), None, None);

    let output = backend.complete("User: hi", &params).await.unwrap();
    assert_eq!(reply_text(&output), "Hello!");
}

#[tokio::test]
async fn llamacpp_error_status_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("loading model"))
        .mount(&server)
        .await;

    let backend = create_backend(&config_for(&server, BackendKind::LlamaCpp));
    let err = backend
        .complete("User: hi", &GenerationParams::default())
        .await
        .unwrap_err();

    assert_eq!(err.status_code, Some(503));
    assert!(err.message.contains("loading model"));
}

#[tokio::test]
async fn llamacpp_non_json_reply_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    let backend = create_backend(&config_for(&server, BackendKind::LlamaCpp));
    let output = backend
        .complete("User: hi", &GenerationParams::default())
        .await
        .unwrap();

    assert_eq!(reply_text(&output), swallow_gateway::SENTINEL_REPLY);
}

#[tokio::test]
async fn llamacpp_timeout_is_flagged() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"choices": [{"text": "late"}]}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut config = config_for(&server, BackendKind::LlamaCpp);
    config.timeout_secs = 1;

    let backend = create_backend(&config);
    let err = backend
        .complete("User: hi", &GenerationParams::default())
        .await
        .unwrap_err();

    assert!(err.timed_out);
}

#[tokio::test]
async fn llamacpp_probe_uses_health() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    assert!(init_backend(&config_for(&server, BackendKind::LlamaCpp))
        .await
        .is_some());
}

#[tokio::test]
async fn llamacpp_probe_fails_while_loading() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(init_backend(&config_for(&server, BackendKind::LlamaCpp))
        .await
        .is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// Ollama
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ollama_generate_is_normalized() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "swallow-test",
            "stream": false,
            "options": {"num_predict": 512, "stop": ["User:"]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "swallow-test",
            "response": "  こんにちは  ",
            "done": true,
            "prompt_eval_count": 4,
            "eval_count": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = create_backend(&config_for(&server, BackendKind::Ollama));
    let params = GenerationParams::default().with_overrides(None, None, Some(vec!["User:".into()]));

    let output = backend.complete("User: hi", &params).await.unwrap();
    assert_eq!(reply_text(&output), "こんにちは");
    assert_eq!(output["usage"]["total_tokens"], 6);
}

#[tokio::test]
async fn ollama_probe_uses_tags() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .mount(&server)
        .await;

    let backend = init_backend(&config_for(&server, BackendKind::Ollama)).await;
    assert_eq!(backend.map(|b| b.name().to_string()).as_deref(), Some("ollama"));
}
