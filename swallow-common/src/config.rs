//! Configuration management for the Swallow server.
//!
//! The server reads a single JSON file at `~/.swallow/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (SWALLOW_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `SWALLOW_BIND_ADDRESS` → network.bind
//! - `SWALLOW_PORT` → network.port
//! - `SWALLOW_BACKEND` → backend.kind (`llamacpp` | `ollama`)
//! - `SWALLOW_BACKEND_URL` → backend.base_url
//! - `SWALLOW_MODEL` → backend.model
//! - `SWALLOW_TIMEOUT_SECS` → backend.timeout_secs
//! - `SWALLOW_MAX_HISTORY_TURNS` → session.max_history_turns
//! - `SWALLOW_LOG_LEVEL` → observability.log_level
//! - `SWALLOW_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".swallow"),
        |dirs| dirs.home_dir().join(".swallow"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Network Configuration
// ============================================================================

/// Listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bind address. Defaults to all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    5006
}

// ============================================================================
// Backend Configuration
// ============================================================================

/// Which inference server the gateway talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// llama.cpp server (`/v1/completions`)
    #[default]
    #[serde(alias = "llama_cpp", alias = "llama.cpp")]
    LlamaCpp,
    /// Ollama (`/api/generate`)
    Ollama,
}

impl BackendKind {
    /// Parse from string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "llamacpp" | "llama_cpp" | "llama.cpp" => Some(Self::LlamaCpp),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }
}

/// Inference backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend implementation
    #[serde(default)]
    pub kind: BackendKind,

    /// Base URL of the inference server
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    /// Model name sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Default `max_tokens` for conversational completions
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Default sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Default stop sequences (empty means backend default)
    #[serde(default)]
    pub stop: Vec<String>,

    /// `max_tokens` used by the stateless `/generate` endpoint
    #[serde(default = "default_generate_max_tokens")]
    pub generate_max_tokens: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            base_url: default_backend_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            stop: Vec::new(),
            generate_max_tokens: default_generate_max_tokens(),
        }
    }
}

fn default_backend_url() -> String {
    "http://127.0.0.1:8080".into()
}

fn default_model() -> String {
    "swallow-70b-instruct".into()
}

fn default_timeout_secs() -> u64 {
    // Local 70B models are slow
    300
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_tokens() -> u32 {
    512
}

fn default_temperature() -> f64 {
    0.7
}

fn default_generate_max_tokens() -> u32 {
    256
}

// ============================================================================
// Session Configuration
// ============================================================================

/// Label used for assistant turns when history is rendered into a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssistantLabel {
    /// `Assistant: ...`
    #[default]
    Assistant,
    /// `AI: ...`
    Ai,
}

impl AssistantLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assistant => "Assistant",
            Self::Ai => "AI",
        }
    }
}

/// Conversation session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum number of turns kept in history (user + assistant)
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,

    /// Label for assistant turns in the rendered prompt
    #[serde(default)]
    pub assistant_label: AssistantLabel,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history_turns: default_max_history_turns(),
            assistant_label: AssistantLabel::default(),
        }
    }
}

fn default_max_history_turns() -> usize {
    // 10 exchanges
    20
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Listener configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Inference backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Conversation session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("SWALLOW_BIND_ADDRESS") {
            self.network.bind = bind;
        }
        if let Some(port) = lookup("SWALLOW_PORT").and_then(|p| p.parse().ok()) {
            self.network.port = port;
        }

        if let Some(kind) = lookup("SWALLOW_BACKEND") {
            match BackendKind::parse(&kind) {
                Some(k) => self.backend.kind = k,
                None => tracing::warn!(value = %kind, "Ignoring unknown SWALLOW_BACKEND"),
            }
        }
        if let Some(url) = lookup("SWALLOW_BACKEND_URL") {
            self.backend.base_url = url;
        }
        if let Some(model) = lookup("SWALLOW_MODEL") {
            self.backend.model = model;
        }
        if let Some(secs) = lookup("SWALLOW_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.backend.timeout_secs = secs;
        }

        if let Some(turns) = lookup("SWALLOW_MAX_HISTORY_TURNS").and_then(|s| s.parse().ok()) {
            self.session.max_history_turns = turns;
        }

        if let Some(level) = lookup("SWALLOW_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("SWALLOW_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Socket address string the server listens on.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.network.bind, self.network.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_match_source_server() {
        let config = Config::default();
        assert_eq!(config.network.port, 5006);
        assert_eq!(config.backend.max_tokens, 512);
        assert!((config.backend.temperature - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.backend.generate_max_tokens, 256);
        assert_eq!(config.session.max_history_turns, 20);
        assert_eq!(config.session.assistant_label, AssistantLabel::Assistant);
        assert_eq!(config.bind_addr(), "0.0.0.0:5006");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"backend": {{"kind": "ollama", "model": "swallow"}}, "session": {{"assistant_label": "ai"}}}}"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.backend.kind, BackendKind::Ollama);
        assert_eq!(config.backend.model, "swallow");
        assert_eq!(config.backend.timeout_secs, 300);
        assert_eq!(config.session.assistant_label, AssistantLabel::Ai);
        assert_eq!(config.network.port, 5006);
    }

    #[test]
    fn observability_aliases() {
        let json = r#"{"observability": {"level": "debug", "format": "json"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, "json");
    }

    #[test]
    fn unparseable_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("SWALLOW_PORT", "7000"),
            ("SWALLOW_BACKEND", "Ollama"),
            ("SWALLOW_BACKEND_URL", "http://gpu-box:11434"),
            ("SWALLOW_MAX_HISTORY_TURNS", "8"),
            ("SWALLOW_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.network.port, 7000);
        assert_eq!(config.backend.kind, BackendKind::Ollama);
        assert_eq!(config.backend.base_url, "http://gpu-box:11434");
        assert_eq!(config.session.max_history_turns, 8);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn bad_numeric_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|k| (k == "SWALLOW_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.network.port, 5006);
    }

    #[test]
    fn backend_kind_parse() {
        assert_eq!(BackendKind::parse("llama.cpp"), Some(BackendKind::LlamaCpp));
        assert_eq!(BackendKind::parse("OLLAMA"), Some(BackendKind::Ollama));
        assert_eq!(BackendKind::parse("vllm"), None);
    }
}
