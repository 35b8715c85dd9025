//! Configuration validation for the Swallow server.
//!
//! Provides validation logic for configuration fields to ensure
//! all required values are present and within valid ranges.

use thiserror::Error;

use crate::config::{BackendConfig, Config, NetworkConfig, ObservabilityConfig, SessionConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port}: must be between 1 and 65535")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let sections: [&dyn Validate; 4] = [
            &self.network,
            &self.backend,
            &self.session,
            &self.observability,
        ];

        let mut errors: Vec<ValidationError> = sections
            .iter()
            .filter_map(|section| section.validate().err())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Load (with environment overrides) and validate configuration.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load_with_env()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

impl Validate for NetworkConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort {
                port: self.port,
                field: "network.port".into(),
            });
        }

        if self.bind.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "network.bind".into(),
            });
        }

        Ok(())
    }
}

impl Validate for BackendConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.base_url.is_empty() {
            return Err(ValidationError::MissingField {
                field: "backend.base_url".into(),
            });
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ValidationError::InvalidValue {
                field: "backend.base_url".into(),
                reason: "must start with http:// or https://".into(),
            });
        }

        if self.model.is_empty() {
            return Err(ValidationError::MissingField {
                field: "backend.model".into(),
            });
        }

        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "backend.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.max_tokens == 0 {
            return Err(ValidationError::InvalidValue {
                field: "backend.max_tokens".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::InvalidValue {
                field: "backend.temperature".into(),
                reason: "must be between 0.0 and 2.0".into(),
            });
        }

        Ok(())
    }
}

impl Validate for SessionConfig {
    fn validate(&self) -> ValidationResult<()> {
        // One full exchange must fit
        if self.max_history_turns < 2 {
            return Err(ValidationError::InvalidValue {
                field: "session.max_history_turns".into(),
                reason: "must be at least 2".into(),
            });
        }

        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}
