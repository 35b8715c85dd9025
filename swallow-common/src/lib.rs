//! Swallow Common - Shared types, utilities, and configuration for the Swallow server.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Logging setup
//! - Small string and size helpers used in log output

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{
    AssistantLabel, BackendConfig, BackendKind, Config, NetworkConfig, ObservabilityConfig,
    SessionConfig,
};
pub use validation::{Validate, ValidationError, ValidationResult};

