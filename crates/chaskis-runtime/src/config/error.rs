//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Why a configuration could not be loaded or was rejected.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A layer could not be parsed or the merged result does not fit the schema.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {message}")]
    ValidationError { message: String },

    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    /// A `{ env = "VAR" }` password points at an unset or non-UTF-8 variable.
    #[error("Password variable {var} is unusable: {reason}")]
    MissingEnvVar { var: String, reason: String },

    /// A bridge-bot regex does not compile or lacks a required group.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn missing_env_var(var: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::MissingEnvVar {
            var: var.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::ParseError(e.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
