//! Error types for Regula.
//!
//! This module defines a unified error enum covering ingestion, ranking,
//! external providers, the vector store, prompts and configuration.

use thiserror::Error;

/// Unified error type for Regula.
///
/// All fallible functions return `Result<T, AppError>`. Provider failures are
/// propagated unchanged in kind; nothing in the library retries.
#[derive(Error, Debug)]
pub enum AppError {
    /// A required input (data directory, index, cache) does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Chunking or ranking parameters outside their valid range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Embedding or generation service failure
    #[error("Provider error ({}): {message}", describe_status(.status))]
    Provider {
        /// HTTP status when the service answered, `None` on transport failure
        status: Option<u16>,
        message: String,
    },

    /// Vectors and metadata (or ids) are not aligned by position
    #[error("Alignment error: {0}")]
    Alignment(String),

    /// Vector store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Provider failure that carries an HTTP status.
    pub fn provider_status(status: u16, message: impl Into<String>) -> Self {
        AppError::Provider {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Provider failure before any HTTP status was received.
    pub fn provider_transport(message: impl Into<String>) -> Self {
        AppError::Provider {
            status: None,
            message: message.into(),
        }
    }
}

fn describe_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "transport".to_string(),
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_with_status() {
        let err = AppError::provider_status(503, "model not loaded");
        assert_eq!(
            err.to_string(),
            "Provider error (status 503): model not loaded"
        );
    }

    #[test]
    fn test_provider_error_without_status() {
        let err = AppError::provider_transport("connection refused");
        assert_eq!(err.to_string(), "Provider error (transport): connection refused");
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: AppError = parse.unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
