//! Error types for ProtoLens
//!
//! Provides a single error enum shared by every crate with:
//! - Distinct variants for each gateway failure mode
//! - Machine-readable error codes
//! - A coarse taxonomy (`ErrorClass`) that drives retry and fallback policy

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    ConfigurationError,

    // Empty results (4xxx)
    NoApprovedSections,

    // Storage errors (7xxx)
    VectorIndexError,
    DatabaseError,

    // External service errors (8xxx)
    EmbeddingUnavailable,
    EmbeddingTimeout,
    EmbeddingEmpty,
    GenerationUnavailable,
    GenerationTimeout,
    GenerationEmpty,
    LowQualityOutput,

    // Internal errors (9xxx)
    InternalError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::ConfigurationError => 1002,

            ErrorCode::NoApprovedSections => 4001,

            ErrorCode::VectorIndexError => 7001,
            ErrorCode::DatabaseError => 7002,

            ErrorCode::EmbeddingUnavailable => 8001,
            ErrorCode::EmbeddingTimeout => 8002,
            ErrorCode::EmbeddingEmpty => 8003,
            ErrorCode::GenerationUnavailable => 8011,
            ErrorCode::GenerationTimeout => 8012,
            ErrorCode::GenerationEmpty => 8013,
            ErrorCode::LowQualityOutput => 8020,

            ErrorCode::InternalError => 9001,
            ErrorCode::SerializationError => 9002,
        }
    }
}

/// Failure taxonomy used to pick a recovery strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Connection refused or provider error. Surfaced immediately.
    GatewayUnavailable,
    /// Provider did not answer in time. Retried once for read-only calls.
    GatewayTimeout,
    /// Generated text unusable. Regenerated once, then a fallback is used.
    LowQualityOutput,
    /// Nothing to work with. A valid terminal state for the caller.
    EmptyResult,
    /// Bad input or configuration.
    InvalidInput,
    /// Everything else.
    Internal,
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // Empty results
    #[error("No approved sections to summarize")]
    NoApprovedSections,

    // Storage errors
    #[error("Vector index error: {message}")]
    VectorIndex { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    // Embedding gateway
    #[error("Embedding service unavailable: {message}")]
    EmbeddingUnavailable { message: String },

    #[error("Embedding timeout after {timeout_ms}ms")]
    EmbeddingTimeout { timeout_ms: u64 },

    #[error("Embedding service returned an empty vector")]
    EmbeddingEmpty,

    // Generation gateway
    #[error("Generation service unavailable: {message}")]
    GenerationUnavailable { message: String },

    #[error("Generation timeout after {timeout_ms}ms")]
    GenerationTimeout { timeout_ms: u64 },

    #[error("Generation service returned no text")]
    GenerationEmpty,

    #[error("Generated output rejected: {reason}")]
    LowQualityOutput { reason: String },

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::NoApprovedSections => ErrorCode::NoApprovedSections,
            AppError::VectorIndex { .. } => ErrorCode::VectorIndexError,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::EmbeddingUnavailable { .. } => ErrorCode::EmbeddingUnavailable,
            AppError::EmbeddingTimeout { .. } => ErrorCode::EmbeddingTimeout,
            AppError::EmbeddingEmpty => ErrorCode::EmbeddingEmpty,
            AppError::GenerationUnavailable { .. } => ErrorCode::GenerationUnavailable,
            AppError::GenerationTimeout { .. } => ErrorCode::GenerationTimeout,
            AppError::GenerationEmpty => ErrorCode::GenerationEmpty,
            AppError::LowQualityOutput { .. } => ErrorCode::LowQualityOutput,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Classify the error for retry and fallback decisions
    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::EmbeddingUnavailable { .. }
            | AppError::EmbeddingEmpty
            | AppError::GenerationUnavailable { .. }
            | AppError::VectorIndex { .. }
            | AppError::Database(_) => ErrorClass::GatewayUnavailable,

            AppError::EmbeddingTimeout { .. } | AppError::GenerationTimeout { .. } => {
                ErrorClass::GatewayTimeout
            }

            AppError::GenerationEmpty | AppError::LowQualityOutput { .. } => {
                ErrorClass::LowQualityOutput
            }

            AppError::NoApprovedSections => ErrorClass::EmptyResult,

            AppError::Validation { .. } | AppError::Configuration { .. } => {
                ErrorClass::InvalidInput
            }

            AppError::Internal { .. } | AppError::Serialization(_) | AppError::Other(_) => {
                ErrorClass::Internal
            }
        }
    }

    /// Whether the failed call may be repeated with the same payload
    pub fn is_timeout(&self) -> bool {
        self.class() == ErrorClass::GatewayTimeout
    }

    /// Whether the error came from one of the external gateways
    pub fn is_gateway_error(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::GatewayUnavailable | ErrorClass::GatewayTimeout
        )
    }

    /// Map a transport failure from the embedding provider
    pub fn embedding_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            AppError::EmbeddingTimeout {
                timeout_ms: timeout.as_millis() as u64,
            }
        } else {
            AppError::EmbeddingUnavailable {
                message: err.to_string(),
            }
        }
    }

    /// Map a transport failure from the generation provider
    pub fn generation_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            AppError::GenerationTimeout {
                timeout_ms: timeout.as_millis() as u64,
            }
        } else {
            AppError::GenerationUnavailable {
                message: err.to_string(),
            }
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<sea_orm::TryGetError> for AppError {
    fn from(err: sea_orm::TryGetError) -> Self {
        AppError::Database(err.into())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
