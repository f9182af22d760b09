//! Error handling for asset-miner.
//!
//! This module provides:
//! - [`MinerError`]: The main error enum for all pipeline operations
//! - [`ErrorCode`]: Standardized error codes for machine parsing

mod codes;

use std::io;

use serde_json::Value;
use thiserror::Error;

pub use codes::ErrorCode;

/// Supported timestamp forms, listed in [`MinerError::InvalidTimestamp`].
pub const SUPPORTED_TIMESTAMP_FORMS: &str = "Supported formats:\n  \
    - Relative: 7d, 24h, 30m, 1w\n  \
    - ISO 8601: 2026-01-15T10:30:00, 2026-01-15T10:30:00Z, 2026-01-15T10:30:00+02:00\n  \
    - Date: 2026-01-15";

/// Main error type for asset-miner operations.
#[derive(Error, Debug)]
pub enum MinerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Missing required config: {0}")]
    MissingConfig(String),

    #[error("Unable to parse timestamp: {input}\n{forms}", forms = SUPPORTED_TIMESTAMP_FORMS)]
    InvalidTimestamp { input: String },

    #[error("Conversation source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),

    #[error("Statement execution failed: {0}")]
    StatementFailed(String),

    #[error("Statement execution timed out after {attempts} polls")]
    StatementTimeout { attempts: u32 },

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl MinerError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::SerializationError,
            Self::Http(_) => ErrorCode::NetworkUnreachable,
            Self::Api { status, .. } => match *status {
                401 | 403 => ErrorCode::NetworkAuthFailed,
                _ => ErrorCode::ApiError,
            },
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::MissingConfig(_) => ErrorCode::ConfigMissingRequired,
            Self::InvalidTimestamp { .. } => ErrorCode::TimestampInvalid,
            Self::SourceUnavailable(_) => ErrorCode::SourceUnavailable,
            Self::LlmUnavailable(_) => ErrorCode::LlmUnavailable,
            Self::MalformedResponse(_) => ErrorCode::LlmMalformedResponse,
            Self::StatementFailed(_) => ErrorCode::StatementFailed,
            Self::StatementTimeout { .. } => ErrorCode::StatementTimeout,
            Self::Registry(_) => ErrorCode::RegistryWriteFailed,
            Self::WorkerPool(_) => ErrorCode::InternalError,
            Self::Cancelled => ErrorCode::Cancelled,
        }
    }

    /// Whether retrying the same operation could plausibly succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::StatementTimeout { .. } | Self::LlmUnavailable(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Get context information for this error as JSON.
    #[must_use]
    pub fn context(&self) -> Option<Value> {
        match self {
            Self::Api { status, message } => {
                Some(serde_json::json!({ "status": status, "message": message }))
            }
            Self::InvalidTimestamp { input } => Some(serde_json::json!({ "input": input })),
            Self::MissingConfig(key) => Some(serde_json::json!({ "config_key": key })),
            Self::StatementTimeout { attempts } => {
                Some(serde_json::json!({ "poll_attempts": attempts }))
            }
            _ => None,
        }
    }
}

/// Result type alias using MinerError.
pub type Result<T> = std::result::Result<T, MinerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miner_error_code_mapping() {
        assert_eq!(
            MinerError::Config("bad".into()).code(),
            ErrorCode::ConfigInvalid
        );
        assert_eq!(
            MinerError::InvalidTimestamp {
                input: "nope".into()
            }
            .code(),
            ErrorCode::TimestampInvalid
        );
        assert_eq!(
            MinerError::Api {
                status: 403,
                message: "denied".into()
            }
            .code(),
            ErrorCode::NetworkAuthFailed
        );
        assert_eq!(
            MinerError::Api {
                status: 500,
                message: "boom".into()
            }
            .code(),
            ErrorCode::ApiError
        );
    }

    #[test]
    fn test_invalid_timestamp_lists_supported_forms() {
        let err = MinerError::InvalidTimestamp {
            input: "not-a-date".into(),
        };
        let message = err.to_string();
        assert!(message.contains("not-a-date"));
        assert!(message.contains("Relative: 7d, 24h, 30m, 1w"));
        assert!(message.contains("ISO 8601"));
        assert!(message.contains("Date: 2026-01-15"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(MinerError::StatementTimeout { attempts: 30 }.is_retryable());
        assert!(
            MinerError::Api {
                status: 503,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !MinerError::Api {
                status: 400,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!MinerError::StatementFailed("syntax".into()).is_retryable());
    }

    #[test]
    fn test_context_carries_api_status() {
        let err = MinerError::Api {
            status: 404,
            message: "space not found".into(),
        };
        let ctx = err.context().unwrap();
        assert_eq!(ctx.get("status").unwrap(), 404);
        assert!(MinerError::Cancelled.context().is_none());
    }
}
