//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy:
//! - 1xx: Config and input errors
//! - 2xx: Conversation source errors
//! - 3xx: LLM service errors
//! - 4xx: Statement execution errors
//! - 5xx: Network errors
//! - 6xx: Registry/storage errors
//! - 9xx: Internal errors

use serde::{Deserialize, Serialize};

/// Standardized error codes for JSON report output.
///
/// Each variant maps to a numeric code (e.g., `ConfigInvalid` -> E102).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================
    // Config and input errors (1xx)
    // ========================================
    /// E101: Config file could not be found
    ConfigNotFound,
    /// E102: Config file has invalid syntax or values
    ConfigInvalid,
    /// E103: Required config value is missing
    ConfigMissingRequired,
    /// E104: Timestamp argument did not match any supported form
    TimestampInvalid,

    // ========================================
    // Source errors (2xx)
    // ========================================
    /// E201: Conversations or messages could not be listed
    SourceUnavailable,

    // ========================================
    // LLM errors (3xx)
    // ========================================
    /// E301: LLM endpoint could not be reached or returned an error
    LlmUnavailable,
    /// E302: LLM reply could not be parsed into the expected shape
    LlmMalformedResponse,

    // ========================================
    // Statement errors (4xx)
    // ========================================
    /// E401: Statement reached a non-success terminal state
    StatementFailed,
    /// E402: Statement did not reach a terminal state within the poll ceiling
    StatementTimeout,

    // ========================================
    // Network errors (5xx)
    // ========================================
    /// E501: Request could not be sent
    NetworkUnreachable,
    /// E502: Credentials rejected
    NetworkAuthFailed,
    /// E503: Remote API returned a non-success status
    ApiError,

    // ========================================
    // Registry/storage errors (6xx)
    // ========================================
    /// E601: Registry document could not be written back
    RegistryWriteFailed,
    /// E602: Local or remote payload could not be (de)serialized
    SerializationError,
    /// E603: Local filesystem failure
    IoError,

    // ========================================
    // Internal errors (9xx)
    // ========================================
    /// E901: Unexpected internal failure
    InternalError,
    /// E902: Run interrupted before the task started
    Cancelled,
}

impl ErrorCode {
    /// Get the numeric error code (e.g., `ConfigInvalid` -> 102).
    #[must_use]
    pub const fn numeric(&self) -> u16 {
        match self {
            Self::ConfigNotFound => 101,
            Self::ConfigInvalid => 102,
            Self::ConfigMissingRequired => 103,
            Self::TimestampInvalid => 104,
            Self::SourceUnavailable => 201,
            Self::LlmUnavailable => 301,
            Self::LlmMalformedResponse => 302,
            Self::StatementFailed => 401,
            Self::StatementTimeout => 402,
            Self::NetworkUnreachable => 501,
            Self::NetworkAuthFailed => 502,
            Self::ApiError => 503,
            Self::RegistryWriteFailed => 601,
            Self::SerializationError => 602,
            Self::IoError => 603,
            Self::InternalError => 901,
            Self::Cancelled => 902,
        }
    }

    /// Get the error code as a formatted string (e.g., "E102").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric())
    }

    /// Get the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self.numeric() / 100 {
            1 => "config",
            2 => "source",
            3 => "llm",
            4 => "statement",
            5 => "network",
            6 => "registry",
            9 => "internal",
            _ => "unknown",
        }
    }

    /// Iterate over all error codes.
    pub fn all() -> impl Iterator<Item = Self> {
        [
            Self::ConfigNotFound,
            Self::ConfigInvalid,
            Self::ConfigMissingRequired,
            Self::TimestampInvalid,
            Self::SourceUnavailable,
            Self::LlmUnavailable,
            Self::LlmMalformedResponse,
            Self::StatementFailed,
            Self::StatementTimeout,
            Self::NetworkUnreachable,
            Self::NetworkAuthFailed,
            Self::ApiError,
            Self::RegistryWriteFailed,
            Self::SerializationError,
            Self::IoError,
            Self::InternalError,
            Self::Cancelled,
        ]
        .into_iter()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code_string())
    }
}
