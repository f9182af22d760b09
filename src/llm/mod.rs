//! Language-model services consumed by the pipeline.
//!
//! Three narrow seams: structured complexity classification, structured
//! parameter extraction, and free-text generation. Structured calls return a
//! [`Structured`] value so every caller handles the malformed and
//! unavailable cases explicitly.

pub mod client;
pub mod prompts;

pub use client::LlmClient;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{ComplexityAnalysis, ParameterExtraction};

/// Outcome of a structured model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Structured<T> {
    /// Reply parsed into the expected shape.
    Parsed(T),
    /// Reply arrived but did not match the expected shape; carries the raw text.
    Malformed(String),
    /// The call itself failed; carries the error text.
    Unavailable(String),
}

impl<T> Structured<T> {
    #[must_use]
    pub fn parsed(self) -> Option<T> {
        match self {
            Self::Parsed(value) => Some(value),
            Self::Malformed(_) | Self::Unavailable(_) => None,
        }
    }

    /// Short description of why no value is available.
    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Self::Parsed(_) => None,
            Self::Malformed(raw) => Some(format!(
                "malformed response: {}",
                crate::utils::truncate_string(raw, 200)
            )),
            Self::Unavailable(err) => Some(format!("service unavailable: {err}")),
        }
    }

    /// Parse a JSON reply, accepting a fenced code block around it.
    pub fn from_reply(reply: &str) -> Self
    where
        T: serde::de::DeserializeOwned,
    {
        let body = crate::utils::unwrap_code_fence(reply);
        match serde_json::from_str(&body) {
            Ok(value) => Self::Parsed(value),
            Err(_) => Self::Malformed(reply.to_string()),
        }
    }
}

/// Which generation task a free-text call serves.
///
/// Each purpose has its own sampling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    UsageGuidance,
    FunctionDescription,
    SqlCorrection,
}

impl Purpose {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UsageGuidance => "usage_guidance",
            Self::FunctionDescription => "function_description",
            Self::SqlCorrection => "sql_correction",
        }
    }
}

/// Structured complexity classification.
pub trait ClassificationService: Send + Sync {
    fn classify_structured(&self, system_prompt: &str, sql: &str) -> Structured<ComplexityAnalysis>;
}

/// Structured parameter extraction.
pub trait ExtractionService: Send + Sync {
    fn extract_structured(
        &self,
        system_prompt: &str,
        sql: &str,
        question: &str,
    ) -> Structured<ParameterExtraction>;
}

/// Free-text generation.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, purpose: Purpose, system_prompt: &str, user_prompt: &str) -> Result<String>;
}
