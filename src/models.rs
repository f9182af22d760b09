//! Core data model shared by the extraction, classification and
//! materialization stages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A question/SQL pair mined from a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedQuery {
    pub question: String,
    pub sql: String,
    #[serde(default)]
    pub execution_time_ms: Option<i64>,
    pub message_id: String,
    pub conversation_id: String,
}

/// Ordered complexity classification. `Simple < Moderate < Complex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    #[serde(alias = "SIMPLE", alias = "Simple")]
    Simple,
    #[serde(alias = "MODERATE", alias = "Moderate")]
    Moderate,
    #[serde(alias = "COMPLEX", alias = "Complex")]
    Complex,
}

impl ComplexityTier {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
        }
    }
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplexityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "moderate" => Ok(Self::Moderate),
            "complex" => Ok(Self::Complex),
            other => Err(format!(
                "unknown complexity tier '{other}' (expected simple, moderate or complex)"
            )),
        }
    }
}

/// Complexity classification of one SQL statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityAnalysis {
    #[serde(rename = "complexity", alias = "tier")]
    pub tier: ComplexityTier,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub has_joins: bool,
    #[serde(default)]
    pub has_subqueries: bool,
    #[serde(default)]
    pub has_ctes: bool,
    #[serde(default)]
    pub has_window_functions: bool,
    #[serde(default)]
    pub has_aggregations: bool,
    #[serde(default)]
    pub join_count: u32,
}

impl ComplexityAnalysis {
    /// Human-readable list of detected features, e.g. `JOINs: 3, CTEs`.
    #[must_use]
    pub fn feature_summary(&self) -> String {
        let mut features = Vec::new();
        if self.has_joins {
            features.push(format!("JOINs: {}", self.join_count));
        }
        if self.has_ctes {
            features.push("CTEs".to_string());
        }
        if self.has_window_functions {
            features.push("Window Functions".to_string());
        }
        if self.has_subqueries {
            features.push("Subqueries".to_string());
        }
        if self.has_aggregations {
            features.push("Aggregations".to_string());
        }
        if features.is_empty() {
            "None detected".to_string()
        } else {
            features.join(", ")
        }
    }
}

/// Declared type of an extracted parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParamType {
    String,
    Date,
    DateTime,
    Decimal,
    Integer,
}

impl ParamType {
    /// Parse a declared type leniently; anything unrecognized is a string.
    #[must_use]
    pub fn from_declared(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "date" => Self::Date,
            "date and time" | "datetime" | "timestamp" | "timestamp_ntz" => Self::DateTime,
            "decimal" | "double" | "float" | "number" | "numeric" => Self::Decimal,
            "integer" | "int" | "bigint" | "smallint" | "tinyint" | "long" => Self::Integer,
            _ => Self::String,
        }
    }

    /// Name used when describing the parameter to people and models.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Date => "Date",
            Self::DateTime => "Date and Time",
            Self::Decimal => "Decimal",
            Self::Integer => "Integer",
        }
    }

    /// Type hint vocabulary of the examples registry.
    #[must_use]
    pub const fn type_hint(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Date => "DATE",
            Self::DateTime => "TIMESTAMP",
            Self::Decimal => "DECIMAL",
            Self::Integer => "INTEGER",
        }
    }

    /// SQL type used in a function signature.
    #[must_use]
    pub const fn sql_type(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Date => "DATE",
            Self::DateTime => "TIMESTAMP",
            Self::Decimal => "DOUBLE",
            Self::Integer => "BIGINT",
        }
    }

    /// Whether literal values of this type are quoted in SQL.
    #[must_use]
    pub const fn is_quoted(&self) -> bool {
        matches!(self, Self::String | Self::Date | Self::DateTime)
    }
}

impl From<String> for ParamType {
    fn from(value: String) -> Self {
        Self::from_declared(&value)
    }
}

impl From<ParamType> for String {
    fn from(value: ParamType) -> Self {
        value.display_name().to_string()
    }
}

/// A literal lifted out of a query into a named, typed parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", alias = "sql_type")]
    pub declared_type: ParamType,
    #[serde(rename = "original_value", alias = "original_literal", default)]
    pub original_literal: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default_value: Option<String>,
}

impl Parameter {
    /// Default value for the parameter, falling back to the original literal.
    ///
    /// Surrounding single quotes are removed so the value can be re-quoted
    /// according to the declared type.
    #[must_use]
    pub fn effective_default(&self) -> Option<String> {
        let raw = self
            .default_value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(&self.original_literal)
            .trim();
        if raw.is_empty() {
            return None;
        }
        match raw.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
            Some(quoted) => Some(quoted.replace("''", "'")),
            None => Some(raw.to_string()),
        }
    }
}

/// Structured reply of the parameter-extraction service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterExtraction {
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub parameterized_sql: Option<String>,
    #[serde(default)]
    pub reasoning: String,
}

/// A classified, parameter-extracted query eligible for materialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub question: String,
    pub sql: String,
    pub analysis: ComplexityAnalysis,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub parameterized_sql: Option<String>,
    pub message_id: String,
    pub conversation_id: String,
    #[serde(default)]
    pub execution_time_ms: Option<i64>,
}

impl Candidate {
    #[must_use]
    pub fn new(
        query: &ExtractedQuery,
        analysis: ComplexityAnalysis,
        parameters: Vec<Parameter>,
        parameterized_sql: Option<String>,
    ) -> Self {
        Self {
            question: query.question.clone(),
            sql: query.sql.clone(),
            analysis,
            parameters,
            parameterized_sql,
            message_id: query.message_id.clone(),
            conversation_id: query.conversation_id.clone(),
            execution_time_ms: query.execution_time_ms,
        }
    }

    /// The parameterized SQL when present, otherwise the original.
    #[must_use]
    pub fn sql_to_use(&self) -> &str {
        self.parameterized_sql.as_deref().unwrap_or(&self.sql)
    }
}

/// What a [`CreationOutcome`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Example,
    Function,
    Registration,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Example => "example",
            Self::Function => "function",
            Self::Registration => "registration",
        })
    }
}

/// Result of one materialization attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationOutcome {
    pub success: bool,
    pub kind: OutcomeKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Advisory information attached to a successful outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CreationOutcome {
    pub fn created(kind: OutcomeKind, name: impl Into<String>) -> Self {
        Self {
            success: true,
            kind,
            name: name.into(),
            error: None,
            note: None,
        }
    }

    pub fn failed(kind: OutcomeKind, name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            kind,
            name: name.into(),
            error: Some(error.into()),
            note: None,
        }
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// `"<kind> '<name>': <error>"` for failed outcomes.
    #[must_use]
    pub fn error_line(&self) -> Option<String> {
        if self.success {
            return None;
        }
        self.error
            .as_ref()
            .map(|error| format!("{} '{}': {}", self.kind, self.name, error))
    }
}

/// Summary of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub total_conversations: usize,
    pub total_messages: usize,
    pub queries_extracted: usize,
    pub complex_queries: usize,
    pub examples_created: usize,
    pub functions_created: usize,
    pub functions_registered: usize,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl Report {
    /// Report for a run aborted during a phase-level failure.
    pub fn aborted(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}
