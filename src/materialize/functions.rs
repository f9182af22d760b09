//! Catalog function naming and statement generation.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::models::{Candidate, Parameter};
use crate::params::marker_regex;
use crate::utils::take_chars;

/// Prefix applied to every derived function name.
pub const FUNCTION_PREFIX: &str = "genie_";

/// Description used when generation fails.
pub const FALLBACK_DESCRIPTION: &str =
    "Executes a complex analytical query based on user requirements.";

const COMMENT_FOOTER: &str = "*Auto-generated by asset-miner*";
const MAX_NAME_LEN: usize = 50;
const MAX_COMMENT_QUESTION_LEN: usize = 300;

static NON_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_]").expect("valid regex"));

/// Derive a function name from the first five words of a question.
#[must_use]
pub fn function_name(question: &str) -> String {
    let lowered = question.to_lowercase();
    let joined = lowered.split_whitespace().take(5).collect::<Vec<_>>().join("_");
    let mut name = NON_IDENT.replace_all(&joined, "").into_owned();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "fn_");
    }
    format!("{FUNCTION_PREFIX}{}", take_chars(&name, MAX_NAME_LEN))
}

/// `catalog.schema.name`.
#[must_use]
pub fn qualified_name(catalog: &str, schema: &str, name: &str) -> String {
    format!("{catalog}.{schema}.{name}")
}

/// Escape a value for a single-quoted SQL literal.
#[must_use]
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Rewrite `:name` markers for the given parameter names into bare references.
///
/// Text inside single-quoted literals and `::` casts are left alone.
#[must_use]
pub fn markers_to_references(sql: &str, names: &[&str]) -> String {
    let patterns: Vec<(Regex, &str)> = names
        .iter()
        .filter_map(|name| marker_regex(name).map(|re| (re, *name)))
        .collect();
    // Odd segments sit between quotes; an escaped '' yields an empty segment.
    sql.split('\'')
        .enumerate()
        .map(|(i, segment)| {
            if i % 2 == 1 {
                return segment.to_string();
            }
            patterns.iter().fold(segment.to_string(), |acc, (re, name)| {
                re.replace_all(&acc, |caps: &Captures| format!("{}{name}", &caps[1]))
                    .into_owned()
            })
        })
        .collect::<Vec<_>>()
        .join("'")
}

/// Default value clause for a parameter; `NULL` when there is none.
#[must_use]
pub fn format_default(param: &Parameter) -> String {
    match param.effective_default() {
        None => "NULL".to_string(),
        Some(value) if param.declared_type.is_quoted() => format!("'{}'", escape_literal(&value)),
        Some(value) => value,
    }
}

fn parameter_definition(param: &Parameter) -> String {
    format!(
        "{} {} DEFAULT {} COMMENT '{}'",
        param.name,
        param.declared_type.sql_type(),
        format_default(param),
        escape_literal(&param.description)
    )
}

/// Markdown comment block, already escaped for a SQL string literal.
///
/// Line breaks are written as literal `\n` sequences.
#[must_use]
pub fn function_comment(description: &str, question: &str) -> String {
    let question = if question.chars().count() > MAX_COMMENT_QUESTION_LEN {
        format!("{}...", take_chars(question, MAX_COMMENT_QUESTION_LEN - 3))
    } else {
        question.to_string()
    };
    let quoted = format!("> {question}");
    let parts = [
        "## Description",
        "",
        description,
        "",
        "## Example Question",
        "",
        quoted.as_str(),
        "",
        "---",
        COMMENT_FOOTER,
    ];
    escape_literal(&parts.join("\\n"))
}

fn strip_trailing_semicolons(sql: &str) -> &str {
    sql.trim_end().trim_end_matches(';').trim_end()
}

/// Everything needed to build a create statement for one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpec {
    pub name: String,
    pub qualified_name: String,
    pub comment: String,
    pub parameters: Vec<Parameter>,
    pub body: String,
}

impl FunctionSpec {
    /// Spec for `candidate` using its parameters when it has any.
    #[must_use]
    pub fn for_candidate(candidate: &Candidate, catalog: &str, schema: &str, description: &str) -> Self {
        let name = function_name(&candidate.question);
        let (parameters, body) = match (&candidate.parameterized_sql, candidate.parameters.is_empty()) {
            (Some(sql), false) => {
                let names: Vec<&str> = candidate.parameters.iter().map(|p| p.name.as_str()).collect();
                (candidate.parameters.clone(), markers_to_references(sql, &names))
            }
            (None, false) => (candidate.parameters.clone(), candidate.sql.clone()),
            _ => (Vec::new(), candidate.sql.clone()),
        };
        Self {
            qualified_name: qualified_name(catalog, schema, &name),
            name,
            comment: function_comment(description, &candidate.question),
            parameters,
            body,
        }
    }

    /// The same function without parameters, wrapping the original SQL.
    #[must_use]
    pub fn without_parameters(&self, original_sql: &str) -> Self {
        Self {
            parameters: Vec::new(),
            body: original_sql.to_string(),
            ..self.clone()
        }
    }

    /// `CREATE OR REPLACE FUNCTION` statement.
    ///
    /// The body follows `RETURN` without parentheses so CTE bodies stay valid.
    #[must_use]
    pub fn create_statement(&self) -> String {
        let signature = if self.parameters.is_empty() {
            "()".to_string()
        } else {
            let defs = self
                .parameters
                .iter()
                .map(parameter_definition)
                .collect::<Vec<_>>()
                .join(",\n    ");
            format!("(\n    {defs}\n)")
        };
        format!(
            "CREATE OR REPLACE FUNCTION {}{}\nRETURNS TABLE\nLANGUAGE SQL\nCOMMENT '{}'\nRETURN {}",
            self.qualified_name,
            signature,
            self.comment,
            strip_trailing_semicolons(&self.body)
        )
    }
}

/// Provenance tags applied after a successful create.
#[must_use]
pub fn tag_statement(qualified_name: &str) -> String {
    format!(
        "ALTER FUNCTION {qualified_name} SET TAGS ('generated_by' = 'asset-miner', 'auto_generated' = 'true', 'source' = 'conversation')"
    )
}

/// Existence check run after creation.
#[must_use]
pub fn smoke_test_statement(qualified_name: &str) -> String {
    format!("DESCRIBE FUNCTION {qualified_name}")
}
