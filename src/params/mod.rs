//! Parameter extraction.
//!
//! Asks the extraction service which literals should become named, typed
//! parameters, then cleans the answer up: names become snake_case, repeated
//! names keep their first occurrence, and parameters whose `:name` marker
//! does not appear in the rewritten SQL are dropped. Any service failure
//! degrades to "no parameters".

use itertools::Itertools;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::llm::{prompts, ExtractionService, Structured};
use crate::models::{Parameter, ParameterExtraction};

pub struct ParameterExtractor<'a> {
    service: &'a dyn ExtractionService,
}

impl<'a> ParameterExtractor<'a> {
    #[must_use]
    pub fn new(service: &'a dyn ExtractionService) -> Self {
        Self { service }
    }

    /// Extract parameters and the parameterized rewrite of `sql`.
    ///
    /// Returns `(vec![], None)` when nothing usable comes back.
    #[must_use]
    pub fn extract(&self, sql: &str, question: &str) -> (Vec<Parameter>, Option<String>) {
        let extraction = match self.service.extract_structured(
            prompts::PARAMETER_EXTRACTION_PROMPT,
            sql,
            question,
        ) {
            Structured::Parsed(extraction) => extraction,
            other => {
                warn!(
                    reason = %other.failure_reason().unwrap_or_default(),
                    "Parameter extraction failed"
                );
                return (Vec::new(), None);
            }
        };

        let (parameters, parameterized_sql) = sanitize(extraction);
        if parameters.is_empty() {
            debug!("No parameterizable values found in query");
            return (Vec::new(), None);
        }
        info!(
            count = parameters.len(),
            names = %parameters.iter().map(|p| p.name.as_str()).join(", "),
            "Extracted parameters"
        );
        (parameters, parameterized_sql)
    }
}

/// Normalize names, dedup, and drop parameters without a marker.
fn sanitize(extraction: ParameterExtraction) -> (Vec<Parameter>, Option<String>) {
    let Some(mut sql) = extraction
        .parameterized_sql
        .filter(|sql| !sql.trim().is_empty())
    else {
        if !extraction.parameters.is_empty() {
            warn!("Parameters returned without parameterized SQL; ignoring them");
        }
        return (Vec::new(), None);
    };

    let mut parameters = Vec::with_capacity(extraction.parameters.len());
    for mut param in extraction.parameters {
        let normalized = to_snake_case(&param.name);
        if normalized.is_empty() {
            continue;
        }
        if normalized != param.name {
            sql = rename_marker(&sql, &param.name, &normalized);
            param.name = normalized;
        }
        parameters.push(param);
    }

    let parameters: Vec<Parameter> = parameters
        .into_iter()
        .unique_by(|p| p.name.clone())
        .filter(|p| {
            let present = has_marker(&sql, &p.name);
            if !present {
                debug!(name = %p.name, "Dropping parameter without marker");
            }
            present
        })
        .collect();

    if parameters.is_empty() {
        return (Vec::new(), None);
    }
    (parameters, Some(sql))
}

/// Lowercase snake_case identifier; leading digits get a `p_` prefix.
#[must_use]
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_lower = false;
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if ch.is_ascii_uppercase() && prev_lower {
                out.push('_');
            }
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
            out.push(ch.to_ascii_lowercase());
        } else {
            if !out.ends_with('_') && !out.is_empty() {
                out.push('_');
            }
            prev_lower = false;
        }
    }
    let trimmed = out.trim_matches('_').to_string();
    if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        format!("p_{trimmed}")
    } else {
        trimmed
    }
}

pub(crate) fn marker_regex(name: &str) -> Option<Regex> {
    Regex::new(&format!(r"(^|[^:]):{}\b", regex::escape(name))).ok()
}

/// Whether `:name` occurs as a marker (not part of a `::` cast).
#[must_use]
pub fn has_marker(sql: &str, name: &str) -> bool {
    marker_regex(name).is_some_and(|re| re.is_match(sql))
}

fn rename_marker(sql: &str, from: &str, to: &str) -> String {
    marker_regex(from).map_or_else(
        || sql.to_string(),
        |re| re.replace_all(sql, format!("${{1}}:{to}")).into_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParamType;
    use crate::test_utils::FakeLlm;

    fn param(name: &str) -> Parameter {
        Parameter {
            name: name.to_string(),
            declared_type: ParamType::String,
            original_literal: "'x'".to_string(),
            description: String::new(),
            default_value: None,
        }
    }

    #[test]
    fn snake_case_normalization() {
        assert_eq!(to_snake_case("startDate"), "start_date");
        assert_eq!(to_snake_case("Min Amount"), "min_amount");
        assert_eq!(to_snake_case("region_name"), "region_name");
        assert_eq!(to_snake_case("7day_window"), "p_7day_window");
        assert_eq!(to_snake_case("--"), "");
    }

    #[test]
    fn marker_ignores_casts() {
        assert!(has_marker("WHERE d >= :start_date", "start_date"));
        assert!(!has_marker("SELECT x::start_date", "start_date"));
        assert!(!has_marker("WHERE d >= :start_dates", "start_date"));
    }

    #[test]
    fn duplicate_names_keep_first() {
        let mut first = param("region");
        first.description = "first".into();
        let mut second = param("region");
        second.description = "second".into();
        let (params, sql) = sanitize(ParameterExtraction {
            parameters: vec![first, second],
            parameterized_sql: Some("SELECT * FROM t WHERE r = :region".into()),
            reasoning: String::new(),
        });
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].description, "first");
        assert!(sql.is_some());
    }

    #[test]
    fn renamed_parameter_rewrites_marker() {
        let (params, sql) = sanitize(ParameterExtraction {
            parameters: vec![param("minAmount")],
            parameterized_sql: Some("SELECT * FROM t WHERE a > :minAmount".into()),
            reasoning: String::new(),
        });
        assert_eq!(params[0].name, "min_amount");
        assert_eq!(sql.unwrap(), "SELECT * FROM t WHERE a > :min_amount");
    }

    #[test]
    fn parameter_without_marker_is_dropped() {
        let (params, sql) = sanitize(ParameterExtraction {
            parameters: vec![param("region"), param("ghost")],
            parameterized_sql: Some("SELECT * FROM t WHERE r = :region".into()),
            reasoning: String::new(),
        });
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "region");
        assert!(sql.is_some());
    }

    #[test]
    fn missing_parameterized_sql_drops_everything() {
        let (params, sql) = sanitize(ParameterExtraction {
            parameters: vec![param("region")],
            parameterized_sql: None,
            reasoning: String::new(),
        });
        assert!(params.is_empty());
        assert!(sql.is_none());
    }

    #[test]
    fn service_failure_degrades_to_empty() {
        let llm = FakeLlm::new();
        llm.push_extraction(Structured::Unavailable("down".into()));
        let (params, sql) = ParameterExtractor::new(&llm).extract("SELECT 1", "q");
        assert!(params.is_empty());
        assert!(sql.is_none());
    }

    #[test]
    fn parsed_extraction_passes_through() {
        let llm = FakeLlm::new();
        llm.push_extraction(Structured::Parsed(ParameterExtraction {
            parameters: vec![param("region")],
            parameterized_sql: Some("SELECT * FROM t WHERE r = :region".into()),
            reasoning: "region filter".into(),
        }));
        let (params, sql) = ParameterExtractor::new(&llm).extract("SELECT * FROM t WHERE r = 'EU'", "q");
        assert_eq!(params.len(), 1);
        assert_eq!(sql.as_deref(), Some("SELECT * FROM t WHERE r = :region"));
    }
}
