//! Complexity classification and candidate selection.

pub mod heuristic;

use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::llm::{prompts, ClassificationService, Structured};
use crate::models::{Candidate, ComplexityAnalysis, ComplexityTier, ExtractedQuery};
use crate::params::ParameterExtractor;
use crate::utils::{take_chars, truncate_string};

/// Where an analysis came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisSource {
    Structured,
    Heuristic,
}

/// Classifies SQL through the structured service, falling back to
/// [`heuristic::analyze`] on any failure.
pub struct Classifier<'a> {
    service: &'a dyn ClassificationService,
}

impl<'a> Classifier<'a> {
    #[must_use]
    pub fn new(service: &'a dyn ClassificationService) -> Self {
        Self { service }
    }

    /// Classify one statement. Never fails.
    #[must_use]
    pub fn classify(&self, sql: &str) -> ComplexityAnalysis {
        self.classify_with_source(sql).0
    }

    fn classify_with_source(&self, sql: &str) -> (ComplexityAnalysis, AnalysisSource) {
        match self
            .service
            .classify_structured(prompts::COMPLEXITY_SYSTEM_PROMPT, sql)
        {
            Structured::Parsed(analysis) => (analysis, AnalysisSource::Structured),
            other => {
                let reason = other.failure_reason().unwrap_or_default();
                warn!(reason = %reason, "Structured classification failed, using heuristic");
                (heuristic::analyze(sql), AnalysisSource::Heuristic)
            }
        }
    }
}

/// Result of a batch evaluation.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub candidates: Vec<Candidate>,
    pub classified: usize,
    pub retained: usize,
    pub heuristic_fallbacks: usize,
}

/// Classify every query, keep those at or above `threshold`, and extract
/// parameters for the kept ones. Candidate order follows input order.
pub fn evaluate(
    classifier: &Classifier<'_>,
    extractor: &ParameterExtractor<'_>,
    queries: &[ExtractedQuery],
    threshold: ComplexityTier,
    cancel: &CancelToken,
) -> Result<Evaluation> {
    info!(count = queries.len(), threshold = %threshold, "Evaluating queries for complexity");
    let mut evaluation = Evaluation::default();

    for (index, query) in queries.iter().enumerate() {
        cancel.check()?;
        debug!(
            position = index + 1,
            total = queries.len(),
            question = %truncate_string(&query.question, 60),
            "Analyzing query"
        );

        let (analysis, source) = classifier.classify_with_source(&query.sql);
        evaluation.classified += 1;
        if source == AnalysisSource::Heuristic {
            evaluation.heuristic_fallbacks += 1;
        }
        log_analysis(query, &analysis, source);

        if analysis.tier >= threshold {
            let (parameters, parameterized_sql) = extractor.extract(&query.sql, &query.question);
            evaluation
                .candidates
                .push(Candidate::new(query, analysis, parameters, parameterized_sql));
            evaluation.retained += 1;
        }
    }

    info!(
        classified = evaluation.classified,
        retained = evaluation.retained,
        heuristic_fallbacks = evaluation.heuristic_fallbacks,
        "Complexity evaluation finished"
    );
    Ok(evaluation)
}

fn log_analysis(query: &ExtractedQuery, analysis: &ComplexityAnalysis, source: AnalysisSource) {
    let question = truncate_string_keep(&query.question, 100);
    let mut sql = take_chars(&query.sql, 500);
    if query.sql.chars().count() > 500 {
        sql.push_str("\n... (truncated)");
    }
    let features = analysis.feature_summary();

    if analysis.tier == ComplexityTier::Complex {
        info!(
            complexity = %analysis.tier,
            source = ?source,
            question = %question,
            features = %features,
            reasoning = %analysis.reasoning,
            sql = %sql,
            "Classified query"
        );
    } else {
        debug!(
            complexity = %analysis.tier,
            source = ?source,
            question = %question,
            features = %features,
            reasoning = %analysis.reasoning,
            sql = %sql,
            "Classified query"
        );
    }
}

/// First `max` characters, with `...` appended when cut.
fn truncate_string_keep(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", take_chars(s, max))
    } else {
        s.to_string()
    }
}
