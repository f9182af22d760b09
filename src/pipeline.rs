//! End-to-end run: extract, classify, materialize, report.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::cancel::CancelToken;
use crate::classify::{evaluate, Classifier};
use crate::config::Config;
use crate::engine::{ExecutionTarget, SqlEngine};
use crate::error::MinerError;
use crate::extract::{ExtractOptions, QueryExtractor};
use crate::llm::{ClassificationService, ExtractionService, TextGenerator};
use crate::materialize::{
    CreatePolicy, FunctionBackend, MaterializeOptions, MaterializeResult, Materializer,
};
use crate::models::{ComplexityTier, CreationOutcome, Report};
use crate::params::ParameterExtractor;
use crate::registry::RegistryStore;
use crate::source::{ConversationScope, ConversationSource};
use crate::timestamp::TimeWindow;

/// External collaborators used by a run.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub source: &'a dyn ConversationSource,
    pub classifier: &'a dyn ClassificationService,
    pub extractor: &'a dyn ExtractionService,
    pub generator: &'a dyn TextGenerator,
    pub store: &'a dyn RegistryStore,
    pub engine: Option<&'a dyn SqlEngine>,
}

/// What to mine and what to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub scope: ConversationScope,
    pub catalog: String,
    pub schema: String,
    pub warehouse_id: Option<String>,
    pub max_conversations: Option<usize>,
    pub threshold: ComplexityTier,
    pub dry_run: bool,
    pub force: bool,
    pub create_examples: bool,
    pub create_functions: bool,
    pub register_functions: bool,
    pub window: TimeWindow,
    pub workers: usize,
}

impl RunOptions {
    /// Options with every step enabled and defaults for the rest.
    #[must_use]
    pub fn new(catalog: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            scope: ConversationScope::Own,
            catalog: catalog.into(),
            schema: schema.into(),
            warehouse_id: None,
            max_conversations: None,
            threshold: ComplexityTier::Complex,
            dry_run: false,
            force: false,
            create_examples: true,
            create_functions: true,
            register_functions: true,
            window: TimeWindow::default(),
            workers: 4,
        }
    }
}

/// Timing knobs for statement execution and propagation waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning {
    pub create: CreatePolicy,
    pub wait_timeout: Duration,
    pub settle_delay: Duration,
}

impl Tuning {
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            create: CreatePolicy::from_config(config),
            wait_timeout: config.execution.wait_timeout,
            settle_delay: config.delays.settle,
        }
    }

    /// No waits; the retry budget is kept.
    #[must_use]
    pub const fn immediate(max_retries: u32) -> Self {
        Self {
            create: CreatePolicy::immediate(max_retries),
            wait_timeout: Duration::from_secs(30),
            settle_delay: Duration::ZERO,
        }
    }
}

/// Run the whole pipeline and summarize it.
///
/// Failing to list conversations aborts with a report holding one error.
/// Everything after that degrades per candidate and is reported.
pub fn run(services: &Services<'_>, options: &RunOptions, tuning: &Tuning, cancel: &CancelToken) -> Report {
    let extraction = match QueryExtractor::new(
        services.source,
        ExtractOptions {
            scope: options.scope,
            max_conversations: options.max_conversations,
            window: options.window,
        },
    )
    .extract()
    {
        Ok(extraction) => extraction,
        Err(err) => {
            error!(error = %err, "Failed to extract queries");
            return Report::aborted(format!("Failed to extract queries: {err}"));
        }
    };

    let mut report = Report {
        total_conversations: extraction.stats.conversations,
        total_messages: extraction.stats.messages,
        queries_extracted: extraction.queries.len(),
        ..Report::default()
    };
    if extraction.queries.is_empty() {
        warn!("No queries found in conversations");
        return report;
    }

    let classifier = Classifier::new(services.classifier);
    let extractor = ParameterExtractor::new(services.extractor);
    let evaluation = match evaluate(&classifier, &extractor, &extraction.queries, options.threshold, cancel) {
        Ok(evaluation) => evaluation,
        Err(err) => {
            report.errors.push(err.to_string());
            return report;
        }
    };
    report.complex_queries = evaluation.candidates.len();
    if evaluation.candidates.is_empty() {
        info!(threshold = %options.threshold, "No queries at or above the threshold");
        return report;
    }

    let target = options.warehouse_id.as_ref().map(|warehouse_id| ExecutionTarget {
        warehouse_id: warehouse_id.clone(),
        catalog: options.catalog.clone(),
        schema: options.schema.clone(),
        wait_timeout: tuning.wait_timeout,
    });
    let backend = match (services.engine, target.as_ref()) {
        (Some(engine), Some(target)) => Some(FunctionBackend { engine, target }),
        _ => None,
    };

    let result = Materializer::new(
        services.generator,
        services.store,
        &options.catalog,
        &options.schema,
        cancel,
    )
    .with_backend(backend)
    .with_policy(tuning.create)
    .with_settle_delay(tuning.settle_delay)
    .run_all(
        &evaluation.candidates,
        MaterializeOptions {
            force: options.force,
            dry_run: options.dry_run,
            create_examples: options.create_examples,
            create_functions: options.create_functions,
            register_functions: options.register_functions,
            workers: options.workers,
        },
    );

    summarize(&mut report, &result);
    if cancel.is_cancelled() {
        let cancelled = MinerError::Cancelled.to_string();
        if !report.errors.iter().any(|e| e.contains(&cancelled)) {
            report.errors.push(cancelled);
        }
    }
    report
}

fn summarize(report: &mut Report, result: &MaterializeResult) {
    let successes = |outcomes: &[CreationOutcome]| outcomes.iter().filter(|o| o.success).count();
    report.examples_created = successes(&result.examples);
    report.functions_created = successes(&result.functions);
    report.functions_registered = successes(&result.registrations);

    for outcome in result.all() {
        if outcome.success {
            match &outcome.note {
                Some(note) => info!(kind = %outcome.kind, name = %outcome.name, note = %note, "Created with note"),
                None => info!(kind = %outcome.kind, name = %outcome.name, "Created"),
            }
        } else if let Some(line) = outcome.error_line() {
            warn!(kind = %outcome.kind, name = %outcome.name, "{line}");
            report.errors.push(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeLlm, FakeSource, FakeStore};

    #[test]
    fn listing_failure_aborts_with_single_error() {
        let source = FakeSource::new();
        source.fail_listing();
        let llm = FakeLlm::new();
        let store = FakeStore::new();
        let services = Services {
            source: &source,
            classifier: &llm,
            extractor: &llm,
            generator: &llm,
            store: &store,
            engine: None,
        };
        let report = run(&services, &RunOptions::new("main", "assets"), &Tuning::immediate(2), &CancelToken::new());
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("Failed to extract queries"));
        assert_eq!(report.queries_extracted, 0);
        assert_eq!(report.total_conversations, 0);
    }

    #[test]
    fn empty_source_is_clean_report() {
        let source = FakeSource::new();
        let llm = FakeLlm::new();
        let store = FakeStore::new();
        let services = Services {
            source: &source,
            classifier: &llm,
            extractor: &llm,
            generator: &llm,
            store: &store,
            engine: None,
        };
        let report = run(&services, &RunOptions::new("main", "assets"), &Tuning::immediate(2), &CancelToken::new());
        assert!(report.is_success());
        assert_eq!(report, Report::default());
    }
}
