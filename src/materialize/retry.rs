//! Create-with-retry for a single catalog function.
//!
//! Attempts are strictly sequential. A transient failure (timeout, throttling,
//! server error) resubmits the same statement. Otherwise the correction
//! service is asked for a fixed statement; when it has nothing new and the
//! first attempt used parameters, the function is retried once without them.
//! At most `max_retries + 1` create statements are submitted.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::engine::{execute_and_wait, ExecutionTarget, PollPolicy, SqlEngine};
use crate::error::Result;
use crate::llm::{prompts, Purpose, TextGenerator};
use crate::models::{Candidate, CreationOutcome, OutcomeKind};
use crate::utils::unwrap_code_fence;

use super::functions::{smoke_test_statement, tag_statement, FunctionSpec, FALLBACK_DESCRIPTION};

/// Limits and waits for function creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatePolicy {
    pub max_retries: u32,
    pub statement: PollPolicy,
    pub smoke_test: PollPolicy,
    /// Wait between creation and the smoke test; a heuristic, not a guarantee.
    pub propagation_delay: Duration,
}

impl CreatePolicy {
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.pipeline.max_retries,
            statement: PollPolicy::new(config.execution.poll_interval, config.execution.max_polls),
            smoke_test: PollPolicy::new(
                config.execution.smoke_poll_interval,
                config.execution.smoke_max_polls,
            ),
            propagation_delay: config.delays.propagation,
        }
    }

    /// No waiting anywhere; used by tests.
    #[must_use]
    pub const fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            statement: PollPolicy::new(Duration::ZERO, 3),
            smoke_test: PollPolicy::new(Duration::ZERO, 3),
            propagation_delay: Duration::ZERO,
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    /// Resubmit the same statement after a transient failure.
    Resubmit,
    /// Retry with a corrected statement.
    Corrected(String),
    /// Retry without parameters.
    Degraded(String),
    /// Stop retrying.
    GiveUp,
}

pub struct FunctionCreator<'a> {
    engine: &'a dyn SqlEngine,
    generator: &'a dyn TextGenerator,
    target: &'a ExecutionTarget,
    policy: CreatePolicy,
}

impl<'a> FunctionCreator<'a> {
    #[must_use]
    pub fn new(
        engine: &'a dyn SqlEngine,
        generator: &'a dyn TextGenerator,
        target: &'a ExecutionTarget,
        policy: CreatePolicy,
    ) -> Self {
        Self {
            engine,
            generator,
            target,
            policy,
        }
    }

    /// Build the function spec, generating a description.
    #[must_use]
    pub fn spec_for(&self, candidate: &Candidate) -> FunctionSpec {
        let description = self.describe(candidate);
        FunctionSpec::for_candidate(candidate, &self.target.catalog, &self.target.schema, &description)
    }

    fn describe(&self, candidate: &Candidate) -> String {
        let generated = self.generator.generate(
            Purpose::FunctionDescription,
            prompts::FUNCTION_DESCRIPTION_PROMPT,
            &prompts::function_description_message(candidate),
        );
        match generated {
            Ok(text) => {
                let cleaned = text.trim().trim_matches(['"', '\'']).trim();
                if cleaned.is_empty() {
                    FALLBACK_DESCRIPTION.to_string()
                } else {
                    cleaned.to_string()
                }
            }
            Err(err) => {
                warn!(error = %err, "Function description failed, using fallback");
                FALLBACK_DESCRIPTION.to_string()
            }
        }
    }

    /// Run the create-with-retry loop for one candidate.
    ///
    /// The outcome name is the unqualified function name.
    #[must_use]
    pub fn create(&self, candidate: &Candidate) -> CreationOutcome {
        let spec = self.spec_for(candidate);
        let mut statement = spec.create_statement();
        let mut last_error = String::new();
        let mut retryable = false;
        let mut attempts = 0;

        for attempt in 0..=self.policy.max_retries {
            attempts += 1;
            if attempt > 0 {
                info!(
                    function = %spec.name,
                    attempt,
                    max_retries = self.policy.max_retries,
                    "Retrying function creation"
                );
            }
            match execute_and_wait(self.engine, &statement, self.target, self.policy.statement) {
                Ok(()) => {
                    info!(function = %spec.name, attempts, "Created function");
                    return self.after_create(&spec);
                }
                Err(err) => {
                    last_error = err.to_string();
                    retryable = err.is_retryable();
                    warn!(
                        function = %spec.name,
                        attempt = attempts,
                        retryable,
                        error = %last_error,
                        "Function creation failed"
                    );
                }
            }
            if attempt == self.policy.max_retries {
                break;
            }
            let step = if retryable {
                NextStep::Resubmit
            } else {
                self.next_step(candidate, &spec, &statement, &last_error, attempt)
            };
            match step {
                NextStep::Resubmit => {
                    info!(function = %spec.name, "Transient failure, resubmitting statement");
                }
                NextStep::Corrected(next) => {
                    info!(function = %spec.name, "Applying corrected SQL for next attempt");
                    statement = next;
                }
                NextStep::Degraded(next) => {
                    info!(function = %spec.name, "Falling back to a function without parameters");
                    statement = next;
                }
                NextStep::GiveUp => break,
            }
        }

        CreationOutcome::failed(
            OutcomeKind::Function,
            &spec.name,
            format!("Failed after {attempts} attempts: {last_error}"),
        )
    }

    fn next_step(
        &self,
        candidate: &Candidate,
        spec: &FunctionSpec,
        statement: &str,
        error: &str,
        attempt: u32,
    ) -> NextStep {
        if let Some(corrected) = self.correct(statement, error) {
            if corrected != statement {
                return NextStep::Corrected(corrected);
            }
        }
        if attempt == 0 && !spec.parameters.is_empty() {
            return NextStep::Degraded(spec.without_parameters(&candidate.sql).create_statement());
        }
        NextStep::GiveUp
    }

    fn correct(&self, statement: &str, error: &str) -> Option<String> {
        match self.generator.generate(
            Purpose::SqlCorrection,
            prompts::SQL_CORRECTION_PROMPT,
            &prompts::correction_message(statement, error),
        ) {
            Ok(reply) => {
                let corrected = unwrap_code_fence(&reply);
                (!corrected.is_empty()).then_some(corrected)
            }
            Err(err) => {
                warn!(error = %err, "SQL correction attempt failed");
                None
            }
        }
    }

    fn after_create(&self, spec: &FunctionSpec) -> CreationOutcome {
        if let Err(err) = self.run(&tag_statement(&spec.qualified_name), self.policy.statement) {
            warn!(function = %spec.qualified_name, error = %err, "Failed to set function tags");
        } else {
            debug!(function = %spec.qualified_name, "Set function tags");
        }

        if !self.policy.propagation_delay.is_zero() {
            std::thread::sleep(self.policy.propagation_delay);
        }

        let outcome = CreationOutcome::created(OutcomeKind::Function, &spec.name);
        match self.run(&smoke_test_statement(&spec.qualified_name), self.policy.smoke_test) {
            Ok(()) => {
                info!(function = %spec.qualified_name, "Smoke test passed");
                outcome
            }
            Err(err) => {
                warn!(
                    function = %spec.qualified_name,
                    error = %err,
                    "Smoke test failed; function may need manual verification"
                );
                outcome.with_note(format!("Smoke test failed: {err}"))
            }
        }
    }

    fn run(&self, statement: &str, policy: PollPolicy) -> Result<()> {
        execute_and_wait(self.engine, statement, self.target, policy)
    }
}
