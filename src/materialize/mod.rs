//! Asset materialization: example entries, catalog functions, and function
//! registration.
//!
//! Per-candidate work runs on the bounded pool in [`pool`]; registry writes
//! happen one at a time through [`RegistryMerger`].

pub mod examples;
pub mod functions;
pub mod pool;
pub mod retry;

pub use examples::ExampleMaterializer;
pub use functions::{function_name, FunctionSpec};
pub use pool::map_concurrent;
pub use retry::{CreatePolicy, FunctionCreator};

use std::time::Duration;

use itertools::Itertools;
use serde_json::Map;
use tracing::{debug, error, info};

use crate::cancel::CancelToken;
use crate::engine::{ExecutionTarget, SqlEngine};
use crate::llm::TextGenerator;
use crate::models::{Candidate, CreationOutcome, OutcomeKind};
use crate::registry::{new_entry_id, FunctionEntry, MergeItem, MergeOptions, RegistryMerger, RegistryStore};

pub const FUNCTION_EXISTS_MESSAGE: &str = "Function already registered (use --force to replace)";
pub const MISSING_TARGET_MESSAGE: &str = "No execution target configured (warehouse id not provided)";

/// Engine and target used for function creation.
#[derive(Clone, Copy)]
pub struct FunctionBackend<'a> {
    pub engine: &'a dyn SqlEngine,
    pub target: &'a ExecutionTarget,
}

/// Switches for one materialization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterializeOptions {
    pub force: bool,
    pub dry_run: bool,
    pub create_examples: bool,
    pub create_functions: bool,
    pub register_functions: bool,
    pub workers: usize,
}

impl Default for MaterializeOptions {
    fn default() -> Self {
        Self {
            force: false,
            dry_run: false,
            create_examples: true,
            create_functions: true,
            register_functions: true,
            workers: 4,
        }
    }
}

/// Outcomes grouped by step. Order within a group is not meaningful.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeResult {
    pub examples: Vec<CreationOutcome>,
    pub functions: Vec<CreationOutcome>,
    pub registrations: Vec<CreationOutcome>,
}

impl MaterializeResult {
    pub fn all(&self) -> impl Iterator<Item = &CreationOutcome> {
        self.examples
            .iter()
            .chain(&self.functions)
            .chain(&self.registrations)
    }
}

pub struct Materializer<'a> {
    generator: &'a dyn TextGenerator,
    store: &'a dyn RegistryStore,
    backend: Option<FunctionBackend<'a>>,
    catalog: &'a str,
    schema: &'a str,
    policy: CreatePolicy,
    /// Wait before registering functions; a heuristic, not a guarantee.
    settle_delay: Duration,
    cancel: &'a CancelToken,
}

impl<'a> Materializer<'a> {
    #[must_use]
    pub fn new(
        generator: &'a dyn TextGenerator,
        store: &'a dyn RegistryStore,
        catalog: &'a str,
        schema: &'a str,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            generator,
            store,
            backend: None,
            catalog,
            schema,
            policy: CreatePolicy::immediate(2),
            settle_delay: Duration::ZERO,
            cancel,
        }
    }

    #[must_use]
    pub const fn with_backend(mut self, backend: Option<FunctionBackend<'a>>) -> Self {
        self.backend = backend;
        self
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: CreatePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Run every enabled step over `candidates`.
    ///
    /// Registration runs only after function creation has fully completed,
    /// and only for functions created in this run.
    pub fn run_all(&self, candidates: &[Candidate], options: MaterializeOptions) -> MaterializeResult {
        info!(
            candidates = candidates.len(),
            dry_run = options.dry_run,
            force = options.force,
            "Materializing assets"
        );
        let mut result = MaterializeResult::default();

        if options.create_examples {
            result.examples = ExampleMaterializer::new(
                self.generator,
                RegistryMerger::new(self.store),
                options.workers,
                self.cancel,
            )
            .create(candidates, options.force, options.dry_run);
        } else {
            info!("Skipping example creation");
        }
        if self.cancel.is_cancelled() {
            return result;
        }

        if options.create_functions {
            result.functions = self.create_functions(candidates, options);
        } else {
            info!("Skipping function creation");
        }
        if self.cancel.is_cancelled() {
            return result;
        }

        if options.register_functions {
            result.registrations = self.register_functions(&result.functions, options);
        } else {
            info!("Skipping function registration");
        }
        result
    }

    /// Create one function per unique derived name.
    pub fn create_functions(&self, candidates: &[Candidate], options: MaterializeOptions) -> Vec<CreationOutcome> {
        if candidates.is_empty() {
            info!("No candidates to create functions for");
            return Vec::new();
        }
        let Some(backend) = self.backend else {
            error!("{MISSING_TARGET_MESSAGE}");
            return vec![CreationOutcome::failed(OutcomeKind::Function, "all", MISSING_TARGET_MESSAGE)];
        };

        let unique: Vec<&Candidate> = candidates
            .iter()
            .unique_by(|c| function_name(&c.question))
            .collect();
        if unique.len() < candidates.len() {
            debug!(skipped = candidates.len() - unique.len(), "Skipped duplicate function names");
        }

        let creator = FunctionCreator::new(backend.engine, self.generator, backend.target, self.policy);
        if options.dry_run {
            return unique
                .iter()
                .map(|candidate| {
                    let spec = creator.spec_for(candidate);
                    info!(
                        function = %spec.name,
                        parameters = spec.parameters.len(),
                        "[DRY RUN] Would create function"
                    );
                    debug!(sql = %spec.create_statement(), "[DRY RUN] Function statement");
                    CreationOutcome::created(OutcomeKind::Function, spec.name)
                })
                .collect();
        }

        info!(count = unique.len(), workers = options.workers, "Creating functions");
        let outcomes: Vec<CreationOutcome> =
            match map_concurrent(&unique, options.workers, self.cancel, |_, candidate| Ok(creator.create(candidate))) {
                Ok(results) => results
                    .into_iter()
                    .map(|(index, result)| {
                        result.unwrap_or_else(|err| {
                            let name = function_name(&unique[index].question);
                            error!(function = %name, error = %err, "Unexpected error creating function");
                            CreationOutcome::failed(OutcomeKind::Function, name, format!("Unexpected error: {err}"))
                        })
                    })
                    .collect(),
                Err(err) => vec![CreationOutcome::failed(OutcomeKind::Function, "all", err.to_string())],
            };
        let created = outcomes.iter().filter(|o| o.success).count();
        info!(created, total = outcomes.len(), "Function creation finished");
        outcomes
    }

    /// Register successfully created functions in the registry.
    pub fn register_functions(&self, function_outcomes: &[CreationOutcome], options: MaterializeOptions) -> Vec<CreationOutcome> {
        let items: Vec<MergeItem> = function_outcomes
            .iter()
            .filter(|o| o.success)
            .map(|o| {
                let fqn = functions::qualified_name(self.catalog, self.schema, &o.name);
                MergeItem {
                    key: fqn.clone(),
                    name: fqn,
                }
            })
            .collect();
        if items.is_empty() {
            info!("No functions to register");
            return Vec::new();
        }

        if !options.dry_run && !self.settle_delay.is_zero() {
            info!(
                count = items.len(),
                delay = ?self.settle_delay,
                "Waiting for catalog propagation before registration"
            );
            std::thread::sleep(self.settle_delay);
        }

        let merge_options = MergeOptions {
            kind: OutcomeKind::Registration,
            force: options.force,
            dry_run: options.dry_run,
            exists_message: FUNCTION_EXISTS_MESSAGE,
        };
        RegistryMerger::new(self.store).merge(&items, merge_options, |indices| {
            Ok(indices
                .iter()
                .map(|&i| FunctionEntry {
                    id: new_entry_id(),
                    identifier: items[i].key.clone(),
                    extra: Map::new(),
                })
                .collect())
        })
    }
}
