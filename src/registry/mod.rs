//! Knowledge-base registry: document model, pure merge, and the
//! read-modify-write driver shared by every section.
//!
//! The document is read, merged locally and written back whole. There is no
//! concurrency token, so concurrent runs against one registry race and the
//! last writer wins. Within a run all writes are sequential.

pub mod document;
pub mod merge;

pub use document::{
    new_entry_id, ExampleEntry, FunctionEntry, Instructions, ParameterHint, RegistryDocument,
    SectionEntry,
};
pub use merge::{Disposition, MergePlan};

use serde_json::Value;
use tracing::{error, info};

use crate::error::{MinerError, Result};
use crate::models::{CreationOutcome, OutcomeKind};

/// Outcome name used for batch-level failures.
pub const BATCH_OUTCOME_NAME: &str = "batch";

/// Stores the registry document.
pub trait RegistryStore: Send + Sync {
    /// Current document, or `None` when none has been written yet.
    fn get_document(&self) -> Result<Option<Value>>;

    /// Replace the whole document.
    fn put_document(&self, document: &Value) -> Result<()>;
}

/// Per-section merge settings.
#[derive(Debug, Clone, Copy)]
pub struct MergeOptions {
    pub kind: OutcomeKind,
    pub force: bool,
    pub dry_run: bool,
    /// Error text for candidates that already exist and are kept.
    pub exists_message: &'static str,
}

/// One candidate offered to a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeItem {
    /// Key compared against [`SectionEntry::merge_key`].
    pub key: String,
    /// Name used in outcomes and logs.
    pub name: String,
}

/// Drives the fetch, plan, build, apply and write cycle against a store.
pub struct RegistryMerger<'a> {
    store: &'a dyn RegistryStore,
}

impl<'a> RegistryMerger<'a> {
    #[must_use]
    pub fn new(store: &'a dyn RegistryStore) -> Self {
        Self { store }
    }

    /// Fetch the current document, defaulting to the skeleton.
    pub fn fetch(&self) -> Result<RegistryDocument> {
        match self.store.get_document()? {
            Some(value) if !value.is_null() => RegistryDocument::from_value(value),
            _ => Ok(RegistryDocument::skeleton()),
        }
    }

    /// Merge `items` into the section holding `E`.
    ///
    /// `build` receives the indices (into `items`) of candidates that will be
    /// written and must return their entries in the same order. Failures
    /// while fetching, building or writing become one batch-level failure
    /// outcome appended after any per-candidate outcomes already recorded.
    pub fn merge<E, F>(&self, items: &[MergeItem], options: MergeOptions, build: F) -> Vec<CreationOutcome>
    where
        E: SectionEntry + serde::Serialize,
        F: FnOnce(&[usize]) -> Result<Vec<E>>,
    {
        let mut outcomes = Vec::new();
        if items.is_empty() {
            return outcomes;
        }
        if let Err(err) = self.merge_inner(items, options, build, &mut outcomes) {
            error!(kind = %options.kind, error = %err, "Registry merge failed");
            outcomes.push(CreationOutcome::failed(
                options.kind,
                BATCH_OUTCOME_NAME,
                err.to_string(),
            ));
        }
        outcomes
    }

    fn merge_inner<E, F>(
        &self,
        items: &[MergeItem],
        options: MergeOptions,
        build: F,
        outcomes: &mut Vec<CreationOutcome>,
    ) -> Result<()>
    where
        E: SectionEntry + serde::Serialize,
        F: FnOnce(&[usize]) -> Result<Vec<E>>,
    {
        let doc = self.fetch()?;
        let existing = E::section(&doc);
        if !existing.is_empty() {
            info!(kind = %options.kind, count = existing.len(), "Found existing registry entries");
        }

        let keys: Vec<String> = items.iter().map(|item| item.key.clone()).collect();
        let plan = merge::plan(existing.iter().map(SectionEntry::merge_key), &keys, options.force);

        for (item, disposition) in items.iter().zip(&plan.dispositions) {
            match disposition {
                Disposition::Existing { .. } => {
                    info!(kind = %options.kind, name = %item.name, "Skipping, already registered");
                    outcomes.push(CreationOutcome::failed(
                        options.kind,
                        &item.name,
                        options.exists_message,
                    ));
                }
                Disposition::Replace { index } => {
                    info!(kind = %options.kind, name = %item.name, index, "Replacing existing entry");
                }
                Disposition::BatchDuplicate => {
                    info!(kind = %options.kind, name = %item.name, "Skipping duplicate within batch");
                }
                Disposition::New => {}
            }
        }

        let writing: Vec<usize> = plan.writing().collect();
        if writing.is_empty() {
            info!(kind = %options.kind, "No new registry entries to write");
            return Ok(());
        }

        let entries = build(&writing)?;
        if entries.len() != writing.len() {
            return Err(MinerError::Registry(format!(
                "built {} entries for {} candidates",
                entries.len(),
                writing.len()
            )));
        }
        for &index in &writing {
            outcomes.push(CreationOutcome::created(options.kind, &items[index].name));
        }

        if options.dry_run {
            info!(kind = %options.kind, count = writing.len(), "[DRY RUN] Would write registry entries");
            return Ok(());
        }

        let doc = merge::apply(doc, &plan, entries);
        self.store.put_document(&doc.to_value()?)?;
        info!(
            kind = %options.kind,
            added = writing.len(),
            replaced = plan.removals().len(),
            "Registry document updated"
        );
        Ok(())
    }
}
