//! Curated example entries in the knowledge-base registry.

use serde_json::Map;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::{MinerError, Result};
use crate::llm::{prompts, Purpose, TextGenerator};
use crate::models::{Candidate, CreationOutcome, OutcomeKind};
use crate::registry::{
    new_entry_id, ExampleEntry, MergeItem, MergeOptions, ParameterHint, RegistryMerger,
};
use crate::utils::{format_sql, normalize_question, take_chars, to_lines};

use super::pool::map_concurrent;

pub const EXAMPLE_EXISTS_MESSAGE: &str =
    "Example with this question already exists (not overwriting)";

/// Guidance used when generation fails.
#[must_use]
pub fn fallback_guidance(question: &str) -> String {
    format!("Use this query to answer: {}", take_chars(question, 100))
}

/// Build a registry entry for `candidate`.
#[must_use]
pub fn build_entry(candidate: &Candidate, usage_guidance: String) -> ExampleEntry {
    let parameters = (!candidate.parameters.is_empty()).then(|| {
        candidate
            .parameters
            .iter()
            .map(|p| ParameterHint {
                name: p.name.clone(),
                type_hint: p.declared_type.type_hint().to_string(),
                extra: Map::new(),
            })
            .collect()
    });
    ExampleEntry {
        id: new_entry_id(),
        question: vec![candidate.question.clone()],
        sql: to_lines(&format_sql(candidate.sql_to_use())),
        usage_guidance: Some(vec![usage_guidance]),
        parameters,
        extra: Map::new(),
    }
}

pub struct ExampleMaterializer<'a> {
    generator: &'a dyn TextGenerator,
    merger: RegistryMerger<'a>,
    workers: usize,
    cancel: &'a CancelToken,
}

impl<'a> ExampleMaterializer<'a> {
    #[must_use]
    pub fn new(
        generator: &'a dyn TextGenerator,
        merger: RegistryMerger<'a>,
        workers: usize,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            generator,
            merger,
            workers,
            cancel,
        }
    }

    /// Register every candidate as an example entry.
    pub fn create(&self, candidates: &[Candidate], force: bool, dry_run: bool) -> Vec<CreationOutcome> {
        if candidates.is_empty() {
            info!("No candidates to create examples for");
            return Vec::new();
        }
        let items: Vec<MergeItem> = candidates
            .iter()
            .map(|c| MergeItem {
                key: normalize_question(&c.question),
                name: take_chars(&c.question, 50),
            })
            .collect();
        let options = MergeOptions {
            kind: OutcomeKind::Example,
            force,
            dry_run,
            exists_message: EXAMPLE_EXISTS_MESSAGE,
        };

        let outcomes = self.merger.merge(&items, options, |indices| {
            let selected: Vec<&Candidate> = indices.iter().map(|&i| &candidates[i]).collect();
            self.generate_entries(&selected)
        });
        let created = outcomes.iter().filter(|o| o.success).count();
        info!(created, total = outcomes.len(), "Example registration finished");
        outcomes
    }

    fn generate_entries(&self, candidates: &[&Candidate]) -> Result<Vec<ExampleEntry>> {
        info!(
            count = candidates.len(),
            workers = self.workers,
            "Generating usage guidance"
        );
        let results = map_concurrent(candidates, self.workers, self.cancel, |_, candidate| {
            self.usage_guidance(candidate)
        })?;

        let mut guidance: Vec<Option<String>> = vec![None; candidates.len()];
        for (index, result) in results {
            match result {
                Ok(text) => guidance[index] = Some(text),
                Err(MinerError::Cancelled) => return Err(MinerError::Cancelled),
                Err(err) => {
                    warn!(
                        question = %take_chars(&candidates[index].question, 50),
                        error = %err,
                        "Usage guidance failed, using fallback"
                    );
                }
            }
        }

        Ok(candidates
            .iter()
            .zip(guidance)
            .map(|(candidate, text)| {
                let text = text.unwrap_or_else(|| fallback_guidance(&candidate.question));
                build_entry(candidate, text)
            })
            .collect())
    }

    fn usage_guidance(&self, candidate: &Candidate) -> Result<String> {
        let text = self.generator.generate(
            Purpose::UsageGuidance,
            prompts::USAGE_GUIDANCE_PROMPT,
            &prompts::usage_guidance_message(candidate),
        )?;
        if text.trim().is_empty() {
            return Err(MinerError::MalformedResponse("empty usage guidance".to_string()));
        }
        debug!(guidance = %take_chars(&text, 100), "Generated usage guidance");
        Ok(text)
    }
}
