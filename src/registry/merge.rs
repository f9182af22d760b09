//! Pure merge of candidate entries into a registry section.
//!
//! [`plan`] decides what happens to each candidate; [`apply`] turns a plan
//! and the newly built entries into the next document value. Neither touches
//! the store.

use std::collections::{HashMap, HashSet};

use super::document::{RegistryDocument, SectionEntry};

/// What happens to one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Not present anywhere; append.
    New,
    /// Present at `index`; remove it and append the new entry.
    Replace { index: usize },
    /// Present at `index` and `force` is off; leave it.
    Existing { index: usize },
    /// Same key as an earlier candidate in this batch; skip silently.
    BatchDuplicate,
}

impl Disposition {
    /// Whether the candidate produces a new entry.
    #[must_use]
    pub const fn writes(&self) -> bool {
        matches!(self, Self::New | Self::Replace { .. })
    }
}

/// Disposition per candidate, in candidate order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    pub dispositions: Vec<Disposition>,
}

impl MergePlan {
    /// Indices of candidates that will be written.
    pub fn writing(&self) -> impl Iterator<Item = usize> + '_ {
        self.dispositions
            .iter()
            .enumerate()
            .filter(|(_, d)| d.writes())
            .map(|(i, _)| i)
    }

    /// Existing indices to remove, highest first.
    #[must_use]
    pub fn removals(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .dispositions
            .iter()
            .filter_map(|d| match d {
                Disposition::Replace { index } => Some(*index),
                _ => None,
            })
            .collect();
        indices.sort_unstable_by(|a, b| b.cmp(a));
        indices.dedup();
        indices
    }
}

/// Classify candidates against the existing keys.
///
/// A key repeated within the batch is a duplicate before anything else, so
/// an existing entry is never scheduled for removal twice.
#[must_use]
pub fn plan<I, S>(existing_keys: I, candidate_keys: &[String], force: bool) -> MergePlan
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let existing: HashMap<String, usize> = existing_keys
        .into_iter()
        .enumerate()
        .map(|(index, key)| (key.into(), index))
        .collect();
    let mut seen = HashSet::new();

    let dispositions = candidate_keys
        .iter()
        .map(|key| {
            if !seen.insert(key.as_str()) {
                return Disposition::BatchDuplicate;
            }
            match existing.get(key) {
                Some(&index) if force => Disposition::Replace { index },
                Some(&index) => Disposition::Existing { index },
                None => Disposition::New,
            }
        })
        .collect();
    MergePlan { dispositions }
}

/// Apply a plan: remove replaced entries, append `new_entries`, sort by id.
#[must_use]
pub fn apply<E: SectionEntry>(
    mut doc: RegistryDocument,
    plan: &MergePlan,
    new_entries: Vec<E>,
) -> RegistryDocument {
    let section = E::section_mut(&mut doc);
    for index in plan.removals() {
        if index < section.len() {
            section.remove(index);
        }
    }
    section.extend(new_entries);
    section.sort_by(|a, b| a.id().cmp(b.id()));
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::document::FunctionEntry;
    use serde_json::Map;

    fn keys(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    fn function(id: &str, identifier: &str) -> FunctionEntry {
        FunctionEntry {
            id: id.to_string(),
            identifier: identifier.to_string(),
            extra: Map::new(),
        }
    }

    #[test]
    fn plan_without_force() {
        let plan = plan(keys(&["a", "b"]), &keys(&["b", "c", "c"]), false);
        assert_eq!(
            plan.dispositions,
            vec![
                Disposition::Existing { index: 1 },
                Disposition::New,
                Disposition::BatchDuplicate
            ]
        );
        assert_eq!(plan.writing().count(), 1);
        assert!(plan.removals().is_empty());
    }

    #[test]
    fn plan_with_force_replaces_once() {
        let plan = plan(keys(&["a", "b"]), &keys(&["a", "a", "b"]), true);
        assert_eq!(
            plan.dispositions,
            vec![
                Disposition::Replace { index: 0 },
                Disposition::BatchDuplicate,
                Disposition::Replace { index: 1 }
            ]
        );
        assert_eq!(plan.removals(), vec![1, 0]);
    }

    #[test]
    fn apply_removes_appends_and_sorts() {
        let mut doc = RegistryDocument::skeleton();
        *FunctionEntry::section_mut(&mut doc) = vec![
            function("b1", "main.s.one"),
            function("d4", "main.s.two"),
            function("f6", "main.s.three"),
        ];
        let plan = plan(
            FunctionEntry::section(&doc).iter().map(|f| f.identifier.clone()),
            &keys(&["main.s.two", "main.s.four"]),
            true,
        );
        let doc = apply(doc, &plan, vec![function("c3", "main.s.two"), function("a0", "main.s.four")]);
        let ids: Vec<_> = FunctionEntry::section(&doc).iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a0", "b1", "c3", "f6"]);
    }

    #[test]
    fn apply_leaves_other_sections_alone() {
        let doc = RegistryDocument::from_value(serde_json::json!({
            "instructions": {"text_instructions": [{"id": "t"}]}
        }))
        .unwrap();
        let plan = plan(Vec::<String>::new(), &keys(&["x"]), false);
        let doc = apply(doc, &plan, vec![function("1", "x")]);
        let value = doc.to_value().unwrap();
        assert_eq!(value["instructions"]["text_instructions"], serde_json::json!([{"id": "t"}]));
        assert!(value["instructions"].get("example_question_sqls").is_none());
        assert_eq!(FunctionEntry::section(&doc).len(), 1);
    }
}
