//! Registry document model.
//!
//! Only the sections this crate edits are typed. Everything else round-trips
//! through flattened maps untouched.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{MinerError, Result};
use crate::utils::normalize_question;

/// The whole registry document, replaced atomically on write.
///
/// Sections absent from the fetched document stay absent on write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<Instructions>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for RegistryDocument {
    fn default() -> Self {
        Self::skeleton()
    }
}

impl RegistryDocument {
    /// Empty document used when the store has none.
    #[must_use]
    pub fn skeleton() -> Self {
        let mut extra = Map::new();
        extra.insert("version".to_string(), json!(1));
        extra.insert("config".to_string(), json!({}));
        extra.insert("data_sources".to_string(), json!({}));
        let mut instructions_extra = Map::new();
        instructions_extra.insert("text_instructions".to_string(), json!([]));
        instructions_extra.insert("join_specs".to_string(), json!([]));
        instructions_extra.insert("sql_snippets".to_string(), json!({}));
        Self {
            instructions: Some(Instructions {
                example_question_sqls: Some(Vec::new()),
                sql_functions: Some(Vec::new()),
                extra: instructions_extra,
            }),
            extra,
        }
    }

    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| MinerError::Registry(format!("invalid registry document: {e}")))
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn instructions_mut(&mut self) -> &mut Instructions {
        self.instructions.get_or_insert_with(Instructions::default)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instructions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_question_sqls: Option<Vec<ExampleEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_functions: Option<Vec<FunctionEntry>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parameter declaration on an example entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterHint {
    pub name: String,
    #[serde(default = "default_type_hint")]
    pub type_hint: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_type_hint() -> String {
    "STRING".to_string()
}

/// A curated question/SQL example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub question: Vec<String>,
    #[serde(default)]
    pub sql: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_guidance: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<ParameterHint>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExampleEntry {
    /// Question text with its line fragments joined.
    #[must_use]
    pub fn question_text(&self) -> String {
        self.question.concat()
    }
}

/// A registered catalog function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub identifier: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A typed section of the document that the merger can edit.
pub trait SectionEntry: Sized {
    /// Sort key; sections are kept ordered by it.
    fn id(&self) -> &str;

    /// Key used to detect existing and duplicate entries.
    fn merge_key(&self) -> String;

    /// Entries of this section; empty when the document has none.
    fn section(doc: &RegistryDocument) -> &[Self];

    /// Mutable section, created on first use.
    fn section_mut(doc: &mut RegistryDocument) -> &mut Vec<Self>;
}

impl SectionEntry for ExampleEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn merge_key(&self) -> String {
        normalize_question(&self.question_text())
    }

    fn section(doc: &RegistryDocument) -> &[Self] {
        doc.instructions
            .as_ref()
            .and_then(|i| i.example_question_sqls.as_deref())
            .unwrap_or_default()
    }

    fn section_mut(doc: &mut RegistryDocument) -> &mut Vec<Self> {
        doc.instructions_mut()
            .example_question_sqls
            .get_or_insert_with(Vec::new)
    }
}

impl SectionEntry for FunctionEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn merge_key(&self) -> String {
        self.identifier.clone()
    }

    fn section(doc: &RegistryDocument) -> &[Self] {
        doc.instructions
            .as_ref()
            .and_then(|i| i.sql_functions.as_deref())
            .unwrap_or_default()
    }

    fn section_mut(doc: &mut RegistryDocument) -> &mut Vec<Self> {
        doc.instructions_mut().sql_functions.get_or_insert_with(Vec::new)
    }
}

/// Fresh 32-hex identifier.
#[must_use]
pub fn new_entry_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
