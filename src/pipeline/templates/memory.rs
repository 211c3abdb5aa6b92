use std::collections::{BTreeMap, BTreeSet};

use super::types::{TemplateKind, TemplateStore};
use super::TemplateError;

/// In-memory template store for tests and embedding callers that manage
/// templates themselves.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplateStore {
    item_prompts: BTreeMap<String, String>,
    language_prompts: BTreeMap<String, String>,
    models: BTreeMap<String, String>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item_template(mut self, label: &str, prompt_text: &str) -> Self {
        self.item_prompts
            .insert(label.to_string(), prompt_text.to_string());
        self
    }

    pub fn with_language_template(mut self, lang_code: &str, instruction: &str) -> Self {
        self.language_prompts
            .insert(lang_code.to_string(), instruction.to_string());
        self
    }

    pub fn with_model(mut self, tier_name: &str, model_id: &str) -> Self {
        self.models.insert(tier_name.to_string(), model_id.to_string());
        self
    }
}

fn lookup(
    map: &BTreeMap<String, String>,
    key: &str,
    which: TemplateKind,
) -> Result<String, TemplateError> {
    map.get(key)
        .filter(|text| !text.trim().is_empty())
        .cloned()
        .ok_or_else(|| TemplateError::missing(which, key))
}

impl TemplateStore for InMemoryTemplateStore {
    fn get_item_template(&self, label: &str) -> Result<String, TemplateError> {
        lookup(&self.item_prompts, label, TemplateKind::Label)
    }

    fn get_language_template(&self, lang_code: &str) -> Result<String, TemplateError> {
        lookup(&self.language_prompts, lang_code, TemplateKind::Language)
    }

    fn get_model_for_tier(&self, tier_name: &str) -> Result<String, TemplateError> {
        lookup(&self.models, tier_name, TemplateKind::ModelTier)
    }

    fn list_known_labels(&self) -> Result<BTreeSet<String>, TemplateError> {
        Ok(self.item_prompts.keys().cloned().collect())
    }

    fn list_known_languages(&self) -> Result<BTreeSet<String>, TemplateError> {
        Ok(self.language_prompts.keys().cloned().collect())
    }
}
