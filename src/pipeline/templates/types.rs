use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::TemplateError;

/// Which lookup table a template key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    /// Extraction instruction keyed by category label.
    Label,
    /// Formatting instruction keyed by language code.
    Language,
    /// Model id keyed by tier name.
    ModelTier,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::Language => "language",
            Self::ModelTier => "model_tier",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Extraction and formatting instructions for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionPair {
    pub extraction_instruction: String,
    pub formatting_instruction: String,
}

/// Labels and language codes currently defined in the store.
///
/// Ordered sets so that prompts enumerating them are stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    pub labels: BTreeSet<String>,
    pub languages: BTreeSet<String>,
}

impl Vocabulary {
    pub fn new<L, G>(labels: L, languages: G) -> Self
    where
        L: IntoIterator,
        L::Item: Into<String>,
        G: IntoIterator,
        G::Item: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            languages: languages.into_iter().map(Into::into).collect(),
        }
    }

    /// Fetch a fresh snapshot from the store.
    pub fn load(store: &dyn TemplateStore) -> Result<Self, TemplateError> {
        Ok(Self {
            labels: store.list_known_labels()?,
            languages: store.list_known_languages()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() || self.languages.is_empty()
    }

    /// Short summary for configuration errors, e.g. "3 labels, 0 languages".
    pub fn describe(&self) -> String {
        format!("{} labels, {} languages", self.labels.len(), self.languages.len())
    }
}

/// Key-value template lookup (allows swapping SQLite for an in-memory map).
pub trait TemplateStore: Send + Sync {
    /// Extraction instruction for a category label.
    fn get_item_template(&self, label: &str) -> Result<String, TemplateError>;

    /// Formatting instruction for a language code.
    fn get_language_template(&self, lang_code: &str) -> Result<String, TemplateError>;

    /// Model id configured for a tier name ("scout", "free", "paid").
    fn get_model_for_tier(&self, tier_name: &str) -> Result<String, TemplateError>;

    fn list_known_labels(&self) -> Result<BTreeSet<String>, TemplateError>;

    fn list_known_languages(&self) -> Result<BTreeSet<String>, TemplateError>;
}
