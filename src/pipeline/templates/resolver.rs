use std::collections::HashMap;
use std::sync::Mutex;

use super::types::{InstructionPair, TemplateKind, TemplateStore};
use super::TemplateError;
use crate::pipeline::cataloging::types::DiscoveryVerdict;

/// Turns a discovery verdict into the instruction pair for extraction.
///
/// A resolver is built per batch run: its cache lives exactly as long as
/// the batch, so an edited template is picked up by the next batch.
pub struct TemplateResolver<'a> {
    store: &'a dyn TemplateStore,
    cache: Mutex<HashMap<(TemplateKind, String), String>>,
}

impl<'a> TemplateResolver<'a> {
    pub fn new(store: &'a dyn TemplateStore) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Look up both instructions; either miss is a `TemplateError::Missing`
    /// naming which table and key.
    pub fn resolve(&self, verdict: &DiscoveryVerdict) -> Result<InstructionPair, TemplateError> {
        let extraction_instruction = self.cached(TemplateKind::Label, &verdict.label, |key| {
            self.store.get_item_template(key)
        })?;
        let formatting_instruction =
            self.cached(TemplateKind::Language, &verdict.language, |key| {
                self.store.get_language_template(key)
            })?;

        tracing::debug!(
            label = %verdict.label,
            language = %verdict.language,
            "Resolved instruction templates"
        );

        Ok(InstructionPair {
            extraction_instruction,
            formatting_instruction,
        })
    }

    /// Number of cached entries (for diagnostics and tests).
    pub fn cached_entries(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Cache-first lookup; `fetch` runs only on a miss.
    fn cached<F>(&self, kind: TemplateKind, key: &str, fetch: F) -> Result<String, TemplateError>
    where
        F: FnOnce(&str) -> Result<String, TemplateError>,
    {
        let cache_key = (kind, key.to_string());
        if let Some(hit) = self
            .cache
            .lock()
            .map_err(|_| TemplateError::LockPoisoned)?
            .get(&cache_key)
        {
            return Ok(hit.clone());
        }

        let text = fetch(key)?;

        self.cache
            .lock()
            .map_err(|_| TemplateError::LockPoisoned)?
            .insert(cache_key, text.clone());
        Ok(text)
    }
}
