//! Lenient parsing of model output into a [`MetadataMapping`].
//!
//! Models wrap JSON in Markdown fences, prepend prose, or answer with a list
//! of candidates. Parsing distinguishes two failures:
//! - the text contains no parseable JSON ([`NormalizationError::Unparseable`]);
//! - it parses, but not into a usable mapping ([`NormalizationError::NotAnObject`],
//!   [`NormalizationError::EmptyList`]).

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use super::types::MetadataMapping;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("Response is not parseable JSON: {0}")]
    Unparseable(String),

    #[error("Response JSON is a {0}, expected an object")]
    NotAnObject(&'static str),

    #[error("Response JSON is an empty list")]
    EmptyList,
}

/// Output of a successful normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub mapping: MetadataMapping,
    /// Entries dropped because the model answered with a list and only the
    /// first element is kept.
    pub discarded_entries: usize,
}

/// Remove Markdown code fences (```` ``` ```` with or without a language tag).
pub fn strip_code_fences(text: &str) -> String {
    static FENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_-]*").expect("valid regex"));
    FENCE_RE.replace_all(text, "").trim().to_string()
}

/// Parse model text into a JSON value, tolerating fences and surrounding prose.
pub fn parse_model_json(raw: &str) -> Result<Value, NormalizationError> {
    let stripped = strip_code_fences(raw);
    if stripped.is_empty() {
        return Err(NormalizationError::Unparseable("empty response".into()));
    }

    match serde_json::from_str::<Value>(&stripped) {
        Ok(value) => Ok(value),
        Err(first_error) => {
            // Prose before/after the payload: retry on the object span, then the list span.
            [('{', '}'), ('[', ']')]
                .into_iter()
                .filter_map(|(open, close)| json_span(&stripped, open, close))
                .find_map(|span| serde_json::from_str::<Value>(span).ok())
                .ok_or_else(|| NormalizationError::Unparseable(first_error.to_string()))
        }
    }
}

/// The text between the first `open` and the last `close`.
fn json_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (start < end).then(|| &text[start..=end])
}

/// Take the object out of a parsed value.
///
/// A list answer keeps its first element; how many were dropped is returned
/// so callers can surface it.
pub fn object_from_value(value: Value) -> Result<Normalized, NormalizationError> {
    match value {
        Value::Object(map) => Ok(Normalized {
            mapping: MetadataMapping::from_json_object(&map),
            discarded_entries: 0,
        }),
        Value::Array(items) => {
            let total = items.len();
            match items.into_iter().next() {
                None => Err(NormalizationError::EmptyList),
                Some(Value::Object(map)) => Ok(Normalized {
                    mapping: MetadataMapping::from_json_object(&map),
                    discarded_entries: total - 1,
                }),
                Some(other) => Err(NormalizationError::NotAnObject(json_type_name(&other))),
            }
        }
        other => Err(NormalizationError::NotAnObject(json_type_name(&other))),
    }
}

/// Parse raw extractor text, reporting failures as errors.
pub fn try_normalize(raw: &str) -> Result<Normalized, NormalizationError> {
    let normalized = object_from_value(parse_model_json(raw)?)?;
    if normalized.discarded_entries > 0 {
        tracing::warn!(
            discarded = normalized.discarded_entries,
            "Model returned a list; keeping the first entry only"
        );
    }
    Ok(normalized)
}

/// Parse raw extractor text; never fails.
///
/// On failure the mapping holds a single `error` entry, which the
/// orchestrator treats as a failed item.
pub fn normalize(raw: &str) -> Normalized {
    match try_normalize(raw) {
        Ok(normalized) => normalized,
        Err(e) => {
            tracing::debug!(error = %e, preview = %preview(raw), "Normalization failed");
            Normalized {
                mapping: MetadataMapping::error_marker(&e.to_string()),
                discarded_entries: 0,
            }
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// First 120 characters, for debug logs.
pub(crate) fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(120).collect();
    if text.chars().count() > 120 {
        out.push_str("...");
    }
    out
}
