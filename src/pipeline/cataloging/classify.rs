use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use super::normalize::{parse_model_json, preview};
use super::prompt::classifier_instruction;
use super::types::{DiscoveryVerdict, ImageArtifact};
use super::{CatalogingError, Stage};
use crate::pipeline::inference::{InferenceClient, InferenceRequest};
use crate::pipeline::templates::Vocabulary;

/// Scout stage: labels an image's category, language and validity.
pub struct Classifier<'a> {
    client: &'a dyn InferenceClient,
    model_id: String,
    timeout: Duration,
}

impl<'a> Classifier<'a> {
    pub fn new(client: &'a dyn InferenceClient, model_id: &str, timeout: Duration) -> Self {
        Self {
            client,
            model_id: model_id.to_string(),
            timeout,
        }
    }

    /// Classify one image against the current vocabulary.
    ///
    /// `is_valid = false` is a successful verdict, not an error.
    pub fn classify(
        &self,
        image: &ImageArtifact,
        vocabulary: &Vocabulary,
    ) -> Result<DiscoveryVerdict, CatalogingError> {
        if vocabulary.is_empty() {
            return Err(CatalogingError::Configuration(format!(
                "vocabulary is incomplete ({})",
                vocabulary.describe()
            )));
        }

        let instruction = classifier_instruction(vocabulary);
        let start = Instant::now();
        let raw = self
            .client
            .generate(&InferenceRequest {
                model_id: &self.model_id,
                image: &image.bytes,
                mime_type: &image.mime_type,
                instruction: &instruction,
                timeout: self.timeout,
            })
            .map_err(|source| CatalogingError::ModelUnavailable {
                stage: Stage::Classification,
                source,
            })?;

        tracing::debug!(
            model = %self.model_id,
            elapsed_ms = %start.elapsed().as_millis(),
            response = %preview(&raw),
            "Scout response received"
        );

        parse_verdict(&raw, vocabulary)
    }
}

/// Parse and validate the scout's JSON answer.
pub fn parse_verdict(
    raw: &str,
    vocabulary: &Vocabulary,
) -> Result<DiscoveryVerdict, CatalogingError> {
    let malformed = |reason: String| CatalogingError::MalformedResponse {
        stage: Stage::Classification,
        reason,
    };

    let value = parse_model_json(raw).map_err(|e| malformed(e.to_string()))?;
    let object = match value {
        Value::Object(map) => map,
        Value::Array(items) => match items.into_iter().next() {
            Some(Value::Object(map)) => map,
            _ => return Err(malformed("expected a JSON object".into())),
        },
        _ => return Err(malformed("expected a JSON object".into())),
    };

    let is_valid = read_bool(&object, "is_valid")
        .ok_or_else(|| malformed("missing or non-boolean 'is_valid'".into()))?;
    let label = read_string(&object, &["label"]).unwrap_or_default();
    let language = read_string(&object, &["lang", "language"]).unwrap_or_default();

    if !is_valid {
        return Ok(DiscoveryVerdict {
            label,
            language,
            is_valid,
        });
    }

    let label = canonical(&vocabulary.labels, &label)
        .ok_or_else(|| malformed(format!("label '{label}' is not a known category")))?;
    let language = canonical(&vocabulary.languages, &language)
        .ok_or_else(|| malformed(format!("language '{language}' is not a known language code")))?;

    Ok(DiscoveryVerdict {
        label,
        language,
        is_valid,
    })
}

fn read_string(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| object.get(*k))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
}

/// Accepts JSON booleans and the strings "true"/"false".
fn read_bool(object: &Map<String, Value>, key: &str) -> Option<bool> {
    match object.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Case-insensitive vocabulary match, returning the stored spelling.
fn canonical<'v>(
    known: impl IntoIterator<Item = &'v String>,
    candidate: &str,
) -> Option<String> {
    known
        .into_iter()
        .find(|k| k.eq_ignore_ascii_case(candidate))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::inference::{InferenceError, MockInferenceClient};

    fn vocab() -> Vocabulary {
        Vocabulary::new(["modern_book", "film_poster"], ["en", "zh", "mi"])
    }

    fn image() -> ImageArtifact {
        ImageArtifact::new("cover.jpg", vec![0xFF, 0xD8, 0xFF])
    }

    #[test]
    fn valid_verdict_is_parsed() {
        let client = MockInferenceClient::new(
            "```json\n{\"label\": \"modern_book\", \"lang\": \"en\", \"is_valid\": true}\n```",
        );
        let classifier = Classifier::new(&client, "scout", Duration::from_secs(5));
        let verdict = classifier.classify(&image(), &vocab()).unwrap();
        assert_eq!(
            verdict,
            DiscoveryVerdict {
                label: "modern_book".into(),
                language: "en".into(),
                is_valid: true,
            }
        );
    }

    #[test]
    fn instruction_enumerates_vocabulary_and_uses_scout_model() {
        let client = MockInferenceClient::new(r#"{"label":"film_poster","lang":"zh","is_valid":true}"#);
        let classifier = Classifier::new(&client, "scout-model", Duration::from_secs(5));
        classifier.classify(&image(), &vocab()).unwrap();

        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model_id, "scout-model");
        assert_eq!(calls[0].mime_type, "image/jpeg");
        assert!(calls[0].instruction.contains("\"film_poster\""));
        assert!(calls[0].instruction.contains("\"mi\""));
    }

    #[test]
    fn empty_vocabulary_fails_without_calling_model() {
        let client = MockInferenceClient::new("{}");
        let classifier = Classifier::new(&client, "scout", Duration::from_secs(5));
        let empty = Vocabulary::new(Vec::<String>::new(), ["en"]);
        let err = classifier.classify(&image(), &empty).unwrap_err();
        assert!(matches!(
            err,
            CatalogingError::Configuration(ref msg) if msg.contains("0 labels, 1 languages")
        ));
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn transport_failure_is_model_unavailable() {
        let client = MockInferenceClient::scripted(vec![Err(InferenceError::Timeout { secs: 5 })]);
        let classifier = Classifier::new(&client, "scout", Duration::from_secs(5));
        let err = classifier.classify(&image(), &vocab()).unwrap_err();
        assert!(matches!(
            err,
            CatalogingError::ModelUnavailable {
                stage: Stage::Classification,
                source: InferenceError::Timeout { secs: 5 },
            }
        ));
    }

    #[test]
    fn garbage_is_malformed_response() {
        let err = parse_verdict("I think it is a book.", &vocab()).unwrap_err();
        assert!(matches!(
            err,
            CatalogingError::MalformedResponse { stage: Stage::Classification, .. }
        ));
    }

    #[test]
    fn invalid_item_is_a_verdict_not_an_error() {
        let verdict =
            parse_verdict(r#"{"label": "selfie", "lang": "en", "is_valid": false}"#, &vocab())
                .unwrap();
        assert!(!verdict.is_valid);
        assert_eq!(verdict.label, "selfie");
    }

    #[test]
    fn unknown_label_on_valid_item_is_malformed() {
        let err = parse_verdict(r#"{"label": "map", "lang": "en", "is_valid": true}"#, &vocab())
            .unwrap_err();
        assert!(err.to_string().contains("'map'"));
    }

    #[test]
    fn unknown_language_on_valid_item_is_malformed() {
        let err = parse_verdict(
            r#"{"label": "modern_book", "lang": "fr", "is_valid": true}"#,
            &vocab(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("'fr'"));
    }

    #[test]
    fn lenient_field_forms() {
        let verdict = parse_verdict(
            r#"{"label": "Modern_Book", "language": "EN", "is_valid": "true"}"#,
            &vocab(),
        )
        .unwrap();
        assert_eq!(verdict.label, "modern_book");
        assert_eq!(verdict.language, "en");
        assert!(verdict.is_valid);
    }

    #[test]
    fn missing_validity_flag_is_malformed() {
        let err = parse_verdict(r#"{"label": "modern_book", "lang": "en"}"#, &vocab()).unwrap_err();
        assert!(err.to_string().contains("is_valid"));
    }
}
