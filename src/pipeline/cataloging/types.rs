use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Key under which a failed item carries its error message.
pub const ERROR_KEY: &str = "error";

/// Fallback when the display name gives no usable MIME type.
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

// ═══════════════════════════════════════════
// Image artifact
// ═══════════════════════════════════════════

/// Captured image bytes plus a display name. Never persisted by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    pub name: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageArtifact {
    /// Infers the MIME type from the display name's extension.
    pub fn new(name: &str, bytes: Vec<u8>) -> Self {
        let mime_type = mime_guess::from_path(name)
            .first()
            .filter(|m| m.type_().as_str() == "image")
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());

        Self {
            name: name.to_string(),
            bytes,
            mime_type,
        }
    }

    pub fn with_mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = mime_type.to_string();
        self
    }
}

// ═══════════════════════════════════════════
// Discovery verdict (classifier output)
// ═══════════════════════════════════════════

/// Category, language and validity of one image, as judged by the scout model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryVerdict {
    pub label: String,
    pub language: String,
    pub is_valid: bool,
}

// ═══════════════════════════════════════════
// Metadata mapping (normalizer output)
// ═══════════════════════════════════════════

/// Value of one metadata entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Scalar value, written as a single `$a` subfield.
    Text(String),
    /// Ordered `(code, value)` pairs; codes may repeat.
    Subfields(Vec<(String, String)>),
    /// The same tag occurring several times.
    Repeated(Vec<FieldValue>),
}

impl FieldValue {
    /// Convert a JSON value. `null` and empty containers yield `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Array(items) => {
                let values: Vec<FieldValue> = items
                    .iter()
                    .filter_map(|item| match item {
                        // Nested arrays have no record-level meaning: keep them as text.
                        Value::Array(_) => Some(FieldValue::Text(item.to_string())),
                        other => FieldValue::from_json(other),
                    })
                    .collect();
                if values.is_empty() {
                    None
                } else {
                    Some(FieldValue::Repeated(values))
                }
            }
            Value::Object(map) => {
                let mut subfields = Vec::with_capacity(map.len());
                for (code, inner) in map {
                    match inner {
                        Value::Array(items) => {
                            for item in items {
                                if let Some(text) = scalar_text(item) {
                                    subfields.push((code.clone(), text));
                                }
                            }
                        }
                        other => {
                            if let Some(text) = scalar_text(other) {
                                subfields.push((code.clone(), text));
                            }
                        }
                    }
                }
                if subfields.is_empty() {
                    None
                } else {
                    Some(FieldValue::Subfields(subfields))
                }
            }
            scalar => scalar_text(scalar).map(FieldValue::Text),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Text rendering of a leaf JSON value. Objects are kept as compact JSON.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(text) => serializer.serialize_str(text),
            Self::Subfields(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (code, value) in pairs {
                    map.serialize_entry(code, value)?;
                }
                map.end()
            }
            Self::Repeated(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
        }
    }
}

/// Ordered `(key, value)` metadata for one item.
///
/// Purely numeric keys are catalog tags; any other key is auxiliary data
/// (shown to users, never encoded). An `error` key marks a failed item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataMapping {
    entries: Vec<(String, FieldValue)>,
}

impl MetadataMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mapping that carries only an error marker.
    pub fn error_marker(message: &str) -> Self {
        let mut mapping = Self::new();
        mapping.insert(ERROR_KEY, FieldValue::Text(message.to_string()));
        mapping
    }

    /// Build from a JSON object, preserving key order.
    pub fn from_json_object(object: &Map<String, Value>) -> Self {
        let mut mapping = Self::new();
        for (key, value) in object {
            match FieldValue::from_json(value) {
                Some(field) => mapping.insert(key, field),
                None => tracing::debug!(key = %key, "Dropping empty metadata value"),
            }
        }
        mapping
    }

    /// Insert or replace; a replaced key keeps its original position.
    pub fn insert(&mut self, key: &str, value: FieldValue) {
        match self.entries.iter_mut().find(|(k, _)| k.as_str() == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries.iter().find(|(k, _)| k.as_str() == key).map(|(_, v)| v)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The error marker, if this mapping stands in for a failed item.
    pub fn error(&self) -> Option<&str> {
        self.get(ERROR_KEY).and_then(FieldValue::as_text)
    }

    /// Entries whose key is a catalog tag, in original order.
    pub fn catalog_entries(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries().filter(|(k, _)| is_catalog_key(k))
    }
}

/// A key is a catalog tag when it is a non-empty string of ASCII digits.
pub fn is_catalog_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}

impl Serialize for MetadataMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn mapping(value: Value) -> MetadataMapping {
        MetadataMapping::from_json_object(value.as_object().unwrap())
    }

    #[test]
    fn mime_type_inferred_from_name() {
        assert_eq!(ImageArtifact::new("cover.png", vec![]).mime_type, "image/png");
        assert_eq!(ImageArtifact::new("scan.JPG", vec![]).mime_type, "image/jpeg");
        assert_eq!(ImageArtifact::new("photo", vec![]).mime_type, DEFAULT_IMAGE_MIME);
        assert_eq!(ImageArtifact::new("notes.txt", vec![]).mime_type, DEFAULT_IMAGE_MIME);
    }

    #[test]
    fn json_object_keeps_key_order() {
        let m = mapping(json!({"245": "Title", "100": "Author", "notes": "x"}));
        let keys: Vec<&str> = m.keys().collect();
        assert_eq!(keys, vec!["245", "100", "notes"]);
    }

    #[test]
    fn nested_object_becomes_subfields() {
        let m = mapping(json!({"245": {"a": "The Great Gatsby", "c": "F. Scott Fitzgerald"}}));
        assert_eq!(
            m.get("245"),
            Some(&FieldValue::Subfields(vec![
                ("a".into(), "The Great Gatsby".into()),
                ("c".into(), "F. Scott Fitzgerald".into()),
            ]))
        );
    }

    #[test]
    fn subfield_arrays_repeat_code() {
        let m = mapping(json!({"650": {"a": ["Fiction", "Jazz Age"]}}));
        assert_eq!(
            m.get("650"),
            Some(&FieldValue::Subfields(vec![
                ("a".into(), "Fiction".into()),
                ("a".into(), "Jazz Age".into()),
            ]))
        );
    }

    #[test]
    fn tag_arrays_become_repeated_fields() {
        let m = mapping(json!({"700": ["Perkins, Maxwell", {"a": "Lardner, Ring"}]}));
        match m.get("700") {
            Some(FieldValue::Repeated(values)) => assert_eq!(values.len(), 2),
            other => panic!("expected Repeated, got {other:?}"),
        }
    }

    #[test]
    fn scalars_and_nulls() {
        let m = mapping(json!({"008": 1925, "flag": true, "empty": null, "list": []}));
        assert_eq!(m.get("008"), Some(&FieldValue::Text("1925".into())));
        assert_eq!(m.get("flag"), Some(&FieldValue::Text("true".into())));
        assert!(m.get("empty").is_none());
        assert!(m.get("list").is_none());
    }

    #[test]
    fn objects_without_values_are_dropped() {
        assert_eq!(FieldValue::from_json(&json!({})), None);
        assert_eq!(FieldValue::from_json(&json!({"a": null, "b": []})), None);
        let m = mapping(json!({"245": {}, "100": "Hardy"}));
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["100"]);
    }

    #[test]
    fn error_marker_is_detected() {
        let m = MetadataMapping::error_marker("Invalid library item");
        assert_eq!(m.error(), Some("Invalid library item"));
        assert!(MetadataMapping::new().error().is_none());
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut m = mapping(json!({"245": "A", "100": "B"}));
        m.insert("245", FieldValue::Text("C".into()));
        let keys: Vec<&str> = m.keys().collect();
        assert_eq!(keys, vec!["245", "100"]);
        assert_eq!(m.get("245").and_then(FieldValue::as_text), Some("C"));
    }

    #[test]
    fn catalog_keys_are_numeric_only() {
        assert!(is_catalog_key("245"));
        assert!(is_catalog_key("20"));
        assert!(!is_catalog_key("245a"));
        assert!(!is_catalog_key("title"));
        assert!(!is_catalog_key(""));
        let m = mapping(json!({"245": "T", "scout_engine": "m", "020": "978"}));
        let tags: Vec<&str> = m.catalog_entries().map(|(k, _)| k).collect();
        assert_eq!(tags, vec!["245", "020"]);
    }

    #[test]
    fn serializes_back_to_json_in_order() {
        let source = json!({"245": {"a": "T", "c": "R"}, "700": ["X", "Y"], "note": "n"});
        let m = mapping(source.clone());
        assert_eq!(serde_json::to_value(&m).unwrap(), source);
        let text = serde_json::to_string(&m).unwrap();
        assert!(text.starts_with("{\"245\""));
    }
}
