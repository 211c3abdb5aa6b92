use super::{EncodeError, BLANK_INDICATOR, DEFAULT_SUBFIELD_CODE};
use crate::pipeline::cataloging::{FieldValue, MetadataMapping};

/// Reserved keys inside a field object that set indicators instead of
/// producing subfields.
const IND1_KEY: &str = "ind1";
const IND2_KEY: &str = "ind2";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subfield {
    pub code: char,
    pub value: String,
}

/// One variable field of a record: a tag, two indicators and ordered
/// subfields. Every field carries both indicator bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub tag: String,
    pub indicators: [char; 2],
    pub subfields: Vec<Subfield>,
}

impl Field {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn subfields(&self) -> &[Subfield] {
        &self.subfields
    }
}

/// Ordered fields of one catalog record. A record with no fields is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<Field>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Build the record for one mapping.
///
/// Only numeric keys become fields, in mapping order. `record` is the
/// mapping's position in the batch and is used in error values.
pub fn build_record(mapping: &MetadataMapping, record: usize) -> Result<Record, EncodeError> {
    let mut out = Record::new();
    for (key, value) in mapping.catalog_entries() {
        let tag = normalize_tag(key, record)?;
        push_fields(&mut out, &tag, value, record)?;
    }
    Ok(out)
}

fn push_fields(
    out: &mut Record,
    tag: &str,
    value: &FieldValue,
    record: usize,
) -> Result<(), EncodeError> {
    match value {
        FieldValue::Repeated(values) => {
            for value in values {
                push_fields(out, tag, value, record)?;
            }
        }
        FieldValue::Text(text) => out.push(Field {
            tag: tag.to_string(),
            indicators: [BLANK_INDICATOR; 2],
            subfields: vec![Subfield {
                code: DEFAULT_SUBFIELD_CODE,
                value: clean(text),
            }],
        }),
        FieldValue::Subfields(pairs) => match data_field(tag, pairs, record)? {
            Some(field) => out.push(field),
            None => tracing::debug!(tag, record, "Skipping field without subfields"),
        },
    }
    Ok(())
}

/// `None` when the object holds no subfields (empty, or indicators only).
fn data_field(
    tag: &str,
    pairs: &[(String, String)],
    record: usize,
) -> Result<Option<Field>, EncodeError> {
    let mut indicators = [BLANK_INDICATOR; 2];
    let mut subfields = Vec::with_capacity(pairs.len());

    for (key, value) in pairs {
        match key.as_str() {
            IND1_KEY => indicators[0] = indicator(value, tag, record)?,
            IND2_KEY => indicators[1] = indicator(value, tag, record)?,
            _ => subfields.push(Subfield {
                code: subfield_code(key, tag, record)?,
                value: clean(value),
            }),
        }
    }

    if subfields.is_empty() {
        return Ok(None);
    }
    Ok(Some(Field {
        tag: tag.to_string(),
        indicators,
        subfields,
    }))
}

/// Left-pad short numeric keys to three digits; longer keys are invalid.
fn normalize_tag(key: &str, record: usize) -> Result<String, EncodeError> {
    if key.len() > 3 {
        return Err(EncodeError::InvalidTag {
            record,
            key: key.to_string(),
        });
    }
    Ok(format!("{key:0>3}"))
}

fn subfield_code(key: &str, tag: &str, record: usize) -> Result<char, EncodeError> {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_graphic() => Ok(c),
        _ => Err(EncodeError::InvalidSubfieldCode {
            record,
            field: tag.to_string(),
            key: key.to_string(),
        }),
    }
}

/// An empty indicator value means blank.
fn indicator(value: &str, tag: &str, record: usize) -> Result<char, EncodeError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (None, _) => Ok(BLANK_INDICATOR),
        (Some(c), None) if c.is_ascii_graphic() || c == ' ' => Ok(c),
        _ => Err(EncodeError::InvalidIndicator {
            record,
            field: tag.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Drop structural delimiter bytes from field data.
fn clean(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '\u{1D}' | '\u{1E}' | '\u{1F}'))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn mapping(value: Value) -> MetadataMapping {
        MetadataMapping::from_json_object(value.as_object().unwrap())
    }

    fn sf(code: char, value: &str) -> Subfield {
        Subfield {
            code,
            value: value.into(),
        }
    }

    #[test]
    fn nested_mapping_keeps_subfield_order() {
        let record = build_record(
            &mapping(json!({"245": {"a": "The Great Gatsby", "c": "F. Scott Fitzgerald"}})),
            0,
        )
        .unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record.fields()[0].tag(), "245");
        assert_eq!(
            record.fields()[0].subfields(),
            &[sf('a', "The Great Gatsby"), sf('c', "F. Scott Fitzgerald")]
        );
    }

    #[test]
    fn scalar_becomes_subfield_a_with_blank_indicators() {
        let record = build_record(&mapping(json!({"245": "Tess"})), 0).unwrap();
        assert_eq!(
            record.fields()[0],
            Field {
                tag: "245".into(),
                indicators: [' ', ' '],
                subfields: vec![sf('a', "Tess")],
            }
        );
    }

    #[test]
    fn non_numeric_keys_are_excluded() {
        let record = build_record(
            &mapping(json!({"title": "T", "scout_engine": "m", "245a": "x"})),
            0,
        )
        .unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn field_order_is_input_order() {
        let record =
            build_record(&mapping(json!({"650": "Jazz", "245": "T", "100": "A"})), 0).unwrap();
        let tags: Vec<&str> = record.fields().iter().map(Field::tag).collect();
        assert_eq!(tags, vec!["650", "245", "100"]);
    }

    #[test]
    fn low_tags_keep_indicators_and_subfield_a() {
        let record = build_record(&mapping(json!({"001": "ocm123", "008": 1925})), 0).unwrap();
        assert_eq!(
            record.fields()[1],
            Field {
                tag: "008".into(),
                indicators: [' ', ' '],
                subfields: vec![sf('a', "1925")],
            }
        );
        assert_eq!(record.fields()[0].subfields(), &[sf('a', "ocm123")]);
    }

    #[test]
    fn objects_without_subfields_add_no_field() {
        let record = build_record(
            &mapping(json!({"245": {}, "100": {"a": null}, "250": {"ind1": "1"}})),
            0,
        )
        .unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn short_tags_are_zero_padded() {
        let record = build_record(&mapping(json!({"20": "9780743273565"})), 0).unwrap();
        assert_eq!(record.fields()[0].tag(), "020");
    }

    #[test]
    fn long_numeric_key_is_invalid_tag() {
        let err = build_record(&mapping(json!({"2450": "T"})), 4).unwrap_err();
        assert_eq!(
            err,
            EncodeError::InvalidTag {
                record: 4,
                key: "2450".into()
            }
        );
    }

    #[test]
    fn two_character_code_is_rejected() {
        let err = build_record(&mapping(json!({"245": {"a": "T", "ab": "x"}})), 1).unwrap_err();
        assert_eq!(
            err,
            EncodeError::InvalidSubfieldCode {
                record: 1,
                field: "245".into(),
                key: "ab".into()
            }
        );
    }

    #[test]
    fn non_ascii_code_is_rejected() {
        let err = build_record(&mapping(json!({"245": {"é": "T"}})), 0).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidSubfieldCode { .. }));
    }

    #[test]
    fn indicators_from_reserved_keys() {
        let record = build_record(
            &mapping(json!({"245": {"ind1": "1", "ind2": "4", "a": "The Great Gatsby"}})),
            0,
        )
        .unwrap();
        let field = &record.fields()[0];
        assert_eq!(field.indicators, ['1', '4']);
        assert_eq!(field.subfields.len(), 1);
    }

    #[test]
    fn multi_character_indicator_is_rejected() {
        let err = build_record(&mapping(json!({"245": {"ind1": "10", "a": "T"}})), 0).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidIndicator { ref value, .. } if value == "10"));
    }

    #[test]
    fn arrays_repeat_the_field() {
        let record = build_record(
            &mapping(json!({"700": ["Perkins, Maxwell", {"a": "Lardner, Ring", "e": "editor"}]})),
            0,
        )
        .unwrap();
        assert_eq!(record.len(), 2);
        assert!(record.fields().iter().all(|f| f.tag() == "700"));
        assert_eq!(record.fields()[1].subfields().len(), 2);
    }

    #[test]
    fn delimiter_bytes_are_stripped() {
        let record = build_record(&mapping(json!({"245": "Bad\u{1E}Title\u{1F}x"})), 0).unwrap();
        assert_eq!(record.fields()[0].subfields()[0].value, "BadTitlex");
    }
}
