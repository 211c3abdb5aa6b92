use super::record::{build_record, Field, Record};
use super::*;
use crate::pipeline::cataloging::MetadataMapping;

/// Leader positions 05–11: new record, language material, monograph,
/// no control type, UTF-8, indicator count 2, subfield code length 2.
const LEADER_STATUS_TO_CODE_LEN: &str = "nam a22";
/// Leader positions 17–23: encoding level, cataloging form, multipart level,
/// then the fixed entry map.
const LEADER_TAIL: &str = " a 4500";

/// Encode every mapping as one record, in input order.
///
/// An empty sequence encodes to an empty stream. Any error aborts the whole
/// call; no bytes are returned.
pub fn encode<'m, I>(mappings: I) -> Result<Vec<u8>, EncodeError>
where
    I: IntoIterator<Item = &'m MetadataMapping>,
{
    let mut out = Vec::new();
    let mut count = 0usize;
    for (index, mapping) in mappings.into_iter().enumerate() {
        out.extend(encode_record(mapping, index)?);
        count += 1;
    }
    tracing::debug!(records = count, bytes = out.len(), "Encoded record stream");
    Ok(out)
}

/// Encode a single mapping; `index` is only used in error values.
pub fn encode_record(mapping: &MetadataMapping, index: usize) -> Result<Vec<u8>, EncodeError> {
    let record = build_record(mapping, index)?;
    write_record(&record, index)
}

/// Serialize a record: leader, directory, field data, record terminator.
pub fn write_record(record: &Record, index: usize) -> Result<Vec<u8>, EncodeError> {
    let mut directory = Vec::with_capacity(record.len() * DIRECTORY_ENTRY_LEN + 1);
    let mut data = Vec::new();

    for field in record.fields() {
        let bytes = field_bytes(field);
        if bytes.len() > MAX_FIELD_LEN {
            return Err(EncodeError::FieldTooLong {
                record: index,
                tag: field.tag().to_string(),
                length: bytes.len(),
            });
        }
        let start = data.len();
        if start > MAX_RECORD_LEN {
            return Err(EncodeError::RecordTooLong {
                record: index,
                length: LEADER_LEN + start,
            });
        }
        directory.extend_from_slice(
            format!("{}{:04}{:05}", field.tag(), bytes.len(), start).as_bytes(),
        );
        data.extend_from_slice(&bytes);
    }
    directory.push(FIELD_TERMINATOR);

    let base_address = LEADER_LEN + directory.len();
    let record_len = base_address + data.len() + 1;
    if record_len > MAX_RECORD_LEN {
        return Err(EncodeError::RecordTooLong {
            record: index,
            length: record_len,
        });
    }

    let mut out = Vec::with_capacity(record_len);
    out.extend_from_slice(
        format!("{record_len:05}{LEADER_STATUS_TO_CODE_LEN}{base_address:05}{LEADER_TAIL}")
            .as_bytes(),
    );
    out.extend_from_slice(&directory);
    out.extend_from_slice(&data);
    out.push(RECORD_TERMINATOR);
    Ok(out)
}

fn field_bytes(field: &Field) -> Vec<u8> {
    let mut bytes = Vec::new();
    for indicator in field.indicators {
        push_char(&mut bytes, indicator);
    }
    for subfield in &field.subfields {
        bytes.push(SUBFIELD_DELIMITER);
        push_char(&mut bytes, subfield.code);
        bytes.extend_from_slice(subfield.value.as_bytes());
    }
    bytes.push(FIELD_TERMINATOR);
    bytes
}

fn push_char(bytes: &mut Vec<u8>, c: char) {
    let mut buf = [0u8; 4];
    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}
