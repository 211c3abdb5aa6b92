//! MARC 21 records in ISO 2709 transmission format.
//!
//! Only the subset needed to emit flat field/subfield records is supported:
//! a fixed leader, a directory and fields with two indicators and ordered
//! subfields. Every tag, including `001`–`009`, is written in that shape.
//! Each record is self-delimiting, so a multi-record stream is plain
//! concatenation.
//!
//! Encoding is atomic: [`encode`] either returns bytes for every mapping or
//! an error naming the first offending record, never a partial stream.
//! Callers that want to skip bad records use [`encode_record`] per mapping.

pub mod record;
pub mod writer;

pub use record::{build_record, Field, Record, Subfield};
pub use writer::{encode, encode_record, write_record};

use thiserror::Error;

/// Ends every record.
pub const RECORD_TERMINATOR: u8 = 0x1D;
/// Ends the directory and every field.
pub const FIELD_TERMINATOR: u8 = 0x1E;
/// Starts every subfield.
pub const SUBFIELD_DELIMITER: u8 = 0x1F;

pub const LEADER_LEN: usize = 24;
pub const DIRECTORY_ENTRY_LEN: usize = 12;
/// Largest field length a 4-digit directory slot can hold.
pub const MAX_FIELD_LEN: usize = 9_999;
/// Largest record length the 5-digit leader slot can hold.
pub const MAX_RECORD_LEN: usize = 99_999;

/// Indicator used when the input gives none.
pub const BLANK_INDICATOR: char = ' ';
/// Subfield code for scalar values.
pub const DEFAULT_SUBFIELD_CODE: char = 'a';

/// `record` is the 0-based position of the mapping in the input sequence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Record {record}: field {field} has invalid subfield code '{key}' (must be one ASCII character)")]
    InvalidSubfieldCode {
        record: usize,
        field: String,
        key: String,
    },

    #[error("Record {record}: '{key}' is not a valid three-digit tag")]
    InvalidTag { record: usize, key: String },

    #[error("Record {record}: field {field} has invalid indicator '{value}'")]
    InvalidIndicator {
        record: usize,
        field: String,
        value: String,
    },

    #[error("Record {record}: field {tag} is {length} bytes (maximum 9999)")]
    FieldTooLong {
        record: usize,
        tag: String,
        length: usize,
    },

    #[error("Record {record} is {length} bytes (maximum 99999)")]
    RecordTooLong { record: usize, length: usize },
}
