//! Raw tag-length-value access to protobuf-encoded records.
//!
//! Everything here works on bytes only. Nothing in this crate knows the
//! record schema; it reads and writes fields by number and wire type so that
//! callers can inspect and rebuild records the canonical decoder refuses.

pub mod field;
pub mod parser;
pub mod varint;
pub mod writer;

pub use field::{Field, RawWireType, WireType};
pub use parser::{
    FieldScanner, MAX_FIELD_NUMBER, count_unique_field_occurrences, encode_field_tag,
    extract_field_value, parse_field_sequence, parse_fields, parse_prefix, read_field_at,
};
pub use varint::{MAX_VARINT_LEN, read_varint, varint_len, write_varint};
pub use writer::FieldWriter;
