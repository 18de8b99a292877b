//! Append-only writer for rebuilding records field by field.

use crate::field::{Field, WireType};
use crate::varint::{varint_len, write_varint};

/// Builds a record buffer one field at a time.
///
/// The writer performs no ordering or deduplication; callers decide which
/// fields to emit and in what order.
#[derive(Debug, Clone, Default)]
pub struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Append a tag for `number` and `wire_type`.
    pub fn write_tag(&mut self, number: u32, wire_type: WireType) {
        write_varint(
            &mut self.buf,
            (u64::from(number) << 3) | u64::from(wire_type.code()),
        );
    }

    /// Append a varint field.
    pub fn write_varint_field(&mut self, number: u32, value: u64) {
        self.write_tag(number, WireType::Varint);
        write_varint(&mut self.buf, value);
    }

    /// Append a length-delimited field holding `content`.
    pub fn write_bytes_field(&mut self, number: u32, content: &[u8]) {
        self.buf
            .reserve(varint_len(content.len() as u64) + content.len() + 2);
        self.write_tag(number, WireType::LengthDelimited);
        write_varint(&mut self.buf, content.len() as u64);
        self.buf.extend_from_slice(content);
    }

    /// Append an empty length-delimited field: the tag plus a zero length.
    pub fn write_empty_field(&mut self, number: u32) {
        self.write_bytes_field(number, &[]);
    }

    /// Append a field whose payload is already wire-encoded.
    ///
    /// For [`WireType::LengthDelimited`], `data` must include the length
    /// prefix, matching [`Field::data`].
    pub fn write_raw_field(&mut self, number: u32, wire_type: WireType, data: &[u8]) {
        self.write_tag(number, wire_type);
        self.buf.extend_from_slice(data);
    }

    /// Re-emit a parsed field under its own number.
    pub fn write_field(&mut self, field: &Field) {
        self.write_raw_field(field.number, field.wire_type, &field.data);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the writer and return the encoded bytes.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}
