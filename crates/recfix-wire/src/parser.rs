//! Field-by-field parsing of a flat record buffer.
//!
//! The parser walks the buffer tag by tag and never interprets payloads
//! beyond sizing them, so it can describe records the canonical decoder
//! rejects (for example a nested message slot holding a plain string).
//!
//! Two views of the same walk are exposed on purpose:
//!
//! - [`parse_fields`] keys fields by number with last-parsed-wins, which is
//!   the value a decoder would observe;
//! - [`count_unique_field_occurrences`] counts every physical field, so a
//!   mismatch between the two reveals duplicated field numbers.

use std::collections::BTreeMap;

use recfix_error::{RepairError, Result};

use crate::field::{Field, RawWireType, WireType};
use crate::varint::{read_varint, varint_ran_out, write_varint};

/// Largest field number the wire format can express (29 bits).
pub const MAX_FIELD_NUMBER: u64 = (1 << 29) - 1;

/// Read the single field whose tag starts at `offset`.
///
/// # Errors
///
/// Returns a parse error ([`RepairError::TagRead`],
/// [`RepairError::InvalidWireType`], [`RepairError::UnsupportedWireType`],
/// [`RepairError::InvalidFieldNumber`], [`RepairError::LengthRead`] or
/// [`RepairError::UnexpectedEof`]) describing the first problem found.
pub fn read_field_at(buf: &[u8], offset: usize) -> Result<Field> {
    let rest = buf.get(offset..).unwrap_or_default();
    let (tag, tag_len) = read_varint(rest).ok_or(RepairError::TagRead { offset })?;

    let raw_number = tag >> 3;
    #[allow(clippy::cast_possible_truncation)]
    let raw_wire = (tag & 0x7) as u8;

    let wire_type = match WireType::classify(raw_wire) {
        RawWireType::Known(wire_type) => wire_type,
        RawWireType::Invalid(code) => {
            return Err(RepairError::InvalidWireType {
                field: raw_number,
                wire_type: code,
                offset,
            });
        }
        RawWireType::Group(code) => {
            return Err(RepairError::UnsupportedWireType {
                field: raw_number,
                wire_type: code,
                offset,
            });
        }
    };

    let number = match u32::try_from(raw_number) {
        Ok(n) if n != 0 && raw_number <= MAX_FIELD_NUMBER => n,
        _ => {
            return Err(RepairError::InvalidFieldNumber {
                field: raw_number,
                offset,
            });
        }
    };

    let body_start = offset + tag_len;
    let body = &buf[body_start..];
    let eof = |needed: usize| RepairError::UnexpectedEof {
        field: number,
        offset: body_start,
        needed,
        available: body.len(),
    };

    let payload_len = match wire_type {
        WireType::Varint => match read_varint(body) {
            Some((_, consumed)) => consumed,
            None if varint_ran_out(body) => return Err(eof(body.len() + 1)),
            None => {
                return Err(RepairError::LengthRead {
                    field: number,
                    offset: body_start,
                });
            }
        },
        WireType::Fixed64 | WireType::Fixed32 => {
            let width = wire_type.fixed_len().unwrap_or_default();
            if body.len() < width {
                return Err(eof(width));
            }
            width
        }
        WireType::LengthDelimited => {
            let (content_len, prefix_len) = read_varint(body).ok_or(RepairError::LengthRead {
                field: number,
                offset: body_start,
            })?;
            let total = usize::try_from(content_len)
                .ok()
                .and_then(|len| len.checked_add(prefix_len))
                .ok_or_else(|| eof(usize::MAX))?;
            if body.len() < total {
                return Err(eof(total));
            }
            total
        }
    };

    Ok(Field {
        number,
        wire_type,
        data: body[..payload_len].to_vec(),
        offset,
        length: tag_len + payload_len,
    })
}

/// Iterator over the physical fields of a buffer, in order.
///
/// Yields `Err` once for the first unreadable field and then stops.
#[derive(Debug, Clone)]
pub struct FieldScanner<'a> {
    buf: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> FieldScanner<'a> {
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            failed: false,
        }
    }

    /// Offset of the next unread byte.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }
}

impl Iterator for FieldScanner<'_> {
    type Item = Result<Field>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.buf.len() {
            return None;
        }
        match read_field_at(self.buf, self.offset) {
            Ok(field) => {
                self.offset = field.end();
                Some(Ok(field))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Parse a buffer into fields keyed by field number.
///
/// When a field number recurs, the last occurrence wins. Empty input yields
/// an empty map.
///
/// # Errors
///
/// Returns the parse error of the first unreadable field.
pub fn parse_fields(buf: &[u8]) -> Result<BTreeMap<u32, Field>> {
    let mut fields = BTreeMap::new();
    for field in FieldScanner::new(buf) {
        let field = field?;
        fields.insert(field.number, field);
    }
    Ok(fields)
}

/// Count every physical field in the buffer, duplicates included.
///
/// For a buffer without repeated field numbers this equals
/// `parse_fields(buf)?.len()`.
///
/// # Errors
///
/// Returns the parse error of the first unreadable field.
pub fn count_unique_field_occurrences(buf: &[u8]) -> Result<usize> {
    let mut occurrences: BTreeMap<u32, usize> = BTreeMap::new();
    for field in FieldScanner::new(buf) {
        *occurrences.entry(field?.number).or_default() += 1;
    }
    Ok(occurrences.values().sum())
}

/// Parse a buffer into its physical field sequence.
///
/// # Errors
///
/// Returns the parse error of the first unreadable field.
pub fn parse_field_sequence(buf: &[u8]) -> Result<Vec<Field>> {
    FieldScanner::new(buf).collect()
}

/// Parse as many leading fields as possible.
///
/// Returns the readable prefix and, if the walk stopped early, the error
/// that stopped it. Everything from the failing field onward is dropped.
pub fn parse_prefix(buf: &[u8]) -> (Vec<Field>, Option<RepairError>) {
    let mut fields = Vec::new();
    for field in FieldScanner::new(buf) {
        match field {
            Ok(field) => fields.push(field),
            Err(err) => return (fields, Some(err)),
        }
    }
    (fields, None)
}

/// Encode a field tag: the varint of `(number << 3) | wire_type`.
#[must_use]
pub fn encode_field_tag(number: u32, wire_type: WireType) -> Vec<u8> {
    let mut buf = Vec::with_capacity(5);
    write_varint(
        &mut buf,
        (u64::from(number) << 3) | u64::from(wire_type.code()),
    );
    buf
}

/// Extract the value of field `number`.
///
/// Length-delimited values come back without their length prefix; other wire
/// types return the raw payload bytes. Returns `Ok(None)` when the field is
/// absent.
///
/// # Errors
///
/// Returns the parse error if the buffer cannot be parsed.
pub fn extract_field_value(buf: &[u8], number: u32) -> Result<Option<Vec<u8>>> {
    let fields = parse_fields(buf)?;
    Ok(fields.get(&number).map(|field| field.payload().to_vec()))
}
