//! Wire types and the raw field value produced by the parser.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::varint::read_varint;

/// How the payload following a tag is sized.
///
/// Only the four wire types records actually use are representable. Group
/// codes (3, 4) and the reserved codes (6, 7) are surfaced through
/// [`RawWireType`] and rejected by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WireType {
    /// Base-128 varint payload.
    Varint,
    /// Exactly eight bytes.
    Fixed64,
    /// Varint length prefix followed by that many bytes.
    LengthDelimited,
    /// Exactly four bytes.
    Fixed32,
}

/// Classification of the low three bits of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawWireType {
    /// A wire type records use.
    Known(WireType),
    /// Deprecated group start/end (3, 4).
    Group(u8),
    /// Reserved code (6, 7); its presence is a corruption signal.
    Invalid(u8),
}

impl WireType {
    /// Numeric code stored in the low three bits of a tag.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Varint => 0,
            Self::Fixed64 => 1,
            Self::LengthDelimited => 2,
            Self::Fixed32 => 5,
        }
    }

    /// Classify a three-bit wire type code.
    #[must_use]
    pub const fn classify(raw: u8) -> RawWireType {
        match raw & 0x7 {
            0 => RawWireType::Known(Self::Varint),
            1 => RawWireType::Known(Self::Fixed64),
            2 => RawWireType::Known(Self::LengthDelimited),
            5 => RawWireType::Known(Self::Fixed32),
            code @ (3 | 4) => RawWireType::Group(code),
            code => RawWireType::Invalid(code),
        }
    }

    /// Payload width for the fixed-size wire types.
    #[must_use]
    pub const fn fixed_len(self) -> Option<usize> {
        match self {
            Self::Fixed64 => Some(8),
            Self::Fixed32 => Some(4),
            Self::Varint | Self::LengthDelimited => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Varint => "Varint",
            Self::Fixed64 => "Fixed64",
            Self::LengthDelimited => "LengthDelimited",
            Self::Fixed32 => "Fixed32",
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One physical field read from a record buffer.
///
/// `data` holds the payload exactly as it appeared on the wire: for
/// [`WireType::LengthDelimited`] that is the length varint followed by the
/// content; for the other wire types it is just the value bytes. `offset` is
/// the position of the tag and `length` spans tag plus payload, so
/// `offset + length` never exceeds the source buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub number: u32,
    pub wire_type: WireType,
    pub data: Vec<u8>,
    pub offset: usize,
    pub length: usize,
}

impl Field {
    /// Field content with any length prefix stripped.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        match self.wire_type {
            WireType::LengthDelimited => match read_varint(&self.data) {
                Some((_, prefix)) => &self.data[prefix..],
                None => &self.data,
            },
            WireType::Varint | WireType::Fixed64 | WireType::Fixed32 => &self.data,
        }
    }

    /// Decoded value of a varint field.
    #[must_use]
    pub fn varint_value(&self) -> Option<u64> {
        match self.wire_type {
            WireType::Varint => read_varint(&self.data).map(|(value, _)| value),
            _ => None,
        }
    }

    /// Whether the field carries no content (an empty length-delimited value).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload().is_empty()
    }

    /// Offset one past the last byte of this field in the source buffer.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_all_codes() {
        assert_eq!(WireType::classify(0), RawWireType::Known(WireType::Varint));
        assert_eq!(WireType::classify(1), RawWireType::Known(WireType::Fixed64));
        assert_eq!(
            WireType::classify(2),
            RawWireType::Known(WireType::LengthDelimited)
        );
        assert_eq!(WireType::classify(3), RawWireType::Group(3));
        assert_eq!(WireType::classify(4), RawWireType::Group(4));
        assert_eq!(WireType::classify(5), RawWireType::Known(WireType::Fixed32));
        assert_eq!(WireType::classify(6), RawWireType::Invalid(6));
        assert_eq!(WireType::classify(7), RawWireType::Invalid(7));
    }

    #[test]
    fn code_roundtrips_through_classify() {
        for wt in [
            WireType::Varint,
            WireType::Fixed64,
            WireType::LengthDelimited,
            WireType::Fixed32,
        ] {
            assert_eq!(WireType::classify(wt.code()), RawWireType::Known(wt));
        }
    }

    #[test]
    fn payload_strips_length_prefix() {
        let field = Field {
            number: 2,
            wire_type: WireType::LengthDelimited,
            data: vec![0x03, b'a', b'b', b'c'],
            offset: 0,
            length: 5,
        };
        assert_eq!(field.payload(), b"abc");
        assert!(!field.is_empty());
        assert_eq!(field.end(), 5);
    }

    #[test]
    fn empty_length_delimited_is_empty() {
        let field = Field {
            number: 7,
            wire_type: WireType::LengthDelimited,
            data: vec![0x00],
            offset: 4,
            length: 2,
        };
        assert!(field.is_empty());
        assert_eq!(field.varint_value(), None);
    }

    #[test]
    fn varint_value_decodes() {
        let field = Field {
            number: 1,
            wire_type: WireType::Varint,
            data: vec![0xAC, 0x02],
            offset: 0,
            length: 3,
        };
        assert_eq!(field.varint_value(), Some(300));
        assert_eq!(field.payload(), &[0xAC, 0x02]);
    }
}
