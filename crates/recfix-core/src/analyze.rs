//! Corruption classification for records the canonical decoder rejects.
//!
//! Classification runs in three tiers, stopping at the first that answers:
//!
//! 1. substrings of the canonical decoder's error text;
//! 2. the raw field parser's error, when the parser also fails;
//! 3. structural checks on the parsed fields (required identity fields,
//!    duplicated field numbers).

use std::fmt;

use recfix_error::RepairError;
use recfix_wire::{Field, count_unique_field_occurrences, parse_fields};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::RecordCodec;
use crate::config::RepairConfig;
use crate::detect::{ContractState, SchemaPresence};
use crate::{Repairer, key_hex};

const COMPONENT: &str = "analyze";

const STRATEGY_HEALTHY: &str = "no fix needed - already healthy";
const STRATEGY_FUNCTIONAL: &str = "no fix needed - already functional";
const STRATEGY_SEVERE: &str = "severe corruption - cannot parse fields";

/// Why a record fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CorruptionPattern {
    /// No known signature matched.
    Unknown,
    /// A reserved wire type (6/7) appears, usually from the F7/F8 swap.
    InvalidWireType,
    /// A field payload runs past the end of the buffer.
    TruncatedField,
    /// A length prefix or varint payload cannot be read.
    MalformedLength,
    /// A tag decodes to an impossible field number.
    FieldNumberCorruption,
    /// Required identity fields are absent.
    MissingRequiredFields,
    /// A field number occurs more than once.
    DuplicateFields,
}

impl CorruptionPattern {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::InvalidWireType => "InvalidWireType",
            Self::TruncatedField => "TruncatedField",
            Self::MalformedLength => "MalformedLength",
            Self::FieldNumberCorruption => "FieldNumberCorruption",
            Self::MissingRequiredFields => "MissingRequiredFields",
            Self::DuplicateFields => "DuplicateFields",
        }
    }

    /// Whether the pattern is repaired automatically absent caller policy.
    #[must_use]
    pub const fn default_fixable(self) -> bool {
        match self {
            Self::InvalidWireType
            | Self::TruncatedField
            | Self::MalformedLength
            | Self::FieldNumberCorruption
            | Self::DuplicateFields => true,
            Self::MissingRequiredFields | Self::Unknown => false,
        }
    }

    /// Human-readable repair strategy.
    #[must_use]
    pub const fn strategy(self) -> &'static str {
        match self {
            Self::InvalidWireType => {
                "move F7 payload into F8, emit empty F7, rebuild fields in ascending order"
            }
            Self::TruncatedField => "salvage the readable prefix and drop the truncated tail",
            Self::MalformedLength => "salvage fields before the malformed length prefix",
            Self::FieldNumberCorruption => "byte-scan recovery of readable fields",
            Self::DuplicateFields => "keep the first occurrence of each field number",
            Self::MissingRequiredFields => {
                "manual intervention required - identity fields missing"
            }
            Self::Unknown => "no automatic strategy for unrecognized corruption",
        }
    }

    /// Apply caller policy overrides to the default fixability.
    #[must_use]
    pub fn fixable_under(self, config: &RepairConfig) -> bool {
        match self {
            Self::MissingRequiredFields => config.treat_missing_required_as_fixable,
            Self::Unknown => config.treat_unknown_as_fixable,
            Self::InvalidWireType
            | Self::TruncatedField
            | Self::MalformedLength
            | Self::FieldNumberCorruption
            | Self::DuplicateFields => self.default_fixable(),
        }
    }
}

impl fmt::Display for CorruptionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-record diagnostic bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordAnalysis<R> {
    pub key: Vec<u8>,
    pub state: ContractState,
    /// `None` when the record decodes.
    pub pattern: Option<CorruptionPattern>,
    /// The decoded record, when the canonical decoder accepts it.
    pub decoded: Option<R>,
    pub presence: SchemaPresence,
    pub fixable: bool,
    pub strategy: String,
    /// Raw decoder or parser error text behind the classification.
    pub error: Option<String>,
}

impl<R> RecordAnalysis<R> {
    /// Whether the record decodes and needs no repair.
    #[must_use]
    pub fn is_functional(&self) -> bool {
        self.state.is_decodable()
    }
}

/// Classify canonical decoder error text by known substrings.
///
/// Returns `None` when the text carries no recognizable signature.
#[must_use]
pub fn classify_decode_error(text: &str) -> Option<CorruptionPattern> {
    let lower = text.to_ascii_lowercase();
    if lower.contains("illegal wire type") || lower.contains("invalid wire type") {
        Some(CorruptionPattern::InvalidWireType)
    } else if lower.contains("unexpected eof")
        || lower.contains("truncated")
        || lower.contains("buffer underflow")
    {
        Some(CorruptionPattern::TruncatedField)
    } else if lower.contains("invalid tag value") {
        Some(CorruptionPattern::FieldNumberCorruption)
    } else {
        None
    }
}

/// Classify an error raised by the raw field parser.
///
/// Returns `None` for parse failures with no repair strategy (an
/// unreadable tag or a group wire type): severe corruption.
#[must_use]
pub fn classify_parse_error(err: &RepairError) -> Option<CorruptionPattern> {
    match err {
        RepairError::InvalidWireType { .. } => Some(CorruptionPattern::InvalidWireType),
        RepairError::UnexpectedEof { .. } => Some(CorruptionPattern::TruncatedField),
        RepairError::LengthRead { .. } => Some(CorruptionPattern::MalformedLength),
        RepairError::InvalidFieldNumber { .. } => Some(CorruptionPattern::FieldNumberCorruption),
        RepairError::TagRead { .. } | RepairError::UnsupportedWireType { .. } => None,
        other => classify_decode_error(&other.to_string()),
    }
}

/// Structural classification of a buffer that parsed cleanly but does not
/// decode.
///
/// Reserved wire types cannot appear in a parsed [`Field`]; the parser
/// rejects them, so that signal arrives through [`classify_parse_error`].
#[must_use]
pub fn classify_parsed_fields(
    buf: &[u8],
    fields: &std::collections::BTreeMap<u32, Field>,
    config: &RepairConfig,
) -> CorruptionPattern {
    if config
        .required_fields
        .iter()
        .any(|number| !fields.contains_key(number))
    {
        return CorruptionPattern::MissingRequiredFields;
    }
    match count_unique_field_occurrences(buf) {
        Ok(physical) if physical != fields.len() => CorruptionPattern::DuplicateFields,
        _ => CorruptionPattern::Unknown,
    }
}

impl<C: RecordCodec> Repairer<C> {
    /// Analyze a stored record.
    pub fn analyze(&self, key: &[u8], buf: &[u8]) -> RecordAnalysis<C::Record> {
        let parsed = parse_fields(buf);
        let presence = parsed
            .as_ref()
            .map(|fields| SchemaPresence::from_fields(fields, &self.config))
            .unwrap_or_default();

        let decode_err = match self.codec.decode(buf) {
            Ok(record) => {
                let state = match &parsed {
                    Ok(_) if !presence.is_canonical() => ContractState::SchemaInconsistent,
                    _ => ContractState::Healthy,
                };
                let strategy = match state {
                    ContractState::Healthy => STRATEGY_HEALTHY,
                    _ => STRATEGY_FUNCTIONAL,
                };
                return RecordAnalysis {
                    key: key.to_vec(),
                    state,
                    pattern: None,
                    decoded: Some(record),
                    presence,
                    fixable: false,
                    strategy: strategy.to_owned(),
                    error: None,
                };
            }
            Err(err) => err,
        };

        let decode_text = decode_err.to_string();
        let (pattern, error_text) = if let Some(pattern) = classify_decode_error(&decode_text) {
            (Some(pattern), decode_text)
        } else {
            match &parsed {
                Err(parse_err) => (classify_parse_error(parse_err), parse_err.to_string()),
                Ok(fields) => (
                    Some(classify_parsed_fields(buf, fields, &self.config)),
                    decode_text,
                ),
            }
        };

        let (pattern, fixable, strategy) = match pattern {
            Some(pattern) => (
                pattern,
                pattern.fixable_under(&self.config),
                pattern.strategy(),
            ),
            None => (CorruptionPattern::Unknown, false, STRATEGY_SEVERE),
        };

        debug!(
            component = COMPONENT,
            key = %key_hex(key),
            pattern = %pattern,
            fixable,
            error = %error_text,
            "classified undecodable record"
        );

        RecordAnalysis {
            key: key.to_vec(),
            state: ContractState::UnmarshalFails,
            pattern: Some(pattern),
            decoded: None,
            presence,
            fixable,
            strategy: strategy.to_owned(),
            error: Some(error_text),
        }
    }
}
