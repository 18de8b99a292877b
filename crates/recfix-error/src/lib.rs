use thiserror::Error;

/// Primary error type for the record repair toolkit.
///
/// Variants are grouped by where the failure originates: the raw field
/// parser, the canonical decoder, a repair strategy, a repair policy, or the
/// storage/driver layer around them. Parse variants always carry the byte
/// offset at which the failure was observed.
#[derive(Error, Debug)]
pub enum RepairError {
    // === Parse Errors ===
    /// A field tag varint could not be read.
    #[error("failed to read tag at offset {offset}")]
    TagRead { offset: usize },

    /// A tag carried wire type 6 or 7, which the wire format reserves.
    #[error("invalid wire type {wire_type} for field {field} at offset {offset}")]
    InvalidWireType {
        field: u64,
        wire_type: u8,
        offset: usize,
    },

    /// A tag carried a group wire type (3 or 4), which records never use.
    #[error("unsupported group wire type {wire_type} for field {field} at offset {offset}")]
    UnsupportedWireType {
        field: u64,
        wire_type: u8,
        offset: usize,
    },

    /// A tag decoded to field number zero or beyond the 29-bit range.
    #[error("invalid field number {field} at offset {offset}")]
    InvalidFieldNumber { field: u64, offset: usize },

    /// The buffer ended before a field payload was complete.
    #[error(
        "unexpected end of buffer reading field {field} at offset {offset}: need {needed} bytes, have {available}"
    )]
    UnexpectedEof {
        field: u32,
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A varint payload or length prefix could not be read.
    #[error("failed to read length for field {field} at offset {offset}")]
    LengthRead { field: u32, offset: usize },

    // === Decode Errors ===
    /// The canonical decoder rejected the bytes. The text is opaque.
    #[error("canonical decode failed: {0}")]
    Decode(String),

    // === Repair Errors ===
    /// A pattern-specific reconstruction could not produce a candidate.
    #[error("repair for {pattern} failed: {detail}")]
    RepairFailed { pattern: String, detail: String },

    /// The candidate produced by a repair still fails canonical decoding.
    #[error("repaired bytes failed verification: {detail}")]
    VerificationFailed { detail: String },

    /// The byte-scan recovery found no readable field at all.
    #[error("aggressive recovery found no recoverable fields")]
    NothingRecovered,

    // === Policy Errors ===
    /// The corruption pattern is not eligible for automatic repair.
    #[error("record is not fixable ({pattern}): {reason}")]
    NotFixable { pattern: String, reason: String },

    /// The record needs an operator to reconstruct it by hand.
    #[error("manual intervention required: {reason}")]
    ManualInterventionRequired { reason: String },

    // === Driver / Storage Errors ===
    /// One or more records remained unrepaired after a migration pass.
    #[error("migration incomplete: {failed} of {scanned} records could not be repaired")]
    MigrationIncomplete { failed: u64, scanned: u64 },

    /// The record store rejected an operation.
    #[error("record store error: {detail}")]
    Store { detail: String },

    /// Configuration is invalid.
    #[error("invalid configuration: {detail}")]
    Config { detail: String },

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of a [`RepairError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Raised by the raw field parser.
    Parse,
    /// Raised by the canonical decoder.
    Decode,
    /// A repair strategy or its verification failed.
    Repair,
    /// A policy decision refused the repair.
    Policy,
    /// Store, driver, configuration, or I/O failure.
    Storage,
}

impl RepairError {
    /// Map this error to its category.
    #[allow(clippy::match_same_arms)]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::TagRead { .. }
            | Self::InvalidWireType { .. }
            | Self::UnsupportedWireType { .. }
            | Self::InvalidFieldNumber { .. }
            | Self::UnexpectedEof { .. }
            | Self::LengthRead { .. } => ErrorCategory::Parse,
            Self::Decode(_) => ErrorCategory::Decode,
            Self::RepairFailed { .. }
            | Self::VerificationFailed { .. }
            | Self::NothingRecovered => ErrorCategory::Repair,
            Self::NotFixable { .. } | Self::ManualInterventionRequired { .. } => {
                ErrorCategory::Policy
            }
            Self::MigrationIncomplete { .. }
            | Self::Store { .. }
            | Self::Config { .. }
            | Self::Json(_) => ErrorCategory::Storage,
        }
    }

    /// Byte offset at which a parse error was observed.
    pub const fn offset(&self) -> Option<usize> {
        match self {
            Self::TagRead { offset }
            | Self::InvalidWireType { offset, .. }
            | Self::UnsupportedWireType { offset, .. }
            | Self::InvalidFieldNumber { offset, .. }
            | Self::UnexpectedEof { offset, .. }
            | Self::LengthRead { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// Whether this error came from the raw field parser.
    pub const fn is_parse_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Parse)
    }

    /// Operator-facing hint for resolving this error.
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::InvalidWireType { .. } => {
                Some("Likely a swapped field write; run the migration to rebuild the record")
            }
            Self::UnexpectedEof { .. } | Self::LengthRead { .. } => {
                Some("Record is truncated; repair salvages the readable prefix")
            }
            Self::ManualInterventionRequired { .. } | Self::NotFixable { .. } => {
                Some("Reconstruct the record from an archival source before upgrading")
            }
            Self::MigrationIncomplete { .. } => {
                Some("Inspect the failure sample in the migration stats, then re-run")
            }
            Self::Config { .. } => Some("Check the repair configuration values"),
            _ => None,
        }
    }

    /// Create a decode error from the canonical decoder's message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a repair failure for a pattern.
    pub fn repair_failed(pattern: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::RepairFailed {
            pattern: pattern.into(),
            detail: detail.into(),
        }
    }

    /// Create a store error.
    pub fn store(detail: impl Into<String>) -> Self {
        Self::Store {
            detail: detail.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config {
            detail: detail.into(),
        }
    }
}

/// Result type alias using `RepairError`.
pub type Result<T> = std::result::Result<T, RepairError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display_carries_offset_and_field() {
        let err = RepairError::InvalidWireType {
            field: 14,
            wire_type: 7,
            offset: 23,
        };
        assert_eq!(
            err.to_string(),
            "invalid wire type 7 for field 14 at offset 23"
        );
        assert_eq!(err.offset(), Some(23));
        assert!(err.is_parse_error());
    }

    #[test]
    fn parse_error_texts_keep_classifier_substrings() {
        let tag = RepairError::TagRead { offset: 0 }.to_string();
        assert!(tag.contains("failed to read tag"));

        let length = RepairError::LengthRead {
            field: 2,
            offset: 4,
        }
        .to_string();
        assert!(length.contains("failed to read length"));

        let eof = RepairError::UnexpectedEof {
            field: 2,
            offset: 4,
            needed: 9,
            available: 3,
        }
        .to_string();
        assert!(eof.contains("unexpected end of buffer"));

        let number = RepairError::InvalidFieldNumber {
            field: 0,
            offset: 0,
        }
        .to_string();
        assert!(number.contains("invalid field number"));
    }

    #[test]
    fn category_mapping() {
        assert_eq!(RepairError::decode("boom").category(), ErrorCategory::Decode);
        assert_eq!(
            RepairError::repair_failed("TruncatedField", "nothing left").category(),
            ErrorCategory::Repair
        );
        assert_eq!(
            RepairError::ManualInterventionRequired {
                reason: "missing creator".to_owned()
            }
            .category(),
            ErrorCategory::Policy
        );
        assert_eq!(
            RepairError::MigrationIncomplete {
                failed: 1,
                scanned: 3
            }
            .category(),
            ErrorCategory::Storage
        );
        assert_eq!(RepairError::NothingRecovered.offset(), None);
    }

    #[test]
    fn migration_incomplete_names_count() {
        let err = RepairError::MigrationIncomplete {
            failed: 2,
            scanned: 10,
        };
        assert_eq!(
            err.to_string(),
            "migration incomplete: 2 of 10 records could not be repaired"
        );
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn json_from() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: RepairError = json_err.into();
        assert!(matches!(err, RepairError::Json(_)));
        assert_eq!(err.category(), ErrorCategory::Storage);
    }
}
