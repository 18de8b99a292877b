//! Record state detection.
//!
//! Decodability is the authoritative signal. The raw field view only refines
//! a decodable record into canonical ([`ContractState::Healthy`]) versus
//! functional-but-non-canonical ([`ContractState::SchemaInconsistent`]).

use std::collections::BTreeMap;
use std::fmt;

use recfix_error::{RepairError, Result};
use recfix_wire::{Field, WireType, parse_fields};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::RecordCodec;
use crate::config::RepairConfig;
use crate::Repairer;

const COMPONENT: &str = "detect";

/// Where a record stands with respect to the canonical schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContractState {
    /// Decodes, and F7/F8 are present with F7 length-delimited.
    Healthy,
    /// The canonical decoder rejects the bytes.
    UnmarshalFails,
    /// Decodes, but F7/F8 are missing or F7 has the wrong wire type.
    SchemaInconsistent,
    /// A repair was attempted and failed, or no strategy applies.
    Unfixable,
}

impl ContractState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "Healthy",
            Self::UnmarshalFails => "UnmarshalFails",
            Self::SchemaInconsistent => "SchemaInconsistent",
            Self::Unfixable => "Unfixable",
        }
    }

    /// Whether the record decodes in this state.
    #[must_use]
    pub const fn is_decodable(self) -> bool {
        matches!(self, Self::Healthy | Self::SchemaInconsistent)
    }
}

impl fmt::Display for ContractState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presence and shape of the two schema-critical fields.
///
/// F8 only needs to be present; empty and populated values are both
/// acceptable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaPresence {
    pub has_f7: bool,
    pub has_f8: bool,
    pub f7_wire_type: Option<WireType>,
    pub f7_empty: bool,
    pub f8_empty: bool,
}

impl SchemaPresence {
    /// Derive presence flags from parsed fields.
    #[must_use]
    pub fn from_fields(fields: &BTreeMap<u32, Field>, config: &RepairConfig) -> Self {
        let f7 = fields.get(&config.f7_field);
        let f8 = fields.get(&config.f8_field);
        Self {
            has_f7: f7.is_some(),
            has_f8: f8.is_some(),
            f7_wire_type: f7.map(|field| field.wire_type),
            f7_empty: f7.is_some_and(Field::is_empty),
            f8_empty: f8.is_some_and(Field::is_empty),
        }
    }

    /// Whether the layout satisfies the canonical schema condition.
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        self.has_f7 && self.has_f8 && self.f7_wire_type == Some(WireType::LengthDelimited)
    }
}

impl<C: RecordCodec> Repairer<C> {
    /// Classify a record.
    ///
    /// Returns the decoder's error when the state is
    /// [`ContractState::UnmarshalFails`]. A record that decodes but trips the
    /// raw field parser is reported healthy.
    pub fn detect_state(&self, buf: &[u8]) -> (ContractState, Option<RepairError>) {
        if let Err(err) = self.codec.decode(buf) {
            debug!(component = COMPONENT, len = buf.len(), error = %err, "canonical decode failed");
            return (ContractState::UnmarshalFails, Some(err));
        }

        let fields = match parse_fields(buf) {
            Ok(fields) => fields,
            Err(err) => {
                debug!(
                    component = COMPONENT,
                    error = %err,
                    "decodable record failed raw parse; treating as healthy"
                );
                return (ContractState::Healthy, None);
            }
        };

        let presence = SchemaPresence::from_fields(&fields, &self.config);
        if presence.is_canonical() {
            (ContractState::Healthy, None)
        } else {
            debug!(
                component = COMPONENT,
                has_f7 = presence.has_f7,
                has_f8 = presence.has_f8,
                f7_wire_type = ?presence.f7_wire_type,
                "record decodes but is schema-inconsistent"
            );
            (ContractState::SchemaInconsistent, None)
        }
    }

    /// Whether the canonical decoder rejects the record.
    pub fn is_corrupted(&self, buf: &[u8]) -> bool {
        !self.can_decode(buf)
    }

    /// Whether the canonical decoder accepts the record.
    pub fn can_decode(&self, buf: &[u8]) -> bool {
        self.codec.decode(buf).is_ok()
    }

    /// Decode, re-encode, and decode again, requiring both decodes to agree.
    ///
    /// Verification only; never used to produce repaired bytes.
    ///
    /// # Errors
    ///
    /// Returns the decode error, or [`RepairError::VerificationFailed`] when
    /// the re-encoded record decodes differently.
    pub fn validate_round_trip(&self, buf: &[u8]) -> Result<()> {
        let first = self.codec.decode(buf)?;
        let reencoded = self.codec.encode(&first);
        let second = self.codec.decode(&reencoded)?;
        if first == second {
            Ok(())
        } else {
            Err(RepairError::VerificationFailed {
                detail: "re-encoded record decodes to a different value".to_owned(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use recfix_wire::FieldWriter;

    use super::*;
    use crate::schema::{Any, ContractInfo};

    fn healthy_record() -> Vec<u8> {
        let mut w = FieldWriter::new();
        w.write_varint_field(1, 7);
        w.write_bytes_field(2, b"xion1creator");
        w.write_empty_field(7);
        w.write_bytes_field(8, b"wasm.xion1port");
        w.finish()
    }

    #[test]
    fn healthy_when_f7_and_f8_present() {
        let repairer = Repairer::contract_info();
        let (state, err) = repairer.detect_state(&healthy_record());
        assert_eq!(state, ContractState::Healthy);
        assert!(err.is_none());
    }

    #[test]
    fn empty_f8_still_healthy() {
        let mut w = FieldWriter::new();
        w.write_varint_field(1, 7);
        w.write_bytes_field(2, b"c");
        w.write_empty_field(7);
        w.write_empty_field(8);
        let (state, _) = Repairer::contract_info().detect_state(&w.finish());
        assert_eq!(state, ContractState::Healthy);
    }

    #[test]
    fn empty_buffer_is_schema_inconsistent() {
        let (state, err) = Repairer::contract_info().detect_state(&[]);
        assert_eq!(state, ContractState::SchemaInconsistent);
        assert!(err.is_none());
    }

    #[test]
    fn missing_f8_is_schema_inconsistent() {
        let info = ContractInfo {
            code_id: 1,
            creator: "c".to_owned(),
            extension: Some(Any::default()),
            ..ContractInfo::default()
        };
        let (state, _) = Repairer::contract_info().detect_state(&info.encode_with_extension());
        assert_eq!(state, ContractState::SchemaInconsistent);
    }

    #[test]
    fn undecodable_reports_decoder_error() {
        let mut w = FieldWriter::new();
        w.write_varint_field(1, 1);
        w.write_bytes_field(7, b"wasm.xion1test");
        let (state, err) = Repairer::contract_info().detect_state(&w.finish());
        assert_eq!(state, ContractState::UnmarshalFails);
        assert!(matches!(err, Some(RepairError::Decode(_))));
    }

    #[test]
    fn presence_flags() {
        let fields = parse_fields(&healthy_record()).unwrap();
        let presence = SchemaPresence::from_fields(&fields, &RepairConfig::default());
        assert!(presence.has_f7 && presence.has_f8);
        assert!(presence.f7_empty);
        assert!(!presence.f8_empty);
        assert_eq!(presence.f7_wire_type, Some(WireType::LengthDelimited));
        assert!(presence.is_canonical());
    }

    #[test]
    fn boolean_wrappers() {
        let repairer = Repairer::contract_info();
        assert!(repairer.can_decode(&healthy_record()));
        assert!(!repairer.is_corrupted(&healthy_record()));
        assert!(repairer.is_corrupted(&[0x12, 0x09]));
    }

    #[test]
    fn round_trip_validates_healthy_record() {
        let repairer = Repairer::contract_info();
        repairer.validate_round_trip(&healthy_record()).unwrap();
        assert!(repairer.validate_round_trip(&[0x12, 0x09]).is_err());
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_detection_stable_under_round_trip(
            code_id in 1_u64..1_000_000,
            creator in "[a-z0-9]{1,40}",
            port in "[a-z0-9.]{1,30}",
        ) {
            let info = ContractInfo {
                code_id,
                creator,
                extension: Some(Any::default()),
                ibc2_port_id: port,
                ..ContractInfo::default()
            };
            let repairer = Repairer::contract_info();
            let bytes = info.encode_with_extension();
            let (state, _) = repairer.detect_state(&bytes);
            prop_assert_eq!(state, ContractState::Healthy);

            let decoded = repairer.codec().decode(&bytes).unwrap();
            let reencoded = repairer.codec().encode(&decoded);
            let (again, _) = repairer.detect_state(&reencoded);
            prop_assert_eq!(again, state);
            prop_assert!(repairer.validate_round_trip(&bytes).is_ok());
        }
    }
}
