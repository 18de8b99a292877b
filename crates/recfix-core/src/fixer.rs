//! Pattern-driven reconstruction of undecodable records.
//!
//! State machine for [`Repairer::fix_contract`]:
//!
//! - `Healthy` / `SchemaInconsistent`: the record decodes, so it is returned
//!   untouched. Non-canonical but functional records are left for a separate
//!   normalization pass.
//! - `UnmarshalFails` and not fixable: `Unfixable` with a policy error.
//! - `UnmarshalFails` and fixable: dispatch on the corruption pattern, then
//!   verify the candidate with the canonical decoder and re-detect its state.
//!
//! Every rebuild emits fields in ascending field-number order, `1..=max`,
//! regardless of the order they appeared in the damaged input, so the output
//! depends only on the input bytes and the config.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use recfix_error::{RepairError, Result};
use recfix_wire::{
    Field, FieldWriter, RawWireType, WireType, parse_field_sequence, parse_fields, parse_prefix,
    read_field_at, read_varint, write_varint,
};
use tracing::{debug, error, info, warn};

use crate::analyze::CorruptionPattern;
use crate::codec::RecordCodec;
use crate::detect::ContractState;
use crate::{Repairer, key_hex};

const COMPONENT: &str = "fixer";

/// Outcome of one [`Repairer::fix_contract`] call.
#[derive(Debug)]
pub struct FixResult {
    pub original_state: ContractState,
    /// Pattern that selected the strategy; `None` when no repair was needed.
    pub pattern: Option<CorruptionPattern>,
    pub fix_attempted: bool,
    pub fix_succeeded: bool,
    pub final_state: ContractState,
    /// Present iff `fix_succeeded`. Equal to the input when nothing changed.
    pub fixed_bytes: Option<Vec<u8>>,
    pub bytes_changed: bool,
    pub error: Option<RepairError>,
}

impl FixResult {
    fn unchanged(state: ContractState, original: &[u8]) -> Self {
        Self {
            original_state: state,
            pattern: None,
            fix_attempted: false,
            fix_succeeded: true,
            final_state: state,
            fixed_bytes: Some(original.to_vec()),
            bytes_changed: false,
            error: None,
        }
    }

    fn unfixable(pattern: CorruptionPattern, attempted: bool, err: RepairError) -> Self {
        Self {
            original_state: ContractState::UnmarshalFails,
            pattern: Some(pattern),
            fix_attempted: attempted,
            fix_succeeded: false,
            final_state: ContractState::Unfixable,
            fixed_bytes: None,
            bytes_changed: false,
            error: Some(err),
        }
    }

    /// Strategy text of the pattern that drove this result.
    #[must_use]
    pub fn strategy(&self) -> &'static str {
        self.pattern
            .map_or("no fix needed", CorruptionPattern::strategy)
    }
}

impl<C: RecordCodec> Repairer<C> {
    /// Detect, classify, and repair one record.
    ///
    /// Never panics on malformed input; every failure is reported through
    /// [`FixResult::error`].
    pub fn fix_contract(&self, key: &[u8], buf: &[u8]) -> FixResult {
        let (state, _) = self.detect_state(buf);
        match state {
            ContractState::Healthy | ContractState::SchemaInconsistent => {
                debug!(
                    component = COMPONENT,
                    key = %key_hex(key),
                    state = %state,
                    "record decodes; leaving bytes untouched"
                );
                return FixResult::unchanged(state, buf);
            }
            ContractState::UnmarshalFails | ContractState::Unfixable => {}
        }

        let analysis = self.analyze(key, buf);
        let pattern = analysis.pattern.unwrap_or(CorruptionPattern::Unknown);
        if !analysis.fixable {
            warn!(
                component = COMPONENT,
                key = %key_hex(key),
                pattern = %pattern,
                strategy = %analysis.strategy,
                "record not eligible for automatic repair"
            );
            return FixResult::unfixable(
                pattern,
                false,
                RepairError::NotFixable {
                    pattern: pattern.to_string(),
                    reason: analysis.strategy,
                },
            );
        }

        let candidate = match pattern {
            CorruptionPattern::InvalidWireType => self.fix_invalid_wire_type(buf),
            CorruptionPattern::TruncatedField | CorruptionPattern::MalformedLength => {
                self.fix_truncated(buf, pattern)
            }
            CorruptionPattern::DuplicateFields => self.fix_duplicate_fields(buf),
            CorruptionPattern::FieldNumberCorruption => self.aggressive_recovery(buf),
            CorruptionPattern::MissingRequiredFields => {
                Err(RepairError::ManualInterventionRequired {
                    reason: "required identity fields are missing and cannot be inferred"
                        .to_owned(),
                })
            }
            CorruptionPattern::Unknown => self.fix_unclassified(buf),
        };

        match candidate {
            Ok(candidate) => self.verify_candidate(key, pattern, buf, candidate),
            Err(err) => {
                error!(
                    component = COMPONENT,
                    key = %key_hex(key),
                    pattern = %pattern,
                    error = %err,
                    "repair strategy failed"
                );
                FixResult::unfixable(pattern, true, err)
            }
        }
    }

    fn verify_candidate(
        &self,
        key: &[u8],
        pattern: CorruptionPattern,
        original: &[u8],
        candidate: Vec<u8>,
    ) -> FixResult {
        if let Err(err) = self.codec.decode(&candidate) {
            error!(
                component = COMPONENT,
                key = %key_hex(key),
                pattern = %pattern,
                error = %err,
                "repaired bytes still fail canonical decode"
            );
            return FixResult::unfixable(
                pattern,
                true,
                RepairError::VerificationFailed {
                    detail: err.to_string(),
                },
            );
        }

        let (final_state, _) = self.detect_state(&candidate);
        if final_state == ContractState::SchemaInconsistent {
            warn!(
                component = COMPONENT,
                key = %key_hex(key),
                pattern = %pattern,
                "repaired record decodes but is still schema-inconsistent"
            );
        } else {
            info!(
                component = COMPONENT,
                key = %key_hex(key),
                pattern = %pattern,
                original_len = original.len(),
                fixed_len = candidate.len(),
                "record repaired and verified"
            );
        }

        FixResult {
            original_state: ContractState::UnmarshalFails,
            pattern: Some(pattern),
            fix_attempted: true,
            fix_succeeded: true,
            final_state,
            bytes_changed: candidate != original,
            fixed_bytes: Some(candidate),
            error: None,
        }
    }

    /// Undo the F7/F8 swap.
    ///
    /// When F7 is present and F8 absent, F7's payload moves to F8 and F7 is
    /// re-emitted empty. Falls back to [`Self::aggressive_recovery`] when the
    /// buffer does not parse at all.
    ///
    /// # Errors
    ///
    /// Propagates the byte-scan failure when the fallback recovers nothing.
    pub fn fix_invalid_wire_type(&self, buf: &[u8]) -> Result<Vec<u8>> {
        let mut fields = match parse_fields(buf) {
            Ok(fields) => fields,
            Err(err) => {
                debug!(
                    component = COMPONENT,
                    error = %err,
                    "field parse failed; falling back to byte-scan recovery"
                );
                return self.aggressive_recovery(buf);
            }
        };

        let (f7, f8) = (self.config.f7_field, self.config.f8_field);
        if !fields.contains_key(&f8) {
            if let Some(misplaced) = fields.remove(&f7) {
                debug!(
                    component = COMPONENT,
                    from = f7,
                    to = f8,
                    payload_len = misplaced.payload().len(),
                    "moving misplaced payload"
                );
                fields.insert(f8, misplaced);
            }
        }
        Ok(self.rebuild_ascending(&fields, true))
    }

    /// Keep every field before the first unreadable one and drop the rest.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::RepairFailed`] when not even the first field is
    /// readable.
    pub fn fix_truncated(&self, buf: &[u8], pattern: CorruptionPattern) -> Result<Vec<u8>> {
        let (prefix, stopped_by) = parse_prefix(buf);
        if prefix.is_empty() {
            return Err(RepairError::repair_failed(
                pattern.as_str(),
                "no complete field precedes the damaged region",
            ));
        }

        let kept_end = prefix.last().map_or(0, Field::end);
        debug!(
            component = COMPONENT,
            kept_fields = prefix.len(),
            dropped_bytes = buf.len() - kept_end,
            stopped_by = ?stopped_by.map(|err| err.to_string()),
            "salvaging readable prefix"
        );

        let mut fields = BTreeMap::new();
        for field in prefix {
            fields.insert(field.number, field);
        }
        Ok(self.rebuild_ascending(&fields, false))
    }

    /// Keep only the first physical occurrence of each field number.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::RepairFailed`] when the buffer does not parse.
    pub fn fix_duplicate_fields(&self, buf: &[u8]) -> Result<Vec<u8>> {
        let sequence = parse_field_sequence(buf).map_err(|err| {
            RepairError::repair_failed(CorruptionPattern::DuplicateFields.as_str(), err.to_string())
        })?;

        let mut first_seen = BTreeMap::new();
        let mut dropped = 0_usize;
        for field in sequence {
            match first_seen.entry(field.number) {
                Entry::Vacant(slot) => {
                    slot.insert(field);
                }
                Entry::Occupied(_) => dropped += 1,
            }
        }
        debug!(component = COMPONENT, dropped, "dropped repeated field occurrences");
        Ok(self.rebuild_ascending(&first_seen, false))
    }

    /// Best-effort byte-scan recovery for buffers the parser cannot walk.
    ///
    /// Scans byte by byte. A tag with a reserved wire type is skipped together
    /// with `heuristic_skip_len` following bytes; any other readable field is
    /// kept (first occurrence wins) and skipped over; anything else advances
    /// one byte. F7 and F8 are always emitted empty, and other recovered
    /// fields are re-emitted with the wire type the schema most likely uses.
    ///
    /// This is the only strategy that accepts data loss by design.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::NothingRecovered`] when no field is readable.
    pub fn aggressive_recovery(&self, buf: &[u8]) -> Result<Vec<u8>> {
        let mut recovered: BTreeMap<u32, Field> = BTreeMap::new();
        let mut pos = 0;
        let mut skipped_invalid = 0_usize;

        while pos < buf.len() {
            let Some((tag, tag_len)) = read_varint(&buf[pos..]) else {
                pos += 1;
                continue;
            };
            #[allow(clippy::cast_possible_truncation)]
            let raw_wire = (tag & 0x7) as u8;
            if matches!(WireType::classify(raw_wire), RawWireType::Invalid(_)) {
                skipped_invalid += 1;
                pos = pos
                    .saturating_add(tag_len)
                    .saturating_add(self.config.heuristic_skip_len);
                continue;
            }
            match read_field_at(buf, pos) {
                Ok(field) => {
                    pos = field.end();
                    recovered.entry(field.number).or_insert(field);
                }
                Err(_) => pos += 1,
            }
        }

        if recovered.is_empty() {
            return Err(RepairError::NothingRecovered);
        }
        debug!(
            component = COMPONENT,
            recovered = recovered.len(),
            skipped_invalid,
            "byte-scan recovery finished"
        );

        let (f7, f8) = (self.config.f7_field, self.config.f8_field);
        let mut writer = FieldWriter::with_capacity(buf.len() + 4);
        for number in 1..=self.config.max_field_number {
            if number == f7 || number == f8 {
                writer.write_empty_field(number);
                continue;
            }
            let Some(field) = recovered.get(&number) else {
                continue;
            };
            let guess = if number == self.config.lead_identity_field {
                WireType::Varint
            } else {
                WireType::LengthDelimited
            };
            match coerce_payload(field, guess) {
                Some(data) => writer.write_raw_field(number, guess, &data),
                None => debug!(
                    component = COMPONENT,
                    field = number,
                    actual = %field.wire_type,
                    expected = %guess,
                    "recovered field does not fit its expected wire type; dropped"
                ),
            }
        }
        Ok(writer.finish())
    }

    /// Caller-enabled repair of unclassified corruption: canonical reordering
    /// when the buffer parses, byte-scan recovery when it does not.
    fn fix_unclassified(&self, buf: &[u8]) -> Result<Vec<u8>> {
        match parse_fields(buf) {
            Ok(fields) => Ok(self.rebuild_ascending(&fields, true)),
            Err(_) => self.aggressive_recovery(buf),
        }
    }

    /// Emit `fields` in ascending number order over `1..=max_field_number`.
    ///
    /// Each map entry is written under its map key, so a payload moved to a
    /// new slot is emitted under the new number. With
    /// `ensure_schema_fields`, absent F7/F8 are emitted empty.
    #[must_use]
    pub fn rebuild_ascending(
        &self,
        fields: &BTreeMap<u32, Field>,
        ensure_schema_fields: bool,
    ) -> Vec<u8> {
        let (f7, f8) = (self.config.f7_field, self.config.f8_field);
        let max = self.config.max_field_number;
        let capacity = fields.values().map(|field| field.length + 2).sum::<usize>() + 4;
        let mut writer = FieldWriter::with_capacity(capacity);

        for number in 1..=max {
            match fields.get(&number) {
                Some(field) => writer.write_raw_field(number, field.wire_type, &field.data),
                None if ensure_schema_fields && (number == f7 || number == f8) => {
                    writer.write_empty_field(number);
                }
                None => {}
            }
        }

        let beyond = fields.keys().filter(|&&number| number > max).count();
        if beyond > 0 {
            debug!(
                component = COMPONENT,
                dropped = beyond,
                max_field_number = max,
                "fields beyond the schema range dropped from rebuild"
            );
        }
        writer.finish()
    }
}

/// Re-shape a recovered field's payload for `guess`, or `None` if it cannot
/// be expressed that way.
fn coerce_payload(field: &Field, guess: WireType) -> Option<Vec<u8>> {
    if field.wire_type == guess {
        return Some(field.data.clone());
    }
    match guess {
        WireType::LengthDelimited => {
            let mut data = Vec::with_capacity(field.data.len() + 1);
            write_varint(&mut data, field.data.len() as u64);
            data.extend_from_slice(&field.data);
            Some(data)
        }
        WireType::Varint => {
            let payload = field.payload();
            match read_varint(payload) {
                Some((_, consumed)) if consumed == payload.len() => Some(payload.to_vec()),
                _ => None,
            }
        }
        WireType::Fixed64 | WireType::Fixed32 => None,
    }
}

#[cfg(test)]
mod tests {
    use recfix_wire::{count_unique_field_occurrences, extract_field_value};

    use super::*;
    use crate::schema::{Any, ContractInfo};

    fn swapped_record(code_id: u64, creator: &[u8], port: &[u8]) -> Vec<u8> {
        let mut w = FieldWriter::new();
        w.write_varint_field(1, code_id);
        w.write_bytes_field(2, creator);
        w.write_bytes_field(7, port);
        w.finish()
    }

    fn healthy_record() -> Vec<u8> {
        let mut w = FieldWriter::new();
        w.write_varint_field(1, 9);
        w.write_bytes_field(2, b"xion1creator");
        w.write_empty_field(7);
        w.write_bytes_field(8, b"wasm.port");
        w.finish()
    }

    #[test]
    fn swapped_fields_are_repaired() {
        let repairer = Repairer::contract_info();
        let buf = swapped_record(1, b"xion1creator", b"wasm.xion1test");

        let result = repairer.fix_contract(b"\x02abc", &buf);
        assert!(result.fix_attempted);
        assert!(result.fix_succeeded, "{:?}", result.error);
        assert_eq!(result.original_state, ContractState::UnmarshalFails);
        assert_eq!(result.final_state, ContractState::Healthy);
        assert_eq!(result.pattern, Some(CorruptionPattern::InvalidWireType));
        assert!(result.bytes_changed);

        let fixed = result.fixed_bytes.unwrap();
        let info = repairer.codec().decode(&fixed).unwrap();
        assert_eq!(info.code_id, 1);
        assert_eq!(info.creator, "xion1creator");
        assert_eq!(info.ibc2_port_id, "wasm.xion1test");
        assert_eq!(info.extension, Some(Any::default()));
    }

    #[test]
    fn swap_output_layout_is_ascending() {
        let repairer = Repairer::contract_info();
        let fixed = repairer
            .fix_invalid_wire_type(&swapped_record(1, b"c", b"p"))
            .unwrap();
        assert_eq!(
            fixed,
            vec![0x08, 0x01, 0x12, 0x01, b'c', 0x3A, 0x00, 0x42, 0x01, b'p']
        );
    }

    #[test]
    fn out_of_order_input_is_rebuilt_ascending() {
        let mut w = FieldWriter::new();
        w.write_bytes_field(7, b"wasm.port");
        w.write_bytes_field(2, b"creator");
        w.write_varint_field(1, 5);
        let fixed = Repairer::contract_info()
            .fix_invalid_wire_type(&w.finish())
            .unwrap();
        let numbers: Vec<u32> = recfix_wire::parse_field_sequence(&fixed)
            .unwrap()
            .iter()
            .map(|field| field.number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 7, 8]);
    }

    #[test]
    fn healthy_record_is_untouched() {
        let buf = healthy_record();
        let result = Repairer::contract_info().fix_contract(b"k", &buf);
        assert!(!result.fix_attempted);
        assert!(result.fix_succeeded);
        assert!(!result.bytes_changed);
        assert_eq!(result.fixed_bytes.as_deref(), Some(buf.as_slice()));
        assert_eq!(result.final_state, ContractState::Healthy);
    }

    #[test]
    fn empty_record_is_untouched() {
        let result = Repairer::contract_info().fix_contract(b"k", &[]);
        assert_eq!(result.original_state, ContractState::SchemaInconsistent);
        assert!(!result.fix_attempted);
        assert_eq!(result.fixed_bytes, Some(Vec::new()));
    }

    #[test]
    fn schema_inconsistent_record_is_untouched() {
        let info = ContractInfo {
            code_id: 4,
            creator: "c".to_owned(),
            ..ContractInfo::default()
        };
        let buf = info.encode_with_extension();
        let result = Repairer::contract_info().fix_contract(b"k", &buf);
        assert_eq!(result.original_state, ContractState::SchemaInconsistent);
        assert!(!result.fix_attempted);
        assert_eq!(result.fixed_bytes, Some(buf));
    }

    #[test]
    fn fix_is_idempotent_and_deterministic() {
        let repairer = Repairer::contract_info();
        let buf = swapped_record(77, b"xion1abc", b"wasm.xion1abc");
        let first = repairer.fix_contract(b"k", &buf).fixed_bytes.unwrap();
        let second = repairer.fix_contract(b"k", &buf).fixed_bytes.unwrap();
        assert_eq!(first, second);

        let again = repairer.fix_contract(b"k", &first);
        assert!(!again.fix_attempted);
        assert_eq!(again.fixed_bytes, Some(first));
    }

    #[test]
    fn truncated_tail_is_dropped() {
        let mut buf = swapped_record(3, b"xion1creator", b"wasm.xion1test");
        buf.truncate(buf.len() - 5);
        let result = Repairer::contract_info().fix_contract(b"k", &buf);
        assert!(result.fix_succeeded, "{:?}", result.error);
        assert_eq!(result.pattern, Some(CorruptionPattern::TruncatedField));
        assert_eq!(result.final_state, ContractState::SchemaInconsistent);

        let fixed = result.fixed_bytes.unwrap();
        assert_eq!(extract_field_value(&fixed, 2).unwrap(), Some(b"xion1creator".to_vec()));
        assert_eq!(extract_field_value(&fixed, 7).unwrap(), None);
    }

    #[test]
    fn truncated_first_field_fails() {
        let err = Repairer::contract_info()
            .fix_truncated(&[0x12, 0x05, b'a'], CorruptionPattern::TruncatedField)
            .unwrap_err();
        assert!(matches!(err, RepairError::RepairFailed { .. }));
    }

    #[test]
    fn duplicate_fields_keep_first_occurrence() {
        let mut w = FieldWriter::new();
        w.write_varint_field(1, 1);
        w.write_bytes_field(2, b"xion1creator");
        w.write_bytes_field(4, b"first");
        w.write_bytes_field(4, b"second");
        let buf = w.finish();

        let fixed = Repairer::contract_info().fix_duplicate_fields(&buf).unwrap();
        let sequence = recfix_wire::parse_field_sequence(&fixed).unwrap();
        assert_eq!(sequence.iter().filter(|field| field.number == 4).count(), 1);
        assert_eq!(extract_field_value(&fixed, 4).unwrap(), Some(b"first".to_vec()));
        assert_eq!(count_unique_field_occurrences(&fixed).unwrap(), 3);
    }

    #[test]
    fn duplicate_pattern_end_to_end() {
        let mut w = FieldWriter::new();
        w.write_varint_field(1, 1);
        w.write_bytes_field(2, b"xion1creator");
        w.write_bytes_field(4, b"label");
        w.write_bytes_field(4, &[0xC3, 0x28]);
        let result = Repairer::contract_info().fix_contract(b"k", &w.finish());
        assert!(result.fix_succeeded, "{:?}", result.error);
        assert_eq!(result.pattern, Some(CorruptionPattern::DuplicateFields));
        let info = Repairer::contract_info()
            .codec()
            .decode(result.fixed_bytes.as_deref().unwrap())
            .unwrap();
        assert_eq!(info.label, "label");
    }

    #[test]
    fn missing_required_fields_are_unfixable() {
        let mut w = FieldWriter::new();
        w.write_varint_field(1, 1);
        w.write_bytes_field(4, &[0xFF]);
        let result = Repairer::contract_info().fix_contract(b"k", &w.finish());
        assert!(!result.fix_attempted);
        assert!(!result.fix_succeeded);
        assert_eq!(result.final_state, ContractState::Unfixable);
        assert!(result.fixed_bytes.is_none());
        assert!(matches!(result.error, Some(RepairError::NotFixable { .. })));
        assert!(result.strategy().contains("manual intervention"));
    }

    #[test]
    fn missing_required_with_policy_requires_manual_intervention() {
        let config = crate::RepairConfig {
            treat_missing_required_as_fixable: true,
            ..crate::RepairConfig::default()
        };
        let repairer = Repairer::new(crate::ContractInfoCodec, config).unwrap();
        let mut w = FieldWriter::new();
        w.write_varint_field(1, 1);
        w.write_bytes_field(4, &[0xFF]);
        let result = repairer.fix_contract(b"k", &w.finish());
        assert!(result.fix_attempted);
        assert!(matches!(
            result.error,
            Some(RepairError::ManualInterventionRequired { .. })
        ));
    }

    #[test]
    fn swap_with_f8_present_fails_verification() {
        let mut w = FieldWriter::new();
        w.write_varint_field(1, 1);
        w.write_bytes_field(2, b"c");
        w.write_bytes_field(7, b"wasm.one");
        w.write_bytes_field(8, b"wasm.two");
        let result = Repairer::contract_info().fix_contract(b"k", &w.finish());
        assert!(result.fix_attempted);
        assert!(!result.fix_succeeded);
        assert!(matches!(
            result.error,
            Some(RepairError::VerificationFailed { .. })
        ));
    }

    #[test]
    fn unparseable_buffer_uses_byte_scan() {
        let mut w = FieldWriter::new();
        w.write_varint_field(1, 12);
        w.write_bytes_field(2, b"xion1creator");
        let mut buf = w.finish();
        buf.push((9 << 3) | 6);
        buf.extend_from_slice(&[0xEE; 10]);
        let mut tail = FieldWriter::new();
        tail.write_bytes_field(4, b"lbl");
        buf.extend_from_slice(&tail.finish());

        let result = Repairer::contract_info().fix_contract(b"k", &buf);
        assert!(result.fix_succeeded, "{:?}", result.error);
        assert_eq!(result.pattern, Some(CorruptionPattern::InvalidWireType));
        assert_eq!(result.final_state, ContractState::Healthy);

        let info = Repairer::contract_info()
            .codec()
            .decode(result.fixed_bytes.as_deref().unwrap())
            .unwrap();
        assert_eq!(info.code_id, 12);
        assert_eq!(info.creator, "xion1creator");
        assert_eq!(info.label, "lbl");
        assert!(info.ibc2_port_id.is_empty());
    }

    #[test]
    fn byte_scan_forces_empty_schema_fields() {
        let mut w = FieldWriter::new();
        w.write_varint_field(1, 1);
        w.write_bytes_field(8, b"old");
        let fixed = Repairer::contract_info()
            .aggressive_recovery(&w.finish())
            .unwrap();
        assert_eq!(extract_field_value(&fixed, 7).unwrap(), Some(Vec::new()));
        assert_eq!(extract_field_value(&fixed, 8).unwrap(), Some(Vec::new()));
    }

    #[test]
    fn byte_scan_with_nothing_readable_fails() {
        let err = Repairer::contract_info()
            .aggressive_recovery(&[0xFF; 16])
            .unwrap_err();
        assert!(matches!(err, RepairError::NothingRecovered));
    }

    #[test]
    fn byte_scan_survives_huge_skip_len() {
        let repairer = Repairer {
            codec: crate::ContractInfoCodec,
            config: crate::RepairConfig {
                heuristic_skip_len: usize::MAX,
                ..crate::RepairConfig::default()
            },
        };
        let fixed = repairer
            .aggressive_recovery(&[0x08, 0x01, 0x4F, 0x00, 0x00])
            .unwrap();
        assert_eq!(fixed, vec![0x08, 0x01, 0x3A, 0x00, 0x42, 0x00]);
    }

    #[test]
    fn byte_scan_keeps_first_occurrence() {
        let mut w = FieldWriter::new();
        w.write_varint_field(1, 1);
        w.write_bytes_field(2, b"first");
        let mut buf = w.finish();
        buf.push((9 << 3) | 6);
        buf.extend_from_slice(&[0xEE; 10]);
        let mut tail = FieldWriter::new();
        tail.write_bytes_field(2, b"second");
        buf.extend_from_slice(&tail.finish());

        let fixed = Repairer::contract_info().aggressive_recovery(&buf).unwrap();
        assert_eq!(extract_field_value(&fixed, 2).unwrap(), Some(b"first".to_vec()));
        let sequence = recfix_wire::parse_field_sequence(&fixed).unwrap();
        assert_eq!(sequence.iter().filter(|field| field.number == 2).count(), 1);
    }

    #[test]
    fn malformed_length_keeps_fields_before_damage() {
        let mut w = FieldWriter::new();
        w.write_varint_field(1, 1);
        w.write_bytes_field(2, b"xion1creator");
        let mut buf = w.finish();
        buf.push(0x22);
        buf.extend_from_slice(&[0xFF; 9]);
        buf.push(0x7F);
        buf.extend_from_slice(b"tail");

        let repairer = Repairer::contract_info();
        let analysis = repairer.analyze(b"k", &buf);
        assert_eq!(analysis.pattern, Some(CorruptionPattern::MalformedLength));
        assert!(analysis.fixable);

        let result = repairer.fix_contract(b"k", &buf);
        assert!(result.fix_succeeded, "{:?}", result.error);
        assert_eq!(result.pattern, Some(CorruptionPattern::MalformedLength));
        assert_eq!(result.final_state, ContractState::SchemaInconsistent);

        let fixed = result.fixed_bytes.unwrap();
        assert_eq!(extract_field_value(&fixed, 1).unwrap(), Some(vec![0x01]));
        assert_eq!(
            extract_field_value(&fixed, 2).unwrap(),
            Some(b"xion1creator".to_vec())
        );
        assert_eq!(extract_field_value(&fixed, 4).unwrap(), None);
    }

    #[test]
    fn field_number_zero_recovered_by_byte_scan() {
        let mut w = FieldWriter::new();
        w.write_varint_field(1, 1);
        w.write_bytes_field(2, b"c");
        let mut buf = w.finish();
        buf.extend_from_slice(&[0x02, 0x00]);

        let result = Repairer::contract_info().fix_contract(b"k", &buf);
        assert_eq!(result.pattern, Some(CorruptionPattern::FieldNumberCorruption));
        assert!(result.fix_succeeded, "{:?}", result.error);
        assert_eq!(result.final_state, ContractState::Healthy);
    }

    #[test]
    fn coerce_payload_shapes() {
        let varint = read_field_at(&[0x08, 0x05], 0).unwrap();
        assert_eq!(
            coerce_payload(&varint, WireType::LengthDelimited),
            Some(vec![0x01, 0x05])
        );
        let wrapped = read_field_at(&[0x0A, 0x01, 0x05], 0).unwrap();
        assert_eq!(coerce_payload(&wrapped, WireType::Varint), Some(vec![0x05]));
        let text = read_field_at(&[0x0A, 0x02, 0xFF, 0xFF], 0).unwrap();
        assert_eq!(coerce_payload(&text, WireType::Varint), None);
    }

    #[test]
    fn rebuild_drops_fields_beyond_range() {
        let mut w = FieldWriter::new();
        w.write_varint_field(1, 1);
        w.write_varint_field(12, 1);
        let fields = parse_fields(&w.finish()).unwrap();
        let rebuilt = Repairer::contract_info().rebuild_ascending(&fields, false);
        assert_eq!(rebuilt, vec![0x08, 0x01]);
    }

    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_swap_repair_preserves_data(
            code_id in any::<u64>(),
            creator in "xion1[a-z0-9]{5,40}",
            port in "wasm\\.xion1[a-z0-9]{1,40}",
        ) {
            let repairer = Repairer::contract_info();
            let buf = swapped_record(code_id, creator.as_bytes(), port.as_bytes());
            let result = repairer.fix_contract(b"k", &buf);
            prop_assert!(result.fix_succeeded);
            let fixed = result.fixed_bytes.unwrap();

            prop_assert!(repairer.can_decode(&fixed));
            prop_assert_eq!(
                extract_field_value(&fixed, 8).unwrap(),
                Some(port.into_bytes())
            );
            prop_assert_eq!(
                extract_field_value(&fixed, 1).unwrap(),
                extract_field_value(&buf, 1).unwrap()
            );
            prop_assert_eq!(
                extract_field_value(&fixed, 2).unwrap(),
                Some(creator.into_bytes())
            );
            prop_assert_eq!(extract_field_value(&fixed, 7).unwrap(), Some(Vec::new()));
        }

        #[test]
        fn prop_fix_never_panics(buf in proptest::collection::vec(any::<u8>(), 0..80)) {
            let repairer = Repairer::contract_info();
            let result = repairer.fix_contract(b"k", &buf);
            prop_assert_eq!(result.fix_succeeded, result.fixed_bytes.is_some());
            if let Some(fixed) = &result.fixed_bytes {
                prop_assert!(repairer.can_decode(fixed));
            }
        }
    }
}
