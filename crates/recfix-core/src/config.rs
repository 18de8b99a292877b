//! Repair, migration, and reporting knobs.
//!
//! Every config is plain serde data with a `Default` matching the stored
//! record schema, so callers can load overrides from JSON and validate them
//! before any record is touched.

use recfix_error::{RepairError, Result};
use serde::{Deserialize, Serialize};

use crate::schema::{
    FIELD_CODE_ID, FIELD_EXTENSION, FIELD_IBC2_PORT_ID, MAX_FIELD_NUMBER, REQUIRED_FIELDS,
};

/// Default number of bytes skipped after an invalid-wire-type tag during
/// byte-scan recovery. Tuned for the historical corruption shape only.
pub const DEFAULT_HEURISTIC_SKIP_LEN: usize = 10;

/// Upper bound on `heuristic_skip_len`; no stored record comes close to it.
pub const MAX_HEURISTIC_SKIP_LEN: usize = 64 * 1024;

/// Default key prefix of contract records.
pub const DEFAULT_KEY_PREFIX: u8 = 0x02;

pub const DEFAULT_PROGRESS_EVERY_RECORDS: u64 = 1000;
pub const DEFAULT_PROGRESS_EVERY_FIXES: u64 = 100;
pub const DEFAULT_WITNESS_LIMIT: usize = 64;
pub const DEFAULT_SAMPLE_LIMIT: usize = 5;

/// Field layout and policy for the analyzer and fixer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Schema-critical field that must be present and length-delimited (F7).
    pub f7_field: u32,
    /// Schema-critical field that must be present (F8).
    pub f8_field: u32,
    /// Identity field assumed to be a varint when re-emitting recovered data.
    pub lead_identity_field: u32,
    /// Fields whose absence makes a record unfixable.
    pub required_fields: Vec<u32>,
    /// Rebuilds walk field numbers `1..=max_field_number`.
    pub max_field_number: u32,
    /// Bytes skipped after an invalid-wire-type tag in byte-scan recovery.
    pub heuristic_skip_len: usize,
    /// Caller policy: attempt repair of records missing required fields.
    pub treat_missing_required_as_fixable: bool,
    /// Caller policy: attempt repair of unclassified corruption.
    pub treat_unknown_as_fixable: bool,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            f7_field: FIELD_EXTENSION,
            f8_field: FIELD_IBC2_PORT_ID,
            lead_identity_field: FIELD_CODE_ID,
            required_fields: REQUIRED_FIELDS.to_vec(),
            max_field_number: MAX_FIELD_NUMBER,
            heuristic_skip_len: DEFAULT_HEURISTIC_SKIP_LEN,
            treat_missing_required_as_fixable: false,
            treat_unknown_as_fixable: false,
        }
    }
}

impl RepairConfig {
    /// Check the layout for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.max_field_number == 0 {
            return Err(RepairError::config("max_field_number must be at least 1"));
        }
        if self.f7_field == self.f8_field {
            return Err(RepairError::config(format!(
                "f7_field and f8_field must differ (both {})",
                self.f7_field
            )));
        }
        if self.lead_identity_field == self.f7_field || self.lead_identity_field == self.f8_field
        {
            return Err(RepairError::config(format!(
                "lead_identity_field {} overlaps f7_field/f8_field",
                self.lead_identity_field
            )));
        }
        if self.heuristic_skip_len > MAX_HEURISTIC_SKIP_LEN {
            return Err(RepairError::config(format!(
                "heuristic_skip_len {} exceeds {MAX_HEURISTIC_SKIP_LEN}",
                self.heuristic_skip_len
            )));
        }
        let in_range = |n: u32| (1..=self.max_field_number).contains(&n);
        for (name, number) in [
            ("f7_field", self.f7_field),
            ("f8_field", self.f8_field),
            ("lead_identity_field", self.lead_identity_field),
        ] {
            if !in_range(number) {
                return Err(RepairError::config(format!(
                    "{name} {number} outside 1..={}",
                    self.max_field_number
                )));
            }
        }
        if let Some(bad) = self.required_fields.iter().find(|&&n| !in_range(n)) {
            return Err(RepairError::config(format!(
                "required field {bad} outside 1..={}",
                self.max_field_number
            )));
        }
        Ok(())
    }

    /// Load and validate a config from JSON. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::Json`] for malformed JSON and
    /// [`RepairError::Config`] for invalid values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

/// Knobs for the keyspace migration pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Key prefix under which every record lives.
    pub key_prefix: Vec<u8>,
    /// Emit a progress line every this many scanned records.
    pub progress_every_records: u64,
    /// Emit a progress line every this many fixed records.
    pub progress_every_fixes: u64,
    /// Maximum repair witnesses and failure samples retained in stats.
    pub witness_limit: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            key_prefix: vec![DEFAULT_KEY_PREFIX],
            progress_every_records: DEFAULT_PROGRESS_EVERY_RECORDS,
            progress_every_fixes: DEFAULT_PROGRESS_EVERY_FIXES,
            witness_limit: DEFAULT_WITNESS_LIMIT,
        }
    }
}

impl MigrationConfig {
    /// # Errors
    ///
    /// Returns [`RepairError::Config`] for zero progress intervals.
    pub fn validate(&self) -> Result<()> {
        if self.progress_every_records == 0 || self.progress_every_fixes == 0 {
            return Err(RepairError::config("progress intervals must be non-zero"));
        }
        Ok(())
    }

    /// Load and validate a config from JSON. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::Json`] or [`RepairError::Config`].
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

/// Knobs for the read-only analyze and dry-run reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Key prefix under which every record lives.
    pub key_prefix: Vec<u8>,
    /// Example record keys kept per bucket.
    pub sample_limit: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            key_prefix: vec![DEFAULT_KEY_PREFIX],
            sample_limit: DEFAULT_SAMPLE_LIMIT,
        }
    }
}
