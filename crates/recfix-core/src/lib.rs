//! Detection and repair of contract records that no longer decode.
//!
//! A historical encoder wrote the port id meant for field 8 into field 7
//! (a nested message slot), leaving records the canonical decoder rejects.
//! This crate classifies such records from their raw bytes, rebuilds a
//! decodable encoding without losing readable data, and applies the repair
//! across a keyspace in one deterministic pass:
//!
//! ```text
//! migrate ──► detect ──► analyze ──► fixer ──► recfix-wire (raw fields)
//!                 └───────────────────┴──► RecordCodec (pass/fail oracle)
//! ```
//!
//! Everything runs single-threaded and synchronously. Given the same bytes
//! and the same [`RepairConfig`], every node produces identical output.

pub mod analyze;
pub mod codec;
pub mod config;
pub mod detect;
pub mod fixer;
pub mod migrate;
pub mod report;
pub mod schema;
pub mod store;

pub use analyze::{CorruptionPattern, RecordAnalysis};
pub use codec::{ContractInfoCodec, RecordCodec};
pub use config::{MigrationConfig, RepairConfig, ReportConfig};
pub use detect::{ContractState, SchemaPresence};
pub use fixer::FixResult;
pub use migrate::{
    FailureSample, MigrationStats, RepairWitness, migrate_all, migrate_all_with_stats,
};
pub use recfix_error::{RepairError, Result};
pub use report::{AnalysisReport, DryRunReport, analyze_store, dry_run_store};
pub use schema::ContractInfo;
pub use store::{MemoryStore, RecordStore, contract_key};

/// Canonical codec plus field layout: the handle every pipeline stage runs on.
#[derive(Debug, Clone)]
pub struct Repairer<C> {
    codec: C,
    config: RepairConfig,
}

impl<C: RecordCodec> Repairer<C> {
    /// Create a repairer after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::Config`] if the layout is inconsistent.
    pub fn new(codec: C, config: RepairConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { codec, config })
    }

    /// Create a repairer with the default contract record layout.
    pub fn with_default_config(codec: C) -> Self {
        Self {
            codec,
            config: RepairConfig::default(),
        }
    }

    #[must_use]
    pub const fn codec(&self) -> &C {
        &self.codec
    }

    #[must_use]
    pub const fn config(&self) -> &RepairConfig {
        &self.config
    }
}

impl Repairer<ContractInfoCodec> {
    /// Repairer for [`ContractInfo`] records with the default layout.
    #[must_use]
    pub fn contract_info() -> Self {
        Self::with_default_config(ContractInfoCodec)
    }
}

/// Lowercase hex rendering of a record key for logs and reports.
#[must_use]
pub fn key_hex(key: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(key.len() * 2);
    for byte in key {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
