//! Single-pass keyspace migration.
//!
//! Walks every record under the configured prefix in key order. Records that
//! decode are skipped without a write; the rest go through
//! [`Repairer::fix_contract`] and are overwritten in place only when the
//! repair verified. Nothing is ever deleted or partially written.

use recfix_error::{RepairError, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::analyze::CorruptionPattern;
use crate::codec::RecordCodec;
use crate::config::MigrationConfig;
use crate::detect::ContractState;
use crate::fixer::FixResult;
use crate::store::RecordStore;
use crate::{Repairer, key_hex};

const COMPONENT: &str = "migrate";

/// Evidence of one in-place repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairWitness {
    pub key_hex: String,
    pub pattern: CorruptionPattern,
    /// `sha256:<hex>` of the bytes before repair.
    pub original_digest: String,
    /// `sha256:<hex>` of the bytes written back.
    pub fixed_digest: String,
    pub original_len: usize,
    pub fixed_len: usize,
    pub final_state: ContractState,
}

/// A record the pass could not repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureSample {
    pub key_hex: String,
    pub pattern: Option<CorruptionPattern>,
    pub strategy: String,
    pub error: String,
}

/// Counters threaded through the scan.
///
/// `scanned == skipped + fixed + failed` holds after every record.
/// `failures` and `witnesses` are bounded by
/// [`MigrationConfig::witness_limit`]; the counters are not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationStats {
    pub scanned: u64,
    pub skipped: u64,
    pub fixed: u64,
    pub failed: u64,
    pub failures: Vec<FailureSample>,
    pub witnesses: Vec<RepairWitness>,
}

impl MigrationStats {
    /// Whether every scanned record now decodes.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failed == 0
    }

    fn record_fix(&mut self, witness: RepairWitness, limit: usize) {
        self.fixed += 1;
        if self.witnesses.len() < limit {
            self.witnesses.push(witness);
        }
    }

    fn record_failure(&mut self, sample: FailureSample, limit: usize) {
        self.failed += 1;
        if self.failures.len() < limit {
            self.failures.push(sample);
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(bytes))
}

/// Repair every undecodable record under `config.key_prefix`.
///
/// # Errors
///
/// Returns store errors immediately, aborting the scan. After a complete
/// scan, returns [`RepairError::MigrationIncomplete`] if any record could
/// not be repaired; those records keep their original bytes.
pub fn migrate_all<S, C>(
    store: &mut S,
    repairer: &Repairer<C>,
    config: &MigrationConfig,
) -> Result<MigrationStats>
where
    S: RecordStore + ?Sized,
    C: RecordCodec,
{
    let (stats, outcome) = migrate_all_with_stats(store, repairer, config);
    outcome.map(|()| stats)
}

/// Like [`migrate_all`], but returns the stats even when the pass fails.
///
/// On a store error the stats cover the records handled before the abort.
pub fn migrate_all_with_stats<S, C>(
    store: &mut S,
    repairer: &Repairer<C>,
    config: &MigrationConfig,
) -> (MigrationStats, Result<()>)
where
    S: RecordStore + ?Sized,
    C: RecordCodec,
{
    let mut stats = MigrationStats::default();
    if let Err(err) = config.validate() {
        return (stats, Err(err));
    }
    let outcome = scan(store, repairer, config, &mut stats);
    (stats, outcome)
}

fn scan<S, C>(
    store: &mut S,
    repairer: &Repairer<C>,
    config: &MigrationConfig,
    stats: &mut MigrationStats,
) -> Result<()>
where
    S: RecordStore + ?Sized,
    C: RecordCodec,
{
    info!(
        component = COMPONENT,
        prefix = %key_hex(&config.key_prefix),
        "starting record migration"
    );

    let mut cursor: Option<Vec<u8>> = None;
    while let Some((key, value)) = store.next_in_prefix(&config.key_prefix, cursor.as_deref())? {
        stats.scanned += 1;

        if repairer.can_decode(&value) {
            stats.skipped += 1;
        } else {
            let result = repairer.fix_contract(&key, &value);
            match result.fixed_bytes.as_deref() {
                Some(fixed) if result.fix_succeeded => {
                    store.set(&key, fixed)?;
                    stats.record_fix(witness(&key, &value, fixed, &result), config.witness_limit);
                    if stats.fixed % config.progress_every_fixes == 0 {
                        info!(
                            component = COMPONENT,
                            fixed = stats.fixed,
                            scanned = stats.scanned,
                            "repair progress"
                        );
                    }
                }
                _ => {
                    let sample = failure_sample(&key, &result);
                    warn!(
                        component = COMPONENT,
                        key = %sample.key_hex,
                        pattern = ?sample.pattern,
                        error = %sample.error,
                        "record left unrepaired"
                    );
                    stats.record_failure(sample, config.witness_limit);
                }
            }
        }

        if stats.scanned % config.progress_every_records == 0 {
            info!(
                component = COMPONENT,
                scanned = stats.scanned,
                skipped = stats.skipped,
                fixed = stats.fixed,
                failed = stats.failed,
                "scan progress"
            );
        }
        cursor = Some(key);
    }

    info!(
        component = COMPONENT,
        scanned = stats.scanned,
        skipped = stats.skipped,
        fixed = stats.fixed,
        failed = stats.failed,
        "record migration finished"
    );

    if stats.failed > 0 {
        error!(
            component = COMPONENT,
            failed = stats.failed,
            "records remain unrepaired; operator intervention required"
        );
        return Err(RepairError::MigrationIncomplete {
            failed: stats.failed,
            scanned: stats.scanned,
        });
    }
    Ok(())
}

fn witness(key: &[u8], original: &[u8], fixed: &[u8], result: &FixResult) -> RepairWitness {
    RepairWitness {
        key_hex: key_hex(key),
        pattern: result.pattern.unwrap_or(CorruptionPattern::Unknown),
        original_digest: sha256_hex(original),
        fixed_digest: sha256_hex(fixed),
        original_len: original.len(),
        fixed_len: fixed.len(),
        final_state: result.final_state,
    }
}

fn failure_sample(key: &[u8], result: &FixResult) -> FailureSample {
    FailureSample {
        key_hex: key_hex(key),
        pattern: result.pattern,
        strategy: result.strategy().to_owned(),
        error: result
            .error
            .as_ref()
            .map_or_else(|| "repair produced no bytes".to_owned(), ToString::to_string),
    }
}
