//! Read-only analyze and dry-run passes over a store.
//!
//! Both share the detection, analysis, and repair code used by
//! [`crate::migrate_all`] but never write. Example keys and failure entries
//! are bounded by [`ReportConfig::sample_limit`] per bucket.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use recfix_error::Result;
use serde::Serialize;
use tracing::info;

use crate::codec::RecordCodec;
use crate::config::ReportConfig;
use crate::migrate::FailureSample;
use crate::store::RecordStore;
use crate::{Repairer, key_hex};

const COMPONENT: &str = "report";

/// Per-state and per-pattern tabulation of a keyspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    pub total: u64,
    pub by_state: BTreeMap<String, u64>,
    /// Undecodable records only.
    pub by_pattern: BTreeMap<String, u64>,
    pub fixable: u64,
    /// Example keys (hex) per pattern.
    pub examples: BTreeMap<String, Vec<String>>,
}

impl AnalysisReport {
    /// Records the canonical decoder rejects.
    #[must_use]
    pub fn corrupted(&self) -> u64 {
        self.by_pattern.values().sum()
    }

    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "records analyzed: {}", self.total);
        let _ = writeln!(out, "by state:");
        for (state, count) in &self.by_state {
            let _ = writeln!(out, "  {state:<20} {count}");
        }
        if !self.by_pattern.is_empty() {
            let _ = writeln!(out, "by corruption pattern:");
            for (pattern, count) in &self.by_pattern {
                let _ = writeln!(out, "  {pattern:<22} {count}");
                if let Some(keys) = self.examples.get(pattern) {
                    let _ = writeln!(out, "    examples: {}", keys.join(", "));
                }
            }
        }
        let _ = writeln!(out, "fixable: {} of {} corrupted", self.fixable, self.corrupted());
        out
    }
}

/// Projected outcome of a migration, computed in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DryRunReport {
    pub total: u64,
    /// Records that already decode and would be skipped.
    pub decodable: u64,
    pub projected_fixed: u64,
    pub projected_failed: u64,
    pub fixed_by_pattern: BTreeMap<String, u64>,
    pub failed_by_pattern: BTreeMap<String, u64>,
    /// Bounded per pattern.
    pub failures: Vec<FailureSample>,
}

impl DryRunReport {
    /// Share of undecodable records the migration would repair, in `0.0..=1.0`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        let attempted = self.projected_fixed + self.projected_failed;
        if attempted == 0 {
            1.0
        } else {
            self.projected_fixed as f64 / attempted as f64
        }
    }

    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "records scanned: {}", self.total);
        let _ = writeln!(out, "already decodable: {}", self.decodable);
        let _ = writeln!(
            out,
            "would fix: {}  would fail: {}  success rate: {:.1}%",
            self.projected_fixed,
            self.projected_failed,
            self.success_rate() * 100.0
        );
        for (pattern, count) in &self.fixed_by_pattern {
            let _ = writeln!(out, "  fixed   {pattern:<22} {count}");
        }
        for (pattern, count) in &self.failed_by_pattern {
            let _ = writeln!(out, "  failed  {pattern:<22} {count}");
        }
        if !self.failures.is_empty() {
            let _ = writeln!(out, "failures:");
            for failure in &self.failures {
                let pattern = failure.pattern.map_or("none", |p| p.as_str());
                let _ = writeln!(out, "  key {}", failure.key_hex);
                let _ = writeln!(out, "    pattern:  {pattern}");
                let _ = writeln!(out, "    strategy: {}", failure.strategy);
                let _ = writeln!(out, "    error:    {}", failure.error);
            }
        }
        out
    }
}

fn for_each_record<S, F>(store: &S, prefix: &[u8], mut visit: F) -> Result<()>
where
    S: RecordStore + ?Sized,
    F: FnMut(&[u8], &[u8]),
{
    let mut cursor: Option<Vec<u8>> = None;
    while let Some((key, value)) = store.next_in_prefix(prefix, cursor.as_deref())? {
        visit(&key, &value);
        cursor = Some(key);
    }
    Ok(())
}

/// Classify every record under `config.key_prefix` without writing.
///
/// # Errors
///
/// Returns store errors from iteration.
pub fn analyze_store<S, C>(
    store: &S,
    repairer: &Repairer<C>,
    config: &ReportConfig,
) -> Result<AnalysisReport>
where
    S: RecordStore + ?Sized,
    C: RecordCodec,
{
    let mut report = AnalysisReport::default();
    for_each_record(store, &config.key_prefix, |key, value| {
        let analysis = repairer.analyze(key, value);
        report.total += 1;
        *report
            .by_state
            .entry(analysis.state.as_str().to_owned())
            .or_default() += 1;

        if let Some(pattern) = analysis.pattern {
            let name = pattern.as_str().to_owned();
            *report.by_pattern.entry(name.clone()).or_default() += 1;
            if analysis.fixable {
                report.fixable += 1;
            }
            let examples = report.examples.entry(name).or_default();
            if examples.len() < config.sample_limit {
                examples.push(key_hex(key));
            }
        }
    })?;

    info!(
        component = COMPONENT,
        total = report.total,
        corrupted = report.corrupted(),
        fixable = report.fixable,
        "analysis complete"
    );
    Ok(report)
}

/// Run the fixer over every record in memory and project the outcome.
///
/// # Errors
///
/// Returns store errors from iteration.
pub fn dry_run_store<S, C>(
    store: &S,
    repairer: &Repairer<C>,
    config: &ReportConfig,
) -> Result<DryRunReport>
where
    S: RecordStore + ?Sized,
    C: RecordCodec,
{
    let mut report = DryRunReport::default();
    let mut failures_per_pattern: BTreeMap<String, usize> = BTreeMap::new();

    for_each_record(store, &config.key_prefix, |key, value| {
        report.total += 1;
        if repairer.can_decode(value) {
            report.decodable += 1;
            return;
        }

        let result = repairer.fix_contract(key, value);
        let name = result
            .pattern
            .map_or("none", |pattern| pattern.as_str())
            .to_owned();
        if result.fix_succeeded {
            report.projected_fixed += 1;
            *report.fixed_by_pattern.entry(name).or_default() += 1;
            return;
        }

        report.projected_failed += 1;
        *report.failed_by_pattern.entry(name.clone()).or_default() += 1;
        let kept = failures_per_pattern.entry(name).or_default();
        if *kept < config.sample_limit {
            *kept += 1;
            report.failures.push(FailureSample {
                key_hex: key_hex(key),
                pattern: result.pattern,
                strategy: result.strategy().to_owned(),
                error: result
                    .error
                    .as_ref()
                    .map_or_else(String::new, ToString::to_string),
            });
        }
    })?;

    info!(
        component = COMPONENT,
        total = report.total,
        projected_fixed = report.projected_fixed,
        projected_failed = report.projected_failed,
        "dry run complete"
    );
    Ok(report)
}
