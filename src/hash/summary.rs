// Result aggregation module
// Drains the result queue into the final Report and decides overall validity

use crossbeam_channel::Receiver;
use serde::Serialize;
use tracing::{debug, info, trace};

use super::audit::{AuditManifest, AuditStatus, DiffReport};
use super::hash::DigestSet;

/// Everything produced by one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub results: Vec<DigestSet>,
    /// False when any file failed to read, or an audited file changed or went missing
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<DiffReport>,
}

impl Report {
    pub fn files_processed(&self) -> usize {
        self.results.len()
    }

    pub fn files_failed(&self) -> usize {
        self.results.iter().filter(|set| set.is_failed()).count()
    }

    pub fn total_bytes(&self) -> u64 {
        self.results.iter().map(|set| set.bytes).sum()
    }

    /// Files identified by the known-hash database
    pub fn known_files(&self) -> impl Iterator<Item = &DigestSet> + '_ {
        self.results.iter().filter(|set| set.known.is_some())
    }

    pub fn find(&self, path: &str) -> Option<&DigestSet> {
        self.results.iter().find(|set| set.file == path)
    }

    /// Diff the results against a manifest, lowering validity on changed or missing records
    pub fn reconcile(&mut self, manifest: &AuditManifest) {
        let diff = manifest.diff(&self.results);

        info!(
            matched = diff.count(AuditStatus::Match),
            changed = diff.count(AuditStatus::Changed),
            missing = diff.count(AuditStatus::Missing),
            new = diff.count(AuditStatus::New),
            "audit complete"
        );

        if !diff.is_valid() {
            self.valid = false;
        }
        self.audit = Some(diff);
    }
}

/// Consumes DigestSets from the result queue until every worker has finished
///
/// Results are sorted by path once the queue closes, so output does not depend
/// on completion order.
#[derive(Debug, Clone, Default)]
pub struct Aggregator;

impl Aggregator {
    pub fn new() -> Self {
        Aggregator
    }

    /// Block on the queue until it is closed, accumulating the report
    pub fn summarize(&self, results: Receiver<DigestSet>) -> Report {
        let mut report = Report {
            results: Vec::new(),
            valid: true,
            audit: None,
        };

        for set in results.iter() {
            if set.is_failed() {
                report.valid = false;
            }
            trace!(file = %set.file, bytes = set.bytes, "received result");
            report.results.push(set);
        }

        report.results.sort_by(|a, b| a.file.cmp(&b.file));

        debug!(
            files = report.files_processed(),
            failed = report.files_failed(),
            bytes = report.total_bytes(),
            "aggregation complete"
        );

        report
    }
}
