//! Import result classification.
//!
//! Every outcome lands in exactly one bucket, so the four counts always add up
//! to the number of submitted candidates.

use crate::import::candidate::CandidateRecord;
use crate::import::executor::BatchOutcome;
use crate::models::Contact;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A row that needs manual attention, with its original input and the reason.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FailedRecord {
    pub row: usize,
    pub candidate: CandidateRecord,
    pub error: String,
}

/// Terminal aggregate of an import run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub created_records: Vec<Contact>,
    /// Updates that actually changed something; unchanged matches are only counted as skipped.
    pub updated_records: Vec<Contact>,
    pub failed_records: Vec<FailedRecord>,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.skipped + self.failed
    }

    /// Conservation check: every candidate was classified exactly once.
    pub fn is_reconciled(&self, candidates: usize) -> bool {
        self.total() == candidates
    }

    /// Fold in rows rejected before execution.
    ///
    /// `positions[i]` is the upload position of the `i`-th executed candidate;
    /// failed rows are re-numbered to upload positions and kept in row order.
    pub fn with_rejected_rows(mut self, positions: &[usize], rejected: Vec<FailedRecord>) -> Self {
        for failure in &mut self.failed_records {
            if let Some(&row) = positions.get(failure.row) {
                failure.row = row;
            }
        }
        self.failed += rejected.len();
        self.failed_records.extend(rejected);
        self.failed_records.sort_by_key(|failure| failure.row);
        self
    }

    /// Whether any write reached the store, meaning cached views of the scope are stale.
    pub fn store_modified(&self) -> bool {
        self.created + self.updated + self.skipped > 0
    }
}

/// Classify outcomes into created / updated / skipped / failed.
pub fn aggregate(outcomes: Vec<BatchOutcome>) -> ImportSummary {
    let mut summary = ImportSummary::default();

    for outcome in outcomes {
        match outcome.result {
            Ok(success) if !success.was_update => {
                summary.created += 1;
                summary.created_records.push(success.record);
            }
            Ok(success) if success.has_changes => {
                summary.updated += 1;
                summary.updated_records.push(success.record);
            }
            Ok(_) => summary.skipped += 1,
            Err(error) => {
                summary.failed += 1;
                summary.failed_records.push(FailedRecord {
                    row: outcome.row,
                    candidate: outcome.candidate,
                    error,
                });
            }
        }
    }

    summary
}
