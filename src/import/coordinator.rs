//! Import coordination for bulk contact operations.
//!
//! The ContactImporter drives a whole run:
//! 1. Check preconditions (scope, size limit)
//! 2. Normalize natural keys
//! 3. Resolve existing contacts with one bulk lookup
//! 4. Execute chunked upserts
//! 5. Aggregate outcomes into an [`ImportSummary`]

use crate::import::candidate::CandidateRecord;
use crate::import::config::ImportConfig;
use crate::import::executor::{BatchExecutor, ImportProgress, ProgressCallback};
use crate::import::normalize::normalize_email;
use crate::import::resolver::resolve_existing;
use crate::import::store::{ContactStore, StoreError};
use crate::import::summary::{FailedRecord, ImportSummary, aggregate};
use crate::models::Scope;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("an organization scope is required")]
    MissingScope,
    #[error("import of {actual} contacts exceeds the limit of {limit}")]
    TooManyCandidates { limit: usize, actual: usize },
    #[error("failed to resolve existing contacts: {0}")]
    Resolve(#[source] StoreError),
}

/// Entry point for importing candidate contacts into a store.
#[derive(Clone)]
pub struct ContactImporter {
    store: Arc<dyn ContactStore>,
    config: ImportConfig,
}

impl ContactImporter {
    pub fn new(store: Arc<dyn ContactStore>, config: ImportConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &dyn ContactStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> ImportConfig {
        self.config
    }

    /// Check the preconditions of a run without doing any work.
    pub fn validate(&self, scope: Scope, candidates: usize) -> Result<(), ImportError> {
        if scope.is_nil() {
            return Err(ImportError::MissingScope);
        }
        if candidates > self.config.max_candidates {
            return Err(ImportError::TooManyCandidates {
                limit: self.config.max_candidates,
                actual: candidates,
            });
        }
        Ok(())
    }

    /// Merge `candidates` into the scope's contacts.
    ///
    /// Rejects only when a precondition fails or the existing-record lookup
    /// fails; in both cases nothing has been written. Per-record failures are
    /// reported in the summary. Runs to completion once started.
    pub async fn import_candidates(
        &self,
        scope: Scope,
        candidates: &[CandidateRecord],
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<ImportSummary, ImportError> {
        self.validate(scope, candidates.len())?;

        if candidates.is_empty() {
            log::info!("org {}: nothing to import", scope);
            return Ok(ImportSummary::default());
        }

        let started = Instant::now();
        log::info!(
            "org {}: importing {} contacts in chunks of {}",
            scope,
            candidates.len(),
            self.config.chunk_size
        );

        let emails: BTreeSet<String> = candidates
            .iter()
            .map(|candidate| normalize_email(&candidate.email))
            .filter(|email| !email.is_empty())
            .collect();

        let key_map = resolve_existing(self.store(), scope, &emails)
            .await
            .map_err(|err| {
                log::error!("org {}: existing contact lookup failed: {}", scope, err);
                ImportError::Resolve(err)
            })?;

        let outcomes = BatchExecutor::new(self.store(), self.config.chunk_size)
            .execute(scope, candidates, &key_map, on_progress)
            .await;

        let summary = aggregate(outcomes);
        debug_assert!(summary.is_reconciled(candidates.len()));

        log::info!(
            "org {}: import complete in {:.2}s: {} created, {} updated, {} skipped, {} failed",
            scope,
            started.elapsed().as_secs_f64(),
            summary.created,
            summary.updated,
            summary.skipped,
            summary.failed
        );

        Ok(summary)
    }

    /// Import raw uploaded rows, parsing each one on its own.
    ///
    /// Rows that do not parse are reported as failed records at their upload
    /// position; the rest go through [`Self::import_candidates`]. Progress
    /// counts rejected rows as already processed.
    pub async fn import_rows(
        &self,
        scope: Scope,
        rows: &[Value],
        mut on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<ImportSummary, ImportError> {
        self.validate(scope, rows.len())?;

        let mut candidates = Vec::with_capacity(rows.len());
        let mut positions = Vec::with_capacity(rows.len());
        let mut rejected = Vec::new();

        for (row, value) in rows.iter().enumerate() {
            match CandidateRecord::from_json(value) {
                Ok(candidate) => {
                    positions.push(row);
                    candidates.push(candidate);
                }
                Err(error) => {
                    log::warn!("org {}: row {} rejected: {}", scope, row, error);
                    rejected.push(FailedRecord {
                        row,
                        candidate: CandidateRecord::salvage(value),
                        error,
                    });
                }
            }
        }

        let total = rows.len();
        let already_processed = rejected.len();
        let mut forward = |progress: ImportProgress| {
            if let Some(report) = on_progress.as_deref_mut() {
                report(ImportProgress {
                    processed: progress.processed + already_processed,
                    total,
                });
            }
        };

        let summary = self
            .import_candidates(scope, &candidates, Some(&mut forward))
            .await?;

        Ok(summary.with_rejected_rows(&positions, rejected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::executor::tests::FlakyStore;
    use crate::import::memory_store::InMemoryContactStore;
    use crate::import::store::{KeyMap, UpdatedContact};
    use crate::models::{Contact, ContactId};
    use async_trait::async_trait;
    use serde_json::json;
    use uuid::Uuid;

    fn importer(store: Arc<dyn ContactStore>) -> ContactImporter {
        ContactImporter::new(store, ImportConfig::new(50, 1_000))
    }

    fn leads(count: usize) -> Vec<CandidateRecord> {
        (0..count)
            .map(|i| {
                CandidateRecord::new(format!("Lead{i}@Example.com"), format!("Lead {i}"))
                    .with_source(["expo", "webinar"])
            })
            .collect()
    }

    #[tokio::test]
    async fn unchanged_reimport_is_all_skipped() {
        let store = Arc::new(InMemoryContactStore::new());
        let importer = importer(store.clone());
        let scope = Scope::new(Uuid::new_v4());
        let candidates = leads(130);

        let first = importer
            .import_candidates(scope, &candidates, None)
            .await
            .expect("first import");
        assert_eq!(first.created, 130);
        assert!(first.is_reconciled(130));

        let second = importer
            .import_candidates(scope, &candidates, None)
            .await
            .expect("second import");
        assert_eq!(
            (second.created, second.updated, second.skipped, second.failed),
            (0, 0, 130, 0)
        );
        assert_eq!(store.len(), 130);
        assert_eq!(store.lookup_count(), 2);
    }

    #[tokio::test]
    async fn differing_case_matches_existing_record() {
        let store = Arc::new(InMemoryContactStore::new());
        let scope = Scope::new(Uuid::new_v4());
        store
            .seed(scope, &CandidateRecord::new("bob@co.com", "Bob").with_source(["conf"]))
            .expect("seed");

        let summary = importer(store.clone())
            .import_candidates(
                scope,
                &[CandidateRecord::new("Bob@Co.com", "Bob").with_source(["conf"])],
                None,
            )
            .await
            .expect("import");

        assert_eq!(
            (summary.created, summary.updated, summary.skipped, summary.failed),
            (0, 0, 1, 0)
        );
    }

    #[tokio::test]
    async fn real_change_is_reported_as_update() {
        let store = Arc::new(InMemoryContactStore::new());
        let scope = Scope::new(Uuid::new_v4());
        store
            .seed(scope, &CandidateRecord::new("bob@co.com", "Robert").with_source(["conf"]))
            .expect("seed");

        let summary = importer(store.clone())
            .import_candidates(
                scope,
                &[CandidateRecord::new("Bob@Co.com", "Bob").with_source(["conf"])],
                None,
            )
            .await
            .expect("import");

        assert_eq!(
            (summary.created, summary.updated, summary.skipped, summary.failed),
            (0, 1, 0, 0)
        );
        assert_eq!(summary.updated_records[0].name, "Bob");
        assert_eq!(
            store.find_by_email(scope, "bob@co.com").map(|c| c.name),
            Some("Bob".to_string())
        );
    }

    #[tokio::test]
    async fn source_reordering_is_not_a_change() {
        let store = Arc::new(InMemoryContactStore::new());
        let scope = Scope::new(Uuid::new_v4());
        store
            .seed(scope, &CandidateRecord::new("ann@co.com", "Ann").with_source(["a", "b"]))
            .expect("seed");
        let importer = importer(store.clone());

        let reordered = importer
            .import_candidates(
                scope,
                &[CandidateRecord::new("ann@co.com", "Ann").with_source(["b", "a"])],
                None,
            )
            .await
            .expect("import");
        assert_eq!(reordered.skipped, 1);

        let changed = importer
            .import_candidates(
                scope,
                &[CandidateRecord::new("ann@co.com", "Ann").with_source(["a", "c"])],
                None,
            )
            .await
            .expect("import");
        assert_eq!(changed.updated, 1);
    }

    #[tokio::test]
    async fn failing_row_is_isolated_and_named() {
        let store = Arc::new(FlakyStore::new(&["lead6@example.com"]));
        let candidates = leads(100);

        let summary = importer(store.clone())
            .import_candidates(Scope::new(Uuid::new_v4()), &candidates, None)
            .await
            .expect("import");

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.created, 99);
        assert!(summary.is_reconciled(100));
        assert_eq!(summary.failed_records[0].row, 6);
        assert_eq!(summary.failed_records[0].candidate, candidates[6]);
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_ends_at_total() {
        let store = Arc::new(InMemoryContactStore::new());
        let mut seen: Vec<ImportProgress> = Vec::new();
        let mut on_progress = |progress: ImportProgress| seen.push(progress);

        importer(store)
            .import_candidates(Scope::new(Uuid::new_v4()), &leads(101), Some(&mut on_progress))
            .await
            .expect("import");

        assert!(seen.windows(2).all(|w| w[0].processed < w[1].processed));
        assert_eq!(seen.last().map(|p| (p.processed, p.total)), Some((101, 101)));
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn preconditions_reject_before_any_work() {
        let store = Arc::new(InMemoryContactStore::new());
        let importer = ContactImporter::new(store.clone(), ImportConfig::new(50, 2));

        let nil_scope = importer
            .import_candidates(Scope::new(Uuid::nil()), &leads(1), None)
            .await;
        assert!(matches!(nil_scope, Err(ImportError::MissingScope)));

        let too_many = importer
            .import_candidates(Scope::new(Uuid::new_v4()), &leads(3), None)
            .await;
        assert!(matches!(
            too_many,
            Err(ImportError::TooManyCandidates { limit: 2, actual: 3 })
        ));
        assert_eq!(store.lookup_count(), 0);
        assert_eq!(store.write_count(), 0);
    }

    struct UnreachableStore;

    #[async_trait]
    impl ContactStore for UnreachableStore {
        async fn find_ids_by_email(&self, _: Scope, _: &[String]) -> Result<KeyMap, StoreError> {
            Err(StoreError::Rejected("connection refused".into()))
        }

        async fn insert(&self, _: Scope, _: &CandidateRecord) -> Result<Contact, StoreError> {
            panic!("insert must not be reached when resolution fails");
        }

        async fn update_by_id(
            &self,
            _: ContactId,
            _: &CandidateRecord,
        ) -> Result<UpdatedContact, StoreError> {
            panic!("update must not be reached when resolution fails");
        }

        async fn list_contacts(&self, _: Scope) -> Result<Vec<Contact>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn resolver_failure_rejects_the_run() {
        let result = importer(Arc::new(UnreachableStore))
            .import_candidates(Scope::new(Uuid::new_v4()), &leads(5), None)
            .await;

        assert!(matches!(result, Err(ImportError::Resolve(_))));
    }

    #[tokio::test]
    async fn empty_import_does_nothing() {
        let store = Arc::new(InMemoryContactStore::new());
        let summary = importer(store.clone())
            .import_candidates(Scope::new(Uuid::new_v4()), &[], None)
            .await
            .expect("import");

        assert_eq!(summary.total(), 0);
        assert_eq!(store.lookup_count(), 0);
    }

    #[tokio::test]
    async fn malformed_rows_fail_at_their_upload_position() {
        let store = Arc::new(InMemoryContactStore::new());
        let rows = vec![
            json!({ "email": "ok1@co.com", "name": "One" }),
            json!({ "email": "bad@co.com", "name": "Bad", "status": "archived" }),
            json!({ "email": "ok2@co.com", "name": "Two", "source": null }),
            json!({ "email": "not-an-email", "name": "Three" }),
            json!(17),
        ];
        let mut seen: Vec<ImportProgress> = Vec::new();
        let mut on_progress = |progress: ImportProgress| seen.push(progress);

        let summary = ContactImporter::new(store.clone(), ImportConfig::new(2, 100))
            .import_rows(Scope::new(Uuid::new_v4()), &rows, Some(&mut on_progress))
            .await
            .expect("import");

        assert_eq!((summary.created, summary.failed), (2, 3));
        assert!(summary.is_reconciled(rows.len()));
        let failed: Vec<(usize, &str)> = summary
            .failed_records
            .iter()
            .map(|f| (f.row, f.candidate.email.as_str()))
            .collect();
        assert_eq!(failed, vec![(1, "bad@co.com"), (3, "not-an-email"), (4, "")]);
        assert!(summary.failed_records[0].error.contains("archived"));
        assert_eq!(store.len(), 2);
        assert_eq!(seen.last().map(|p| (p.processed, p.total)), Some((5, 5)));
    }
}
