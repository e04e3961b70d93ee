//! Background import jobs.
//!
//! Large uploads are imported off the request path; the registry keeps each
//! job's progress (fed from the executor's per-chunk callback) and its final
//! summary so clients can poll. Finished jobs are dropped once they are older
//! than the retention window (`IMPORT_JOB_RETENTION_SECS`, default one hour).

use crate::import::config::env_usize;
use crate::import::coordinator::ContactImporter;
use crate::import::executor::ImportProgress;
use crate::import::summary::ImportSummary;
use crate::models::Scope;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImportJobStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
    pub id: Uuid,
    #[serde(skip)]
    pub scope: Scope,
    pub status: ImportJobStatus,
    pub processed: usize,
    pub total: usize,
    pub summary: Option<ImportSummary>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Finished jobs stay pollable this long when no override is configured.
pub const DEFAULT_JOB_RETENTION_SECS: usize = 3_600;

/// Shared, cloneable registry of import jobs.
#[derive(Clone)]
pub struct ImportJobRegistry {
    jobs: Arc<DashMap<Uuid, ImportJob>>,
    retention: Duration,
}

impl Default for ImportJobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportJobRegistry {
    pub fn new() -> Self {
        let secs = env_usize("IMPORT_JOB_RETENTION_SECS", DEFAULT_JOB_RETENTION_SECS);
        Self::with_retention(Duration::from_secs(secs as u64))
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            retention,
        }
    }

    /// Drop finished jobs older than the retention window. Running jobs are kept.
    pub fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.jobs.len();
        self.jobs.retain(|_, job| match job.finished_at {
            // A clock step backwards yields a negative age; keep the job then.
            Some(finished_at) => (now - finished_at)
                .to_std()
                .map(|age| age < self.retention)
                .unwrap_or(true),
            None => true,
        });
        let evicted = before.saturating_sub(self.jobs.len());
        if evicted > 0 {
            log::debug!("evicted {} finished import jobs", evicted);
        }
        evicted
    }

    /// Register a running job for `total` candidates and return its id.
    pub fn start(&self, scope: Scope, total: usize) -> Uuid {
        self.evict_expired();
        let id = Uuid::new_v4();
        self.jobs.insert(
            id,
            ImportJob {
                id,
                scope,
                status: ImportJobStatus::Running,
                processed: 0,
                total,
                summary: None,
                error: None,
                started_at: Utc::now(),
                finished_at: None,
            },
        );
        id
    }

    pub fn record_progress(&self, id: Uuid, progress: ImportProgress) {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            job.processed = progress.processed;
            job.total = progress.total;
        }
    }

    pub fn complete(&self, id: Uuid, summary: ImportSummary) {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            job.status = ImportJobStatus::Completed;
            job.processed = summary.total();
            job.summary = Some(summary);
            job.finished_at = Some(Utc::now());
        }
    }

    pub fn fail(&self, id: Uuid, error: String) {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            job.status = ImportJobStatus::Failed;
            job.error = Some(error);
            job.finished_at = Some(Utc::now());
        }
    }

    /// Fetch a job, hiding jobs that belong to another scope.
    pub fn get(&self, scope: Scope, id: Uuid) -> Option<ImportJob> {
        self.evict_expired();
        self.jobs
            .get(&id)
            .filter(|job| job.scope == scope)
            .map(|job| job.value().clone())
    }

    /// Spawn `rows` as a background import and return the job id.
    ///
    /// `on_finished` runs after a successful import, e.g. to invalidate cached
    /// views. A panicking import marks the job failed.
    pub fn spawn<F>(
        &self,
        importer: ContactImporter,
        scope: Scope,
        rows: Vec<Value>,
        on_finished: F,
    ) -> Uuid
    where
        F: FnOnce(&ImportSummary) + Send + 'static,
    {
        let id = self.start(scope, rows.len());
        let registry = self.clone();

        let handle = tokio::spawn(async move {
            let progress_registry = registry.clone();
            let mut on_progress =
                move |progress: ImportProgress| progress_registry.record_progress(id, progress);

            match importer
                .import_rows(scope, &rows, Some(&mut on_progress))
                .await
            {
                Ok(summary) => {
                    on_finished(&summary);
                    registry.complete(id, summary);
                }
                Err(err) => {
                    log::error!("import job {} failed: {}", id, err);
                    registry.fail(id, err.to_string());
                }
            }
        });

        let watcher = self.clone();
        tokio::spawn(async move {
            if let Err(err) = handle.await {
                log::error!("import job {} aborted: {}", id, err);
                watcher.fail(id, format!("import task aborted: {err}"));
            }
        });

        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::candidate::CandidateRecord;
    use crate::import::config::ImportConfig;
    use crate::import::memory_store::InMemoryContactStore;
    use crate::import::store::{ContactStore, KeyMap, StoreError, UpdatedContact};
    use crate::models::{Contact, ContactId};
    use async_trait::async_trait;
    use serde_json::json;

    async fn wait_until_finished(registry: &ImportJobRegistry, scope: Scope, id: Uuid) -> ImportJob {
        let mut job = registry.get(scope, id).expect("job registered");
        for _ in 0..100 {
            if job.status != ImportJobStatus::Running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            job = registry.get(scope, id).expect("job registered");
        }
        job
    }

    #[test]
    fn jobs_are_scoped() {
        let registry = ImportJobRegistry::new();
        let scope = Scope::new(Uuid::new_v4());
        let id = registry.start(scope, 10);

        registry.record_progress(id, ImportProgress { processed: 5, total: 10 });

        let job = registry.get(scope, id).expect("job visible to its scope");
        assert_eq!(job.processed, 5);
        assert_eq!(job.status, ImportJobStatus::Running);
        assert!(registry.get(Scope::new(Uuid::new_v4()), id).is_none());
    }

    #[test]
    fn finished_jobs_are_evicted_after_retention() {
        let registry = ImportJobRegistry::with_retention(Duration::ZERO);
        let scope = Scope::new(Uuid::new_v4());
        let done = registry.start(scope, 1);
        let failed = registry.start(scope, 1);
        let running = registry.start(scope, 1);

        registry.complete(done, Default::default());
        registry.fail(failed, "boom".to_string());

        assert!(registry.get(scope, done).is_none());
        assert!(registry.get(scope, failed).is_none());
        assert!(registry.get(scope, running).is_some());
        assert_eq!(registry.jobs.len(), 1);
    }

    #[test]
    fn finished_jobs_are_kept_within_retention() {
        let registry = ImportJobRegistry::with_retention(Duration::from_secs(3_600));
        let scope = Scope::new(Uuid::new_v4());
        let id = registry.start(scope, 1);
        registry.complete(id, Default::default());

        assert_eq!(registry.evict_expired(), 0);
        let job = registry.get(scope, id).expect("still pollable");
        assert_eq!(job.status, ImportJobStatus::Completed);
    }

    #[tokio::test]
    async fn spawned_job_completes_with_summary() {
        let registry = ImportJobRegistry::new();
        let store = Arc::new(InMemoryContactStore::new());
        let importer = ContactImporter::new(store.clone(), ImportConfig::new(2, 100));
        let scope = Scope::new(Uuid::new_v4());
        let rows = vec![
            json!({ "email": "a@co.com", "name": "A" }),
            json!({ "email": "b@co.com", "name": "B", "status": "archived" }),
            json!({ "email": "c@co.com", "name": "C" }),
        ];

        let id = registry.spawn(importer, scope, rows, |_| {});
        let job = wait_until_finished(&registry, scope, id).await;

        assert_eq!(job.status, ImportJobStatus::Completed);
        assert_eq!((job.processed, job.total), (3, 3));
        let summary = job.summary.expect("summary recorded");
        assert_eq!((summary.created, summary.failed), (2, 1));
        assert_eq!(summary.failed_records[0].row, 1);
        assert_eq!(store.len(), 2);
    }

    struct PanickingStore;

    #[async_trait]
    impl ContactStore for PanickingStore {
        async fn find_ids_by_email(&self, _: Scope, _: &[String]) -> Result<KeyMap, StoreError> {
            panic!("lookup blew up");
        }

        async fn insert(&self, _: Scope, _: &CandidateRecord) -> Result<Contact, StoreError> {
            Err(StoreError::Rejected("unreachable".into()))
        }

        async fn update_by_id(
            &self,
            id: ContactId,
            _: &CandidateRecord,
        ) -> Result<UpdatedContact, StoreError> {
            Err(StoreError::NotFound(id))
        }

        async fn list_contacts(&self, _: Scope) -> Result<Vec<Contact>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn panicking_job_is_marked_failed() {
        let registry = ImportJobRegistry::new();
        let importer = ContactImporter::new(Arc::new(PanickingStore), ImportConfig::new(2, 100));
        let scope = Scope::new(Uuid::new_v4());

        let id = registry.spawn(
            importer,
            scope,
            vec![json!({ "email": "a@co.com", "name": "A" })],
            |_| {},
        );
        let job = wait_until_finished(&registry, scope, id).await;

        assert_eq!(job.status, ImportJobStatus::Failed);
        assert!(job.error.unwrap_or_default().contains("aborted"));
        assert!(job.finished_at.is_some());
    }
}
