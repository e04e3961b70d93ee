//! Chunked upsert execution with per-record failure isolation.
//!
//! Candidates are split into chunks of `chunk_size`. Every upsert of a chunk is
//! issued concurrently and awaited jointly with [`join_all`], which never
//! short-circuits: each record's success or failure is captured on its own.
//! Chunks run strictly one after another, so at most `chunk_size` writes are
//! in flight against the store at any time.

use crate::import::candidate::CandidateRecord;
use crate::import::change_detection::has_changed;
use crate::import::normalize::looks_like_email;
use crate::import::store::{ContactStore, KeyMap};
use crate::models::{Contact, Scope};
use futures::future::join_all;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Serialize;

/// A successful upsert.
#[derive(Debug, Clone)]
pub struct UpsertSuccess {
    pub record: Contact,
    pub was_update: bool,
    /// Always true for creations. For updates, whether any field materially changed.
    pub has_changes: bool,
}

/// Outcome of one candidate. `result` holds either the stored record or the error text.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// 0-based position of the candidate in the submitted list.
    pub row: usize,
    pub candidate: CandidateRecord,
    pub result: Result<UpsertSuccess, String>,
}

impl BatchOutcome {
    pub fn success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn was_update(&self) -> bool {
        self.result.as_ref().map(|s| s.was_update).unwrap_or(false)
    }

    pub fn has_changes(&self) -> bool {
        self.result.as_ref().map(|s| s.has_changes).unwrap_or(false)
    }

    pub fn error(&self) -> Option<&str> {
        self.result.as_ref().err().map(String::as_str)
    }
}

/// Reported after every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ImportProgress {
    pub processed: usize,
    pub total: usize,
}

/// Cooperative progress callback, invoked synchronously between chunks.
pub type ProgressCallback<'a> = &'a mut (dyn FnMut(ImportProgress) + Send);

pub struct BatchExecutor<'a> {
    store: &'a dyn ContactStore,
    chunk_size: usize,
}

impl<'a> BatchExecutor<'a> {
    pub fn new(store: &'a dyn ContactStore, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Upsert every candidate, returning one outcome per candidate in input order.
    ///
    /// Never fails as a whole: store errors become failed outcomes and the run
    /// continues. No retries are attempted.
    pub async fn execute(
        &self,
        scope: Scope,
        candidates: &[CandidateRecord],
        key_map: &KeyMap,
        mut on_progress: Option<ProgressCallback<'_>>,
    ) -> Vec<BatchOutcome> {
        let total = candidates.len();
        let mut outcomes = Vec::with_capacity(total);

        for (chunk_index, chunk) in candidates.chunks(self.chunk_size).enumerate() {
            let offset = chunk_index * self.chunk_size;
            let pending = chunk
                .iter()
                .enumerate()
                .map(|(i, candidate)| self.upsert_one(scope, offset + i, candidate, key_map));

            let chunk_outcomes = join_all(pending).await;
            let failed = chunk_outcomes.iter().filter(|o| !o.success()).count();
            outcomes.extend(chunk_outcomes);

            log::debug!(
                "org {}: chunk {} done ({}/{} processed, {} failed in chunk)",
                scope,
                chunk_index + 1,
                outcomes.len(),
                total,
                failed
            );

            if let Some(report) = on_progress.as_deref_mut() {
                report(ImportProgress {
                    processed: outcomes.len(),
                    total,
                });
            }
        }

        outcomes
    }

    async fn upsert_one(
        &self,
        scope: Scope,
        row: usize,
        candidate: &CandidateRecord,
        key_map: &KeyMap,
    ) -> BatchOutcome {
        let record = candidate.normalized();
        let result = self.write(scope, &record, key_map).await;

        if let Err(err) = &result {
            log::warn!("org {}: row {} ({}) failed: {}", scope, row, record.email, err);
        }

        BatchOutcome {
            row,
            candidate: candidate.clone(),
            result,
        }
    }

    async fn write(
        &self,
        scope: Scope,
        record: &CandidateRecord,
        key_map: &KeyMap,
    ) -> Result<UpsertSuccess, String> {
        if !looks_like_email(&record.email) {
            return Err(format!("invalid email address '{}'", record.email));
        }
        if record.name.is_empty() {
            return Err("name is required".to_string());
        }

        match key_map.get(&record.email) {
            Some(&id) => {
                // The write happens even when nothing changed; the detector
                // only labels the outcome.
                let updated = self
                    .store
                    .update_by_id(id, record)
                    .await
                    .map_err(|err| err.to_string())?;
                let has_changes = has_changed(&updated.previous, record);

                Ok(UpsertSuccess {
                    record: updated.current,
                    was_update: true,
                    has_changes,
                })
            }
            None => {
                let contact = self
                    .store
                    .insert(scope, record)
                    .await
                    .map_err(|err| err.to_string())?;

                Ok(UpsertSuccess {
                    record: contact,
                    was_update: false,
                    has_changes: true,
                })
            }
        }
    }
}
