//! Persistence seam consumed by the import pipeline.

use crate::import::candidate::CandidateRecord;
use crate::models::{Contact, ContactId, Scope};
use async_trait::async_trait;
use rocket_db_pools::sqlx;
use std::collections::HashMap;
use thiserror::Error;

/// Normalized email → existing contact id, for one scope and one run.
pub type KeyMap = HashMap<String, ContactId>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("contact {0} not found")]
    NotFound(ContactId),
    #[error("a contact with email '{0}' already exists")]
    DuplicateEmail(String),
    #[error("write rejected: {0}")]
    Rejected(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of an update: the row before and after the write.
#[derive(Debug, Clone)]
pub struct UpdatedContact {
    pub previous: Contact,
    pub current: Contact,
}

/// Keyed contact store reachable by bulk read, insert and update.
///
/// Implementations enforce email uniqueness per scope and serialize
/// concurrent writes to the same id.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Bulk lookup of existing ids for the given normalized emails.
    async fn find_ids_by_email(&self, scope: Scope, emails: &[String]) -> Result<KeyMap, StoreError>;

    async fn insert(&self, scope: Scope, record: &CandidateRecord) -> Result<Contact, StoreError>;

    /// Overwrite the editable fields of `id`, returning the pre-update row as well.
    async fn update_by_id(
        &self,
        id: ContactId,
        record: &CandidateRecord,
    ) -> Result<UpdatedContact, StoreError>;

    async fn list_contacts(&self, scope: Scope) -> Result<Vec<Contact>, StoreError>;
}
