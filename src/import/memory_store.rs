//! In-process contact store.
//!
//! Mirrors the Postgres store's semantics (per-scope email uniqueness, row
//! replacement on update) behind a single mutex. Used by tests and local runs
//! without a database.

use crate::import::candidate::CandidateRecord;
use crate::import::store::{ContactStore, KeyMap, StoreError, UpdatedContact};
use crate::models::{Contact, ContactId, Scope};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
struct Inner {
    next_id: ContactId,
    contacts: BTreeMap<ContactId, Contact>,
}

#[derive(Default)]
pub struct InMemoryContactStore {
    inner: Mutex<Inner>,
    lookups: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a contact directly, bypassing the import pipeline.
    pub fn seed(&self, scope: Scope, record: &CandidateRecord) -> Result<Contact, StoreError> {
        let mut inner = self.inner.lock();
        insert_locked(&mut inner, scope, &record.normalized())
    }

    pub fn get(&self, id: ContactId) -> Option<Contact> {
        self.inner.lock().contacts.get(&id).cloned()
    }

    pub fn find_by_email(&self, scope: Scope, email: &str) -> Option<Contact> {
        self.inner
            .lock()
            .contacts
            .values()
            .find(|c| c.org_id == scope.org_id() && c.email == email)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of bulk lookups served so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Number of insert/update calls that reached the store, successful or not.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

fn insert_locked(inner: &mut Inner, scope: Scope, record: &CandidateRecord) -> Result<Contact, StoreError> {
    let taken = inner
        .contacts
        .values()
        .any(|c| c.org_id == scope.org_id() && c.email == record.email);
    if taken {
        return Err(StoreError::DuplicateEmail(record.email.clone()));
    }

    inner.next_id += 1;
    let now = Utc::now();
    let contact = Contact {
        id: inner.next_id,
        org_id: scope.org_id(),
        email: record.email.clone(),
        name: record.name.clone(),
        phone: record.phone.clone(),
        company: record.company.clone(),
        title: record.title.clone(),
        status: record.status,
        sentiment: record.sentiment,
        notes: record.notes.clone(),
        source: record.source.clone(),
        created_at: now,
        updated_at: now,
    };
    inner.contacts.insert(contact.id, contact.clone());
    Ok(contact)
}

#[async_trait]
impl ContactStore for InMemoryContactStore {
    async fn find_ids_by_email(&self, scope: Scope, emails: &[String]) -> Result<KeyMap, StoreError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.lock();
        Ok(inner
            .contacts
            .values()
            .filter(|c| c.org_id == scope.org_id() && emails.contains(&c.email))
            .map(|c| (c.email.clone(), c.id))
            .collect())
    }

    async fn insert(&self, scope: Scope, record: &CandidateRecord) -> Result<Contact, StoreError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();
        insert_locked(&mut inner, scope, record)
    }

    async fn update_by_id(
        &self,
        id: ContactId,
        record: &CandidateRecord,
    ) -> Result<UpdatedContact, StoreError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();

        let previous = inner.contacts.get(&id).cloned().ok_or(StoreError::NotFound(id))?;
        let conflict = inner.contacts.values().any(|c| {
            c.id != id && c.org_id == previous.org_id && c.email == record.email
        });
        if conflict {
            return Err(StoreError::DuplicateEmail(record.email.clone()));
        }

        let current = Contact {
            email: record.email.clone(),
            name: record.name.clone(),
            phone: record.phone.clone(),
            company: record.company.clone(),
            title: record.title.clone(),
            status: record.status,
            sentiment: record.sentiment,
            notes: record.notes.clone(),
            source: record.source.clone(),
            updated_at: Utc::now(),
            ..previous.clone()
        };
        inner.contacts.insert(id, current.clone());

        Ok(UpdatedContact { previous, current })
    }

    async fn list_contacts(&self, scope: Scope) -> Result<Vec<Contact>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .contacts
            .values()
            .rev()
            .filter(|c| c.org_id == scope.org_id())
            .cloned()
            .collect())
    }
}
