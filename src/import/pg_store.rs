//! PostgreSQL-backed contact store.
//!
//! Bulk lookups use `= ANY($n)` so resolving a whole import costs one round
//! trip. Updates lock the target row so the pre-update state handed back to
//! the change detector is exactly the row that was overwritten.

use crate::import::candidate::CandidateRecord;
use crate::import::store::{ContactStore, KeyMap, StoreError, UpdatedContact};
use crate::models::{Contact, ContactId, Scope};
use async_trait::async_trait;
use rocket_db_pools::sqlx::{self, PgPool};

const CONTACT_COLUMNS: &str = "id, org_id, email, name, phone, company, title, status, sentiment, notes, source, created_at, updated_at";

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgContactStore {
    pool: PgPool,
}

impl PgContactStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_write_error(err: sqlx::Error, email: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err)
            if db_err.code().map(|code| code == UNIQUE_VIOLATION).unwrap_or(false) =>
        {
            StoreError::DuplicateEmail(email.to_string())
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl ContactStore for PgContactStore {
    async fn find_ids_by_email(&self, scope: Scope, emails: &[String]) -> Result<KeyMap, StoreError> {
        if emails.is_empty() {
            return Ok(KeyMap::new());
        }

        let rows = sqlx::query_as::<_, (String, ContactId)>(
            "SELECT email, id FROM contacts WHERE org_id = $1 AND email = ANY($2)",
        )
        .bind(scope.org_id())
        .bind(emails)
        .fetch_all(&self.pool)
        .await?;

        log::trace!(
            "resolved {} of {} emails for org {}",
            rows.len(),
            emails.len(),
            scope
        );
        Ok(rows.into_iter().collect())
    }

    async fn insert(&self, scope: Scope, record: &CandidateRecord) -> Result<Contact, StoreError> {
        let sql = format!(
            r#"INSERT INTO contacts (org_id, email, name, phone, company, title, status, sentiment, notes, source)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING {CONTACT_COLUMNS}"#
        );

        sqlx::query_as::<_, Contact>(&sql)
            .bind(scope.org_id())
            .bind(&record.email)
            .bind(&record.name)
            .bind(&record.phone)
            .bind(&record.company)
            .bind(&record.title)
            .bind(record.status)
            .bind(record.sentiment)
            .bind(&record.notes)
            .bind(&record.source)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| map_write_error(err, &record.email))
    }

    async fn update_by_id(
        &self,
        id: ContactId,
        record: &CandidateRecord,
    ) -> Result<UpdatedContact, StoreError> {
        let mut transaction = self.pool.begin().await?;

        let select = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1 FOR UPDATE");
        let previous = sqlx::query_as::<_, Contact>(&select)
            .bind(id)
            .fetch_optional(&mut *transaction)
            .await?
            .ok_or(StoreError::NotFound(id))?;

        let update = format!(
            r#"UPDATE contacts
               SET email = $2, name = $3, phone = $4, company = $5, title = $6,
                   status = $7, sentiment = $8, notes = $9, source = $10, updated_at = NOW()
               WHERE id = $1
               RETURNING {CONTACT_COLUMNS}"#
        );
        let current = sqlx::query_as::<_, Contact>(&update)
            .bind(id)
            .bind(&record.email)
            .bind(&record.name)
            .bind(&record.phone)
            .bind(&record.company)
            .bind(&record.title)
            .bind(record.status)
            .bind(record.sentiment)
            .bind(&record.notes)
            .bind(&record.source)
            .fetch_one(&mut *transaction)
            .await
            .map_err(|err| map_write_error(err, &record.email))?;

        transaction.commit().await?;

        Ok(UpdatedContact { previous, current })
    }

    async fn list_contacts(&self, scope: Scope) -> Result<Vec<Contact>, StoreError> {
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE org_id = $1 ORDER BY created_at DESC, id DESC"
        );
        let contacts = sqlx::query_as::<_, Contact>(&sql)
            .bind(scope.org_id())
            .fetch_all(&self.pool)
            .await?;

        Ok(contacts)
    }
}
