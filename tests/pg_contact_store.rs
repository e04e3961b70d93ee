use std::sync::Arc;

use crm_api::import::{
    CandidateRecord, ContactImporter, ContactStore, ImportConfig, PgContactStore, StoreError,
};
use crm_api::models::{LeadStatus, Scope};
use crm_api::test_support::{TestDatabase, TestDatabaseError};
use uuid::Uuid;

async fn provision(test_name: &str) -> Option<TestDatabase> {
    match TestDatabase::new_from_env().await {
        Ok(db) => Some(db),
        Err(TestDatabaseError::MissingUrl) => {
            eprintln!("skipping {test_name}: TEST_DATABASE_URL not set");
            None
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    }
}

#[tokio::test]
async fn insert_lookup_and_update_round_trip() {
    let Some(test_db) = provision("insert_lookup_and_update_round_trip").await else {
        return;
    };
    let store = PgContactStore::new(test_db.pool_clone());
    let org = Scope::new(Uuid::new_v4());

    let created = store
        .insert(
            org,
            &CandidateRecord::new("ada@example.com", "Ada").with_source(["csv"]),
        )
        .await
        .expect("insert succeeds");
    assert_eq!(created.status, LeadStatus::New);
    assert_eq!(created.source, vec!["csv".to_string()]);

    let ids = store
        .find_ids_by_email(
            org,
            &["ada@example.com".to_string(), "nobody@example.com".to_string()],
        )
        .await
        .expect("lookup succeeds");
    assert_eq!(ids.len(), 1);
    assert_eq!(ids.get("ada@example.com"), Some(&created.id));

    let mut changed = CandidateRecord::new("ada@example.com", "Ada Lovelace");
    changed.status = LeadStatus::Qualified;
    let updated = store
        .update_by_id(created.id, &changed)
        .await
        .expect("update succeeds");
    assert_eq!(updated.previous.name, "Ada");
    assert_eq!(updated.current.name, "Ada Lovelace");
    assert_eq!(updated.current.status, LeadStatus::Qualified);
    assert!(updated.current.updated_at >= updated.previous.updated_at);

    let missing = store.update_by_id(created.id + 1000, &changed).await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn duplicate_email_in_scope_is_rejected() {
    let Some(test_db) = provision("duplicate_email_in_scope_is_rejected").await else {
        return;
    };
    let store = PgContactStore::new(test_db.pool_clone());
    let (acme, globex) = (Scope::new(Uuid::new_v4()), Scope::new(Uuid::new_v4()));
    let record = CandidateRecord::new("dup@example.com", "Dup");

    store.insert(acme, &record).await.expect("first insert");
    store.insert(globex, &record).await.expect("other org");
    let again = store.insert(acme, &record).await;
    assert!(matches!(again, Err(StoreError::DuplicateEmail(email)) if email == "dup@example.com"));

    assert_eq!(store.list_contacts(acme).await.expect("list").len(), 1);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn import_against_postgres_is_idempotent() {
    let Some(test_db) = provision("import_against_postgres_is_idempotent").await else {
        return;
    };
    let importer = ContactImporter::new(
        Arc::new(PgContactStore::new(test_db.pool_clone())),
        ImportConfig::new(3, 1_000),
    );
    let org = Scope::new(Uuid::new_v4());

    let candidates: Vec<CandidateRecord> = (0..7)
        .map(|i| CandidateRecord::new(format!("User{i}@Example.com"), format!("User {i}")))
        .collect();

    let first = importer
        .import_candidates(org, &candidates, None)
        .await
        .expect("first import");
    assert_eq!((first.created, first.failed), (7, 0));

    let second = importer
        .import_candidates(org, &candidates, None)
        .await
        .expect("second import");
    assert_eq!(
        (second.created, second.updated, second.skipped, second.failed),
        (0, 0, 7, 0)
    );

    let stored = importer.store().list_contacts(org).await.expect("list");
    assert_eq!(stored.len(), 7);
    assert!(stored.iter().all(|c| c.email == c.email.to_lowercase()));

    test_db.close().await.expect("failed to drop test database");
}
