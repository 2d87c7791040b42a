//! Integration tests for the SurrealDB document store using in-memory SurrealDB.

use onboard_core::error::OnboardError;
use onboard_core::store::{Collection, DocumentStore, DocumentStoreExt, Filter, WriteOptions};
use onboard_db::SurrealDocumentStore;
use serde_json::json;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn setup() -> SurrealDocumentStore<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    onboard_db::run_migrations(&db).await.unwrap();
    SurrealDocumentStore::new(db)
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    onboard_db::run_migrations(&db).await.unwrap();
    onboard_db::run_migrations(&db).await.unwrap();
}

#[tokio::test]
async fn create_read_and_merge() {
    let store = setup().await;

    let doc = store
        .set_document(
            Collection::Profiles,
            "uid-1",
            json!({ "email": "ada@example.com", "shift": { "position": "Assembler" } }),
            WriteOptions::create(),
        )
        .await
        .unwrap();
    assert_eq!(doc.version, 1);

    let doc = store
        .patch(
            Collection::Profiles,
            "uid-1",
            json!({ "shift": { "approved": true } }),
            Some(1),
        )
        .await
        .unwrap();
    assert_eq!(doc.version, 2);

    let read = store.get_document(Collection::Profiles, "uid-1").await.unwrap();
    assert_eq!(read.version, 2);
    assert_eq!(
        read.data,
        json!({
            "email": "ada@example.com",
            "shift": { "position": "Assembler", "approved": true }
        })
    );
}

#[tokio::test]
async fn missing_document_is_not_found() {
    let store = setup().await;
    let err = store
        .get_document(Collection::Allowlist, "SP404")
        .await
        .unwrap_err();
    assert!(matches!(err, OnboardError::NotFound { .. }));

    let loaded: Option<onboard_core::store::Versioned<serde_json::Value>> =
        store.load(Collection::Allowlist, "SP404").await.unwrap();
    assert!(loaded.is_none());
}

#[tokio::test]
async fn stale_version_is_rejected() {
    let store = setup().await;
    store
        .set_document(
            Collection::Allowlist,
            "SP001",
            json!({ "active": true }),
            WriteOptions::create(),
        )
        .await
        .unwrap();
    store
        .set_document(
            Collection::Allowlist,
            "SP001",
            json!({ "active": false }),
            WriteOptions::merge(),
        )
        .await
        .unwrap();

    let err = store
        .set_document(
            Collection::Allowlist,
            "SP001",
            json!({ "claimed_by_principal_id": "uid-2" }),
            WriteOptions::merge().expecting(1),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OnboardError::Conflict { .. }));

    let err = store
        .set_document(Collection::Allowlist, "SP001", json!({}), WriteOptions::create())
        .await
        .unwrap_err();
    assert!(matches!(err, OnboardError::Conflict { .. }));
}

#[tokio::test]
async fn query_filters_and_orders_by_key() {
    let store = setup().await;
    for (key, active) in [("SP003", true), ("SP001", true), ("SP002", false)] {
        store
            .set_document(
                Collection::Allowlist,
                key,
                json!({ "employee_id": key, "active": active }),
                WriteOptions::replace(),
            )
            .await
            .unwrap();
    }

    let all = store.query(Collection::Allowlist, &[]).await.unwrap();
    let keys: Vec<_> = all.iter().map(|d| d.key.as_str()).collect();
    assert_eq!(keys, ["SP001", "SP002", "SP003"]);

    let active = store
        .query(Collection::Allowlist, &[Filter::equals("active", true)])
        .await
        .unwrap();
    assert_eq!(active.len(), 2);
}

#[tokio::test]
async fn delete_notifies_subscribers_and_releases() {
    let store = setup().await;
    store
        .set_document(
            Collection::AdminRecords,
            "SP042",
            json!({ "steps": [] }),
            WriteOptions::replace(),
        )
        .await
        .unwrap();

    let mut sub = store.subscribe(Collection::AdminRecords, "SP042").await.unwrap();
    let first = sub.next().await.unwrap();
    assert_eq!(first.document.unwrap().version, 1);

    store.delete_document(Collection::AdminRecords, "SP042").await.unwrap();
    let gone = sub.next().await.unwrap();
    assert!(gone.document.is_none());

    // Deleting again is not an error.
    store.delete_document(Collection::AdminRecords, "SP042").await.unwrap();

    assert_eq!(store.active_subscriptions(), 1);
    drop(sub);
    assert_eq!(store.active_subscriptions(), 0);
}
