//! Integration tests for identity linking against the in-memory store.

use onboard_core::error::{LinkError, OnboardError};
use onboard_core::models::allowlist::{AllowlistEntry, AllowlistStatus};
use onboard_core::models::principal::Principal;
use onboard_core::models::profile::{EmployeeProfile, ProfileStatus};
use onboard_core::store::{Collection, DocumentStore, DocumentStoreExt, InMemoryDocumentStore};
use onboard_engine::{AdminService, EngineConfig, IdentityLinkingService, RetryPolicy};
use serde_json::json;

fn config() -> EngineConfig {
    EngineConfig {
        retry: RetryPolicy::immediate(5),
        ..EngineConfig::default()
    }
}

fn principal(id: &str, email: &str) -> Principal {
    Principal {
        id: id.into(),
        email: email.into(),
        display_name: format!("User {id}"),
    }
}

/// Store with one administrator and the given allow-list entries.
async fn setup(
    entries: &[(&str, Option<&str>)],
) -> (
    InMemoryDocumentStore,
    AdminService<InMemoryDocumentStore>,
    Principal,
) {
    let store = InMemoryDocumentStore::new();
    let admin = AdminService::new(store.clone(), config());
    admin.bootstrap_admin("admin-1", "hr@example.com").await.unwrap();
    let actor = principal("admin-1", "hr@example.com");
    for (id, email) in entries {
        admin
            .add_allowlist_entry(&actor, id, "Test Employee", *email)
            .await
            .unwrap();
    }
    (store, admin, actor)
}

async fn entry(store: &InMemoryDocumentStore, id: &str) -> AllowlistEntry {
    store
        .load::<AllowlistEntry>(Collection::Allowlist, id)
        .await
        .unwrap()
        .unwrap()
        .value
}

async fn profile(store: &InMemoryDocumentStore, principal_id: &str) -> EmployeeProfile {
    store
        .load::<EmployeeProfile>(Collection::Profiles, principal_id)
        .await
        .unwrap()
        .unwrap()
        .value
}

#[tokio::test]
async fn messy_input_is_normalized_and_claimed() {
    let (store, _, _) = setup(&[("SP001", None)]).await;
    let linking = IdentityLinkingService::new(store.clone(), config());
    let ada = principal("uid-ada", "ada@example.com");

    let id = linking.link_identity(&ada, "sp-001 ").await.unwrap();
    assert_eq!(id.as_str(), "SP001");

    let entry = entry(&store, "SP001").await;
    assert_eq!(entry.claimed_by_principal_id.as_deref(), Some("uid-ada"));
    assert_eq!(entry.status, AllowlistStatus::Verified);
    assert!(entry.claimed_at.is_some());

    let profile = profile(&store, "uid-ada").await;
    assert_eq!(profile.employee_id, Some(id));
    assert!(profile.verified);
    assert_eq!(profile.status, ProfileStatus::Active);
    assert_eq!(profile.stage, "shift_selection");
}

#[tokio::test]
async fn unregistered_id_is_not_found() {
    let (store, _, _) = setup(&[("SP001", None)]).await;
    let linking = IdentityLinkingService::new(store.clone(), config());
    let err = linking
        .link_identity(&principal("uid-1", "a@example.com"), "SP999")
        .await
        .unwrap_err();
    assert!(matches!(err, OnboardError::Link(LinkError::NotFound(id)) if id == "SP999"));
}

#[tokio::test]
async fn malformed_ids_are_rejected() {
    let (store, _, _) = setup(&[]).await;
    let linking = IdentityLinkingService::new(store, config());
    for input in ["", "SP", "XX001", "SP00A"] {
        let err = linking
            .link_identity(&principal("uid-1", "a@example.com"), input)
            .await
            .unwrap_err();
        assert!(
            matches!(err, OnboardError::Link(LinkError::InvalidFormat { .. })),
            "{input:?} gave {err:?}"
        );
    }
}

#[tokio::test]
async fn inactive_and_mismatched_entries_are_refused() {
    let (store, admin, actor) =
        setup(&[("SP010", None), ("SP011", Some("Grace@Example.com"))]).await;
    admin.set_allowlist_active(&actor, "SP010", false).await.unwrap();
    let linking = IdentityLinkingService::new(store.clone(), config());
    let ada = principal("uid-ada", "ada@example.com");

    let err = linking.link_identity(&ada, "SP010").await.unwrap_err();
    assert!(matches!(err, OnboardError::Link(LinkError::Inactive(_))));

    let err = linking.link_identity(&ada, "SP011").await.unwrap_err();
    assert!(matches!(err, OnboardError::Link(LinkError::IdentityMismatch(_))));

    // Expected email is compared case-insensitively.
    let grace = principal("uid-grace", "grace@example.com");
    linking.link_identity(&grace, "SP011").await.unwrap();

    // Failed attempts left nothing behind.
    assert!(!entry(&store, "SP010").await.is_claimed());
    assert!(!profile(&store, "uid-ada").await.is_linked());
}

#[tokio::test]
async fn an_id_can_only_be_claimed_once() {
    let (store, _, _) = setup(&[("SP001", None)]).await;
    let linking = IdentityLinkingService::new(store.clone(), config());
    let ada = principal("uid-ada", "ada@example.com");
    let bob = principal("uid-bob", "bob@example.com");

    let (a, b) = tokio::join!(
        linking.link_identity(&ada, "SP001"),
        linking.link_identity(&bob, "SP001"),
    );
    let winners = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(winners, 1);
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(
        loser.unwrap_err(),
        OnboardError::Link(LinkError::AlreadyClaimed(_))
    ));

    let linked = store
        .query(
            Collection::Profiles,
            &[onboard_core::store::Filter::equals("employee_id", "SP001")],
        )
        .await
        .unwrap();
    assert_eq!(linked.len(), 1);
}

#[tokio::test]
async fn relinking_the_same_pair_is_idempotent() {
    let (store, _, _) = setup(&[("SP001", None)]).await;
    let linking = IdentityLinkingService::new(store.clone(), config());
    let ada = principal("uid-ada", "ada@example.com");

    linking.link_identity(&ada, "SP001").await.unwrap();
    let before = store.get_document(Collection::Profiles, "uid-ada").await.unwrap();
    let claim_before = store.get_document(Collection::Allowlist, "SP001").await.unwrap();

    let id = linking.link_identity(&ada, " sp_001").await.unwrap();
    assert_eq!(id.as_str(), "SP001");

    let after = store.get_document(Collection::Profiles, "uid-ada").await.unwrap();
    let claim_after = store.get_document(Collection::Allowlist, "SP001").await.unwrap();
    assert_eq!(before, after);
    assert_eq!(claim_before, claim_after);
}

#[tokio::test]
async fn a_linked_profile_cannot_switch_ids() {
    let (store, _, _) = setup(&[("SP001", None), ("SP002", None)]).await;
    let linking = IdentityLinkingService::new(store.clone(), config());
    let ada = principal("uid-ada", "ada@example.com");

    linking.link_identity(&ada, "SP001").await.unwrap();
    let err = linking.link_identity(&ada, "SP002").await.unwrap_err();
    assert!(matches!(err, OnboardError::Link(LinkError::AlreadyLinked(id)) if id == "SP001"));
    assert!(!entry(&store, "SP002").await.is_claimed());
}

#[tokio::test]
async fn pre_provisioned_record_is_imported() {
    let (store, admin, actor) = setup(&[("SP042", None)]).await;
    admin
        .override_step(&actor, "SP042", "shift_selection")
        .await
        .unwrap();

    let linking = IdentityLinkingService::new(store.clone(), config());
    linking
        .link_identity(&principal("uid-42", "x@example.com"), "SP042")
        .await
        .unwrap();

    let profile = profile(&store, "uid-42").await;
    assert!(profile.steps[0].done);
    assert!(!profile.steps[1].locked);
    assert!(profile.steps[2].locked);
    assert_eq!(profile.stage, "footwear");
}

#[tokio::test]
async fn legacy_step_ids_in_imported_records_are_migrated() {
    let (store, _, _) = setup(&[("SP043", None)]).await;
    store
        .set_document(
            Collection::AdminRecords,
            "SP043",
            json!({
                "employee_id": "SP043",
                "steps": [
                    { "id": "shift_selection", "done": true },
                    { "id": "footwear", "done": true },
                    { "id": "i9", "done": true },
                    { "id": "documents", "done": true },
                ],
                "created_at": "2024-05-01T10:00:00Z",
                "updated_at": "2024-05-01T10:00:00Z",
            }),
            onboard_core::store::WriteOptions::create(),
        )
        .await
        .unwrap();

    let linking = IdentityLinkingService::new(store.clone(), config());
    linking
        .link_identity(&principal("uid-43", "x@example.com"), "SP043")
        .await
        .unwrap();

    let profile = profile(&store, "uid-43").await;
    let ids: Vec<_> = profile.steps.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["shift_selection", "footwear", "i9", "photo_badge", "firstday"]);
    assert!(profile.steps[3].done);
    assert_eq!(profile.stage, "firstday");
}

#[tokio::test]
async fn half_finished_claim_is_completed_on_reconcile() {
    let (store, _, _) = setup(&[("SP005", None)]).await;
    let linking = IdentityLinkingService::new(store.clone(), config());
    let ada = principal("uid-ada", "ada@example.com");

    // A claim written without its profile link, as after a crash.
    store
        .patch(
            Collection::Allowlist,
            "SP005",
            json!({ "claimed_by_principal_id": "uid-ada", "status": "verified" }),
            None,
        )
        .await
        .unwrap();

    let linked = linking.reconcile_link(&ada).await.unwrap();
    assert!(linked.is_none(), "no profile yet, nothing to reconcile");

    onboard_engine::profiles::ensure_profile(&store, &ada).await.unwrap();
    let linked = linking.reconcile_link(&ada).await.unwrap();
    assert_eq!(linked.unwrap().as_str(), "SP005");
    assert!(profile(&store, "uid-ada").await.is_linked());
}

#[tokio::test]
async fn stranded_claim_on_a_deactivated_entry_is_released() {
    let (store, admin, actor) = setup(&[("SP005", None)]).await;
    let linking = IdentityLinkingService::new(store.clone(), config());
    let ada = principal("uid-ada", "ada@example.com");
    onboard_engine::profiles::ensure_profile(&store, &ada).await.unwrap();

    store
        .patch(
            Collection::Allowlist,
            "SP005",
            json!({ "claimed_by_principal_id": "uid-ada", "status": "verified" }),
            None,
        )
        .await
        .unwrap();
    admin.set_allowlist_active(&actor, "SP005", false).await.unwrap();

    let linked = linking.reconcile_link(&ada).await.unwrap();
    assert!(linked.is_none());
    assert!(!profile(&store, "uid-ada").await.is_linked());

    let released = entry(&store, "SP005").await;
    assert!(!released.is_claimed());
    assert_eq!(released.status, AllowlistStatus::Unclaimed);

    // Reactivated, the id is open to whoever links next.
    admin.set_allowlist_active(&actor, "SP005", true).await.unwrap();
    let grace = principal("uid-grace", "grace@example.com");
    linking.link_identity(&grace, "SP005").await.unwrap();
    assert!(entry(&store, "SP005").await.is_claimed_by("uid-grace"));
}

#[tokio::test]
async fn lost_claim_is_reasserted_from_the_profile() {
    let (store, _, _) = setup(&[("SP006", None)]).await;
    let linking = IdentityLinkingService::new(store.clone(), config());
    let ada = principal("uid-ada", "ada@example.com");
    linking.link_identity(&ada, "SP006").await.unwrap();

    store
        .patch(
            Collection::Allowlist,
            "SP006",
            json!({ "claimed_by_principal_id": null, "status": "unclaimed" }),
            None,
        )
        .await
        .unwrap();

    let linked = linking.reconcile_link(&ada).await.unwrap();
    assert_eq!(linked.unwrap().as_str(), "SP006");
    assert!(entry(&store, "SP006").await.is_claimed_by("uid-ada"));
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let (store, _, _) = setup(&[("SP007", None)]).await;
    let linking = IdentityLinkingService::new(store.clone(), config());
    let ada = principal("uid-ada", "ada@example.com");

    store.fail_next_writes(2);
    let id = linking.link_identity(&ada, "SP007").await.unwrap();
    assert_eq!(id.as_str(), "SP007");
    assert!(entry(&store, "SP007").await.is_claimed_by("uid-ada"));
}
