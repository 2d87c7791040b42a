//! Integration tests for administrator operations and role resolution.

use onboard_core::error::{LinkError, OnboardError};
use onboard_core::models::appointment::AppointmentInfo;
use onboard_core::models::principal::Principal;
use onboard_core::models::profile::{EmployeeProfile, ProfileStatus};
use onboard_core::models::shift::ShiftStatus;
use onboard_core::store::{
    Collection, DocumentStore, DocumentStoreExt, InMemoryDocumentStore, WriteOptions,
};
use onboard_engine::{
    AdminService, EngineConfig, IdentityLinkingService, OnboardingStateMachine, Resolution,
    RetryPolicy, RoleResolver, StepInput,
};
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
        display_name: String::new(),
    }
}

async fn setup() -> (InMemoryDocumentStore, AdminService<InMemoryDocumentStore>, Principal) {
    let store = InMemoryDocumentStore::new();
    let admin = AdminService::new(store.clone(), config());
    admin.bootstrap_admin("admin-1", "hr@example.com").await.unwrap();
    (store, admin, principal("admin-1", "hr@example.com"))
}

async fn link(store: &InMemoryDocumentStore, principal_id: &str, employee_id: &str) {
    IdentityLinkingService::new(store.clone(), config())
        .link_identity(&principal(principal_id, "e@example.com"), employee_id)
        .await
        .unwrap();
}

async fn stored_profile(store: &InMemoryDocumentStore, principal_id: &str) -> EmployeeProfile {
    store
        .load::<EmployeeProfile>(Collection::Profiles, principal_id)
        .await
        .unwrap()
        .unwrap()
        .value
}

#[tokio::test]
async fn non_admins_are_refused() {
    let (_, admin, _) = setup().await;
    let employee = principal("uid-1", "e@example.com");

    let err = admin
        .add_allowlist_entry(&employee, "SP001", "Someone", None)
        .await
        .unwrap_err();
    assert!(matches!(err, OnboardError::AuthorizationDenied { .. }));

    let err = admin.list_allowlist(&employee).await.unwrap_err();
    assert!(matches!(err, OnboardError::AuthorizationDenied { .. }));

    let err = admin.grant_admin(&employee, "uid-1", "e@example.com").await.unwrap_err();
    assert!(matches!(err, OnboardError::AuthorizationDenied { .. }));
}

#[tokio::test]
async fn allowlist_entries_are_validated_and_listed_in_order() {
    let (_, admin, actor) = setup().await;
    admin.add_allowlist_entry(&actor, "SP003", "Cy", None).await.unwrap();
    let entry = admin
        .add_allowlist_entry(&actor, "sp 001", "Ada", Some(" ada@example.com "))
        .await
        .unwrap();
    assert_eq!(entry.employee_id.as_str(), "SP001");
    assert_eq!(entry.email.as_deref(), Some("ada@example.com"));
    assert!(entry.active);

    let err = admin.add_allowlist_entry(&actor, "SP001", "Ada", None).await.unwrap_err();
    assert!(matches!(err, OnboardError::AlreadyExists { .. }));

    let err = admin.add_allowlist_entry(&actor, "SP002", "  ", None).await.unwrap_err();
    assert!(matches!(err, OnboardError::Validation { .. }));

    let err = admin.add_allowlist_entry(&actor, "EMP-2", "Bo", None).await.unwrap_err();
    assert!(matches!(err, OnboardError::Link(LinkError::InvalidFormat { .. })));

    let ids: Vec<_> = admin
        .list_allowlist(&actor)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.employee_id.to_string())
        .collect();
    assert_eq!(ids, ["SP001", "SP003"]);
}

#[tokio::test]
async fn deleting_an_entry_cascades() {
    let (store, admin, actor) = setup().await;
    admin.add_allowlist_entry(&actor, "SP001", "Ada", None).await.unwrap();
    admin
        .send_notification(&actor, "SP001", "Welcome", "Hello", "info")
        .await
        .unwrap();
    link(&store, "uid-ada", "SP001").await;

    admin.delete_allowlist_entry(&actor, "SP001").await.unwrap();

    for (collection, key) in [
        (Collection::Allowlist, "SP001"),
        (Collection::AdminRecords, "SP001"),
        (Collection::Profiles, "uid-ada"),
    ] {
        let err = store.get_document(collection, key).await.unwrap_err();
        assert!(matches!(err, OnboardError::NotFound { .. }), "{collection}/{key} survived");
    }

    let err = admin.delete_allowlist_entry(&actor, "SP001").await.unwrap_err();
    assert!(matches!(err, OnboardError::NotFound { .. }));
}

#[tokio::test]
async fn override_and_reset_touch_both_documents() {
    let (store, admin, actor) = setup().await;
    admin.add_allowlist_entry(&actor, "SP001", "Ada", None).await.unwrap();
    link(&store, "uid-ada", "SP001").await;

    let record = admin.override_step(&actor, "SP001", "i9").await.unwrap();
    assert!(record.steps[..3].iter().all(|s| s.done));
    assert!(!record.steps[3].locked);

    let profile = stored_profile(&store, "uid-ada").await;
    assert!(profile.steps[..3].iter().all(|s| s.done));
    assert_eq!(profile.stage, "photo_badge");

    let record = admin.reset_step(&actor, "SP001", "footwear").await.unwrap();
    assert!(record.steps[0].done);
    assert!(record.steps[1..].iter().all(|s| !s.done));
    assert!(record.steps[2].locked);

    let profile = stored_profile(&store, "uid-ada").await;
    assert!(profile.steps[0].done && !profile.steps[1].done && !profile.steps[2].done);
    assert_eq!(profile.stage, "footwear");

    let err = admin.override_step(&actor, "SP001", "badge").await.unwrap_err();
    assert!(matches!(err, OnboardError::Step(_)));
}

#[tokio::test]
async fn shift_decisions_follow_the_employee_selection() {
    let (store, admin, actor) = setup().await;
    admin.add_allowlist_entry(&actor, "SP001", "Ada", None).await.unwrap();

    let err = admin.decide_shift(&actor, "SP001", true).await.unwrap_err();
    assert!(matches!(err, OnboardError::Validation { .. }));

    link(&store, "uid-ada", "SP001").await;
    let employee_id = onboard_core::models::employee_id::EmployeeId::parse("SP001", "SP").unwrap();
    OnboardingStateMachine::new(store.clone(), RetryPolicy::immediate(3))
        .complete_step(
            &employee_id,
            "shift_selection",
            StepInput::ShiftSelection {
                position: "Forklift".into(),
                shift_code: "swing".into(),
            },
        )
        .await
        .unwrap();

    let decision = admin.decide_shift(&actor, "SP001", false).await.unwrap();
    assert_eq!(decision.position, "Forklift");
    assert_eq!(decision.status, ShiftStatus::Rejected);
    assert!(decision.decided_at.is_some());

    let profile = stored_profile(&store, "uid-ada").await;
    assert_eq!(profile.shift.status, ShiftStatus::Rejected);
    assert!(!profile.shift.approved);

    let decision = admin.decide_shift(&actor, "SP001", true).await.unwrap();
    assert!(decision.approved);
    let view = admin.employee_view(&actor, "SP001").await.unwrap();
    let merged = view.profile.unwrap();
    assert!(merged.shift.approved);
    assert_eq!(merged.shift.shift_code, "swing");
}

#[tokio::test]
async fn appointments_and_notifications_reach_the_employee() {
    let (store, admin, actor) = setup().await;
    admin.add_allowlist_entry(&actor, "SP001", "Ada", None).await.unwrap();

    let appointment = AppointmentInfo {
        date: "2024-06-03".into(),
        time: "08:30".into(),
        address: "1 Plant Rd".into(),
        notes: "Bring ID".into(),
    };
    admin
        .save_appointment(&actor, "SP001", appointment.clone())
        .await
        .unwrap();
    let err = admin
        .send_notification(&actor, "SP001", "", "body", "info")
        .await
        .unwrap_err();
    assert!(matches!(err, OnboardError::Validation { .. }));
    let note = admin
        .send_notification(&actor, "SP001", "Parking", "Use lot B", "info")
        .await
        .unwrap();

    // Imported at link time.
    link(&store, "uid-ada", "SP001").await;
    let profile = stored_profile(&store, "uid-ada").await;
    assert_eq!(profile.appointment, appointment);
    assert_eq!(profile.notifications.len(), 1);
    assert_eq!(profile.notifications[0].id, note.id);

    // Mirrored once linked.
    admin
        .send_notification(&actor, "SP001", "Reminder", "Boots!", "action")
        .await
        .unwrap();
    let view = admin.employee_view(&actor, "SP001").await.unwrap();
    assert_eq!(view.profile.unwrap().notifications.len(), 2);
    assert_eq!(view.record.unwrap().notifications.len(), 2);
    assert!(view.entry.is_claimed_by("uid-ada"));
}

#[tokio::test]
async fn set_status_requires_a_linked_profile() {
    let (store, admin, actor) = setup().await;
    admin.add_allowlist_entry(&actor, "SP001", "Ada", None).await.unwrap();

    let err = admin
        .set_status(&actor, "SP001", ProfileStatus::Suspended)
        .await
        .unwrap_err();
    assert!(matches!(err, OnboardError::Step(_)));

    link(&store, "uid-ada", "SP001").await;
    let profile = admin
        .set_status(&actor, "SP001", ProfileStatus::Suspended)
        .await
        .unwrap();
    assert_eq!(profile.status, ProfileStatus::Suspended);
}

#[tokio::test]
async fn role_resolution_fails_closed() {
    let (store, admin, actor) = setup().await;
    let resolver = RoleResolver::new(store.clone());

    assert_eq!(resolver.resolve_role(&actor).await.unwrap(), Resolution::Admin);

    // Legacy flag form.
    store
        .set_document(
            Collection::Admins,
            "admin-2",
            json!({ "isAdmin": true }),
            WriteOptions::replace(),
        )
        .await
        .unwrap();
    assert_eq!(
        resolver.resolve_role(&principal("admin-2", "x@example.com")).await.unwrap(),
        Resolution::Admin
    );

    for (id, doc) in [
        ("weird-1", json!({ "role": 5 })),
        ("weird-2", json!({ "role": "viewer" })),
        ("weird-3", json!({ "is_admin": false })),
    ] {
        store
            .set_document(Collection::Admins, id, doc, WriteOptions::replace())
            .await
            .unwrap();
        let resolution = resolver.resolve_role(&principal(id, "x@example.com")).await.unwrap();
        assert!(matches!(resolution, Resolution::Employee(_)), "{id} escalated");
    }

    let Resolution::Employee(profile) = resolver
        .resolve_role(&principal("uid-new", "new@example.com"))
        .await
        .unwrap()
    else {
        panic!("expected employee");
    };
    assert!(!profile.is_linked());
    assert_eq!(profile.status, ProfileStatus::Pending);

    admin.grant_admin(&actor, "uid-new", "new@example.com").await.unwrap();
    assert_eq!(
        resolver.resolve_role(&principal("uid-new", "new@example.com")).await.unwrap(),
        Resolution::Admin
    );
}

#[tokio::test]
async fn returning_employees_get_a_fresh_login_stamp() {
    let (store, _, _) = setup().await;
    let resolver = RoleResolver::new(store.clone());
    let ada = principal("uid-ada", "ada@example.com");

    resolver.resolve_role(&ada).await.unwrap();
    let first = stored_profile(&store, "uid-ada").await.last_login_at.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    resolver.resolve_role(&ada).await.unwrap();
    let second = stored_profile(&store, "uid-ada").await.last_login_at.unwrap();
    assert!(second > first);
}
