//! Loading, creating and normalizing employee profiles.
//!
//! Every profile read goes through [`normalize`] so legacy step ids and
//! stale lock flags never reach the services.

use chrono::Utc;
use onboard_core::error::{OnboardError, OnboardResult};
use onboard_core::models::employee_id::EmployeeId;
use onboard_core::models::principal::Principal;
use onboard_core::models::profile::EmployeeProfile;
use onboard_core::models::step::{migrate_steps, stage_for};
use onboard_core::store::{Collection, DocumentStore, DocumentStoreExt, Filter, Versioned};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

/// Canonicalize the step list and the derived `stage`.
pub fn normalize(mut profile: EmployeeProfile) -> EmployeeProfile {
    profile.steps = migrate_steps(&profile.steps);
    profile.stage = stage_for(&profile.steps);
    profile
}

fn normalized(loaded: Versioned<EmployeeProfile>) -> Versioned<EmployeeProfile> {
    Versioned {
        value: normalize(loaded.value),
        version: loaded.version,
    }
}

pub async fn load_profile<S: DocumentStore>(
    store: &S,
    principal_id: &str,
) -> OnboardResult<Option<Versioned<EmployeeProfile>>> {
    Ok(store
        .load::<EmployeeProfile>(Collection::Profiles, principal_id)
        .await?
        .map(normalized))
}

/// The profile linked to `employee_id`, if any.
pub async fn find_by_employee_id<S: DocumentStore>(
    store: &S,
    employee_id: &EmployeeId,
) -> OnboardResult<Option<Versioned<EmployeeProfile>>> {
    let docs = store
        .query(
            Collection::Profiles,
            &[Filter::equals("employee_id", employee_id.as_str())],
        )
        .await?;
    match docs.into_iter().next() {
        Some(doc) => Ok(Some(normalized(Versioned::from_document(doc)?))),
        None => Ok(None),
    }
}

/// Like [`find_by_employee_id`] but a missing link is an error.
pub async fn require_linked<S: DocumentStore>(
    store: &S,
    employee_id: &EmployeeId,
) -> OnboardResult<Versioned<EmployeeProfile>> {
    find_by_employee_id(store, employee_id)
        .await?
        .ok_or_else(|| onboard_core::StepError::NotLinked(employee_id.to_string()).into())
}

/// Load the principal's profile, creating an unlinked one if this is its
/// first appearance. Does not touch `last_login_at` on existing profiles.
pub async fn load_or_create<S: DocumentStore>(
    store: &S,
    principal: &Principal,
) -> OnboardResult<Versioned<EmployeeProfile>> {
    if let Some(existing) = load_profile(store, &principal.id).await? {
        return Ok(existing);
    }

    let profile = EmployeeProfile::new(principal, Utc::now());
    match store
        .save(Collection::Profiles, &principal.id, &profile, Some(0))
        .await
    {
        Ok(doc) => {
            info!(principal_id = %principal.id, "Created employee profile");
            Ok(Versioned {
                value: profile,
                version: doc.version,
            })
        }
        // Another session created it first.
        Err(OnboardError::Conflict { .. }) => load_profile(store, &principal.id)
            .await?
            .ok_or_else(|| OnboardError::not_found("profile", &principal.id)),
        Err(e) => Err(e),
    }
}

/// Sign-in bookkeeping: create the profile on first sign-in, otherwise
/// stamp `last_login_at`.
pub async fn ensure_profile<S: DocumentStore>(
    store: &S,
    principal: &Principal,
) -> OnboardResult<EmployeeProfile> {
    if let Some(existing) = load_profile(store, &principal.id).await? {
        let now = Utc::now();
        store
            .patch(
                Collection::Profiles,
                &principal.id,
                json!({ "last_login_at": now }),
                None,
            )
            .await?;
        debug!(principal_id = %principal.id, "Recorded sign-in");
        let mut profile = existing.value;
        profile.last_login_at = Some(now);
        return Ok(profile);
    }
    Ok(load_or_create(store, principal).await?.value)
}

/// Mark one of the principal's notifications as read. Unknown ids are
/// reported as not found.
pub async fn mark_notification_read<S: DocumentStore>(
    store: &S,
    principal_id: &str,
    notification_id: Uuid,
) -> OnboardResult<EmployeeProfile> {
    let Versioned { mut value, version } = load_profile(store, principal_id)
        .await?
        .ok_or_else(|| OnboardError::not_found("profile", principal_id))?;

    let notification = value
        .notifications
        .iter_mut()
        .find(|n| n.id == notification_id)
        .ok_or_else(|| OnboardError::not_found("notification", notification_id.to_string()))?;
    if notification.read {
        return Ok(value);
    }
    notification.read = true;
    value.updated_at = Utc::now();

    store
        .patch(
            Collection::Profiles,
            principal_id,
            json!({
                "notifications": value.notifications,
                "updated_at": value.updated_at,
            }),
            Some(version),
        )
        .await?;
    Ok(value)
}
