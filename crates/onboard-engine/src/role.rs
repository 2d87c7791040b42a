//! Admin vs. employee classification.
//!
//! Resolution fails closed: a principal is an administrator only when the
//! registry holds a well-formed entry that says so. Store errors are
//! propagated, never treated as either answer.

use onboard_core::error::{OnboardError, OnboardResult};
use onboard_core::models::admin::AdminRegistration;
use onboard_core::models::principal::Principal;
use onboard_core::models::profile::EmployeeProfile;
use onboard_core::store::{Collection, DocumentStore};
use tracing::{debug, warn};

use crate::profiles;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Admin,
    Employee(EmployeeProfile),
}

/// Whether the registry marks `principal_id` as an administrator.
pub async fn is_registered_admin<S: DocumentStore>(
    store: &S,
    principal_id: &str,
) -> OnboardResult<bool> {
    let doc = match store.get_document(Collection::Admins, principal_id).await {
        Ok(doc) => doc,
        Err(OnboardError::NotFound { .. }) => return Ok(false),
        Err(e) => return Err(e),
    };
    match serde_json::from_value::<AdminRegistration>(doc.data) {
        Ok(registration) => Ok(registration.grants_admin()),
        Err(e) => {
            warn!(principal_id, error = %e, "Malformed admin registration, treating as employee");
            Ok(false)
        }
    }
}

pub struct RoleResolver<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> RoleResolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Classify a freshly authenticated principal. Employees get their
    /// profile, created on first sign-in.
    pub async fn resolve_role(&self, principal: &Principal) -> OnboardResult<Resolution> {
        if is_registered_admin(&self.store, &principal.id).await? {
            debug!(principal_id = %principal.id, "Resolved as admin");
            return Ok(Resolution::Admin);
        }
        let profile = profiles::ensure_profile(&self.store, principal).await?;
        debug!(principal_id = %principal.id, linked = profile.is_linked(), "Resolved as employee");
        Ok(Resolution::Employee(profile))
    }
}
