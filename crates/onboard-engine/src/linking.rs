//! Identity linking: binding an authenticated principal to exactly one
//! HR-issued employee id.
//!
//! The allow-list claim is written first, guarded by the entry's version,
//! so of two principals racing for the same id exactly one wins. The
//! profile link follows; if it fails the claim is released again.

use chrono::Utc;
use onboard_core::error::{LinkError, OnboardError, OnboardResult};
use onboard_core::models::admin_record::AdminRecord;
use onboard_core::models::allowlist::{AllowlistEntry, AllowlistStatus};
use onboard_core::models::employee_id::EmployeeId;
use onboard_core::models::notification::merge_notifications;
use onboard_core::models::principal::Principal;
use onboard_core::models::profile::{EmployeeProfile, ProfileStatus};
use onboard_core::models::step::{migrate_steps, stage_for};
use onboard_core::store::{Collection, DocumentStore, DocumentStoreExt, Filter, Versioned};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::profiles;
use crate::retry::with_retry;

pub struct IdentityLinkingService<S: DocumentStore> {
    store: S,
    config: EngineConfig,
}

impl<S: DocumentStore> IdentityLinkingService<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Normalize user input into an [`EmployeeId`] using the configured
    /// prefix.
    pub fn parse_employee_id(&self, input: &str) -> Result<EmployeeId, LinkError> {
        EmployeeId::parse(input, &self.config.employee_id_prefix)
    }

    /// Bind `principal` to the employee id it typed in.
    ///
    /// Checks, in order: the id is well formed, registered, active, the
    /// expected email (if any) matches, and nobody else holds the claim.
    /// Linking the same pair again is a no-op that returns the id.
    pub async fn link_identity(
        &self,
        principal: &Principal,
        claimed_employee_id: &str,
    ) -> OnboardResult<EmployeeId> {
        let employee_id = self.parse_employee_id(claimed_employee_id)?;
        with_retry(&self.config.retry, "link_identity", || {
            self.try_link(principal, &employee_id)
        })
        .await
    }

    /// Repair a link left half-finished by an interrupted session.
    ///
    /// A linked profile is authoritative: its claim is re-asserted if the
    /// allow-list lost it. A claim held by this principal whose profile is
    /// still unlinked is completed, or released when the entry no longer
    /// admits the link. Returns the linked id, if any.
    pub async fn reconcile_link(&self, principal: &Principal) -> OnboardResult<Option<EmployeeId>> {
        let Some(profile) = profiles::load_profile(&self.store, &principal.id).await? else {
            return Ok(None);
        };

        if let Some(employee_id) = profile.value.employee_id {
            match self.load_entry(&employee_id).await? {
                Some(entry) if !entry.value.is_claimed() => {
                    self.write_claim(&entry, principal).await?;
                    info!(
                        %employee_id,
                        principal_id = %principal.id,
                        "Re-asserted allow-list claim"
                    );
                }
                Some(entry) if !entry.value.is_claimed_by(&principal.id) => {
                    warn!(
                        %employee_id,
                        principal_id = %principal.id,
                        "Linked employee id is claimed by another principal"
                    );
                }
                None => {
                    warn!(%employee_id, "Linked employee id is missing from the allow-list");
                }
                Some(_) => {}
            }
            return Ok(Some(employee_id));
        }

        let claims = self
            .store
            .query(
                Collection::Allowlist,
                &[Filter::equals("claimed_by_principal_id", principal.id.as_str())],
            )
            .await?;
        let Some(doc) = claims.into_iter().next() else {
            return Ok(None);
        };
        let entry: AllowlistEntry = serde_json::from_value(doc.data)?;
        info!(
            employee_id = %entry.employee_id,
            principal_id = %principal.id,
            "Completing interrupted identity link"
        );
        match self.link_identity(principal, entry.employee_id.as_str()).await {
            Ok(employee_id) => Ok(Some(employee_id)),
            Err(OnboardError::Link(e)) => {
                warn!(
                    employee_id = %entry.employee_id,
                    principal_id = %principal.id,
                    error = %e,
                    "Interrupted identity link can no longer be completed"
                );
                self.release_claim(&entry.employee_id, principal).await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn try_link(
        &self,
        principal: &Principal,
        employee_id: &EmployeeId,
    ) -> OnboardResult<EmployeeId> {
        let profile = profiles::load_or_create(&self.store, principal).await?;
        if let Some(linked) = &profile.value.employee_id
            && linked != employee_id
        {
            return Err(LinkError::AlreadyLinked(linked.to_string()).into());
        }

        let entry = self
            .load_entry(employee_id)
            .await?
            .ok_or_else(|| LinkError::NotFound(employee_id.to_string()))?;
        if !entry.value.active {
            return Err(LinkError::Inactive(employee_id.to_string()).into());
        }
        if !entry.value.email_matches(&principal.email) {
            return Err(LinkError::IdentityMismatch(employee_id.to_string()).into());
        }
        if entry.value.is_claimed() && !entry.value.is_claimed_by(&principal.id) {
            return Err(LinkError::AlreadyClaimed(employee_id.to_string()).into());
        }

        if profile.value.employee_id.is_some() {
            if !entry.value.is_claimed_by(&principal.id) {
                self.write_claim(&entry, principal).await?;
            }
            debug!(%employee_id, principal_id = %principal.id, "Identity already linked");
            return Ok(employee_id.clone());
        }

        let claimed_now = !entry.value.is_claimed_by(&principal.id);
        if claimed_now {
            self.write_claim(&entry, principal).await?;
        }

        if let Err(e) = self.write_link(principal, employee_id, profile).await {
            if claimed_now {
                self.release_claim(employee_id, principal).await;
            }
            return Err(e);
        }

        info!(%employee_id, principal_id = %principal.id, "Identity linked");
        Ok(employee_id.clone())
    }

    async fn load_entry(
        &self,
        employee_id: &EmployeeId,
    ) -> OnboardResult<Option<Versioned<AllowlistEntry>>> {
        self.store
            .load(Collection::Allowlist, employee_id.as_str())
            .await
    }

    async fn write_claim(
        &self,
        entry: &Versioned<AllowlistEntry>,
        principal: &Principal,
    ) -> OnboardResult<()> {
        let now = Utc::now();
        self.store
            .patch(
                Collection::Allowlist,
                entry.value.employee_id.as_str(),
                json!({
                    "claimed_by_principal_id": principal.id,
                    "status": AllowlistStatus::Verified,
                    "claimed_at": now,
                    "updated_at": now,
                }),
                Some(entry.version),
            )
            .await?;
        Ok(())
    }

    async fn write_link(
        &self,
        principal: &Principal,
        employee_id: &EmployeeId,
        profile: Versioned<EmployeeProfile>,
    ) -> OnboardResult<()> {
        let record = self
            .store
            .load::<AdminRecord>(Collection::AdminRecords, employee_id.as_str())
            .await?;

        let mut linked = profile.value;
        linked.employee_id = Some(employee_id.clone());
        linked.verified = true;
        linked.status = ProfileStatus::Active;
        if let Some(Versioned { value: record, .. }) = record {
            debug!(%employee_id, "Importing pre-provisioned onboarding record");
            linked.steps = migrate_steps(&record.steps);
            linked.shift = record.shift;
            linked.appointment = record.appointment;
            linked.notifications =
                merge_notifications(&linked.notifications, &record.notifications);
        }
        linked.stage = stage_for(&linked.steps);
        linked.updated_at = Utc::now();

        self.store
            .save(Collection::Profiles, &principal.id, &linked, Some(profile.version))
            .await?;
        Ok(())
    }

    /// Best effort: undo a claim whose profile link could not be written.
    async fn release_claim(&self, employee_id: &EmployeeId, principal: &Principal) {
        let result: OnboardResult<()> = async {
            let Some(entry) = self.load_entry(employee_id).await? else {
                return Ok(());
            };
            if !entry.value.is_claimed_by(&principal.id) {
                return Ok(());
            }
            let status = if entry.value.email.is_some() {
                AllowlistStatus::Assigned
            } else {
                AllowlistStatus::Unclaimed
            };
            self.store
                .patch(
                    Collection::Allowlist,
                    employee_id.as_str(),
                    json!({
                        "claimed_by_principal_id": Value::Null,
                        "claimed_at": Value::Null,
                        "status": status,
                        "updated_at": Utc::now(),
                    }),
                    Some(entry.version),
                )
                .await
                .map(|_| ())
        }
        .await;

        match result {
            Ok(()) => info!(
                %employee_id,
                principal_id = %principal.id,
                "Released allow-list claim"
            ),
            Err(e) => warn!(
                %employee_id,
                principal_id = %principal.id,
                error = %e,
                "Could not release allow-list claim"
            ),
        }
    }
}
