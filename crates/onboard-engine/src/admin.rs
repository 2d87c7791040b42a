//! Administrator operations: managing the allow-list, editing onboarding
//! records, adjudicating shifts and messaging employees.
//!
//! Every operation takes the acting principal and refuses it with
//! `AuthorizationDenied` unless the admin registry marks it as an
//! administrator. Edits to onboarding state are written to the admin
//! record and, when the employee id is linked, mirrored onto the profile.

use chrono::Utc;
use onboard_core::error::{OnboardError, OnboardResult, StepError};
use onboard_core::models::admin::AdminRegistration;
use onboard_core::models::admin_record::AdminRecord;
use onboard_core::models::allowlist::{AllowlistEntry, CreateAllowlistEntry};
use onboard_core::models::appointment::AppointmentInfo;
use onboard_core::models::employee_id::EmployeeId;
use onboard_core::models::notification::Notification;
use onboard_core::models::principal::Principal;
use onboard_core::models::profile::{EmployeeProfile, ProfileStatus};
use onboard_core::models::shift::{ShiftSelection, ShiftStatus};
use onboard_core::models::step::{Step, StepKind, recompute_locks, stage_for};
use onboard_core::store::{Collection, DocumentStore, DocumentStoreExt, Versioned};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::profiles;
use crate::reconcile::merge;
use crate::retry::with_retry;
use crate::role::is_registered_admin;

/// Everything an administrator sees about one employee id.
#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeView {
    pub entry: AllowlistEntry,
    pub record: Option<AdminRecord>,
    /// The linked profile with the admin record folded in.
    pub profile: Option<EmployeeProfile>,
}

pub struct AdminService<S: DocumentStore> {
    store: S,
    config: EngineConfig,
}

impl<S: DocumentStore> AdminService<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    // -- allow-list --

    pub async fn add_allowlist_entry(
        &self,
        actor: &Principal,
        employee_id: &str,
        full_name: &str,
        email: Option<&str>,
    ) -> OnboardResult<AllowlistEntry> {
        self.require_admin(actor).await?;
        let employee_id = self.parse(employee_id)?;
        if full_name.trim().is_empty() {
            return Err(OnboardError::Validation {
                message: "full name is required".into(),
            });
        }

        let entry = AllowlistEntry::new(
            CreateAllowlistEntry {
                employee_id: employee_id.clone(),
                full_name: full_name.to_string(),
                email: email.map(str::to_string),
            },
            Utc::now(),
        );
        match self
            .store
            .save(Collection::Allowlist, employee_id.as_str(), &entry, Some(0))
            .await
        {
            Ok(_) => {
                info!(%employee_id, actor = %actor.id, "Allow-list entry added");
                Ok(entry)
            }
            Err(OnboardError::Conflict { .. }) => Err(OnboardError::AlreadyExists {
                entity: "allowlist".into(),
                id: employee_id.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    /// All entries, ordered by employee id.
    pub async fn list_allowlist(&self, actor: &Principal) -> OnboardResult<Vec<AllowlistEntry>> {
        self.require_admin(actor).await?;
        let docs = self.store.query(Collection::Allowlist, &[]).await?;
        let mut entries = docs
            .into_iter()
            .map(|doc| serde_json::from_value::<AllowlistEntry>(doc.data))
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));
        Ok(entries)
    }

    pub async fn set_allowlist_active(
        &self,
        actor: &Principal,
        employee_id: &str,
        active: bool,
    ) -> OnboardResult<AllowlistEntry> {
        self.require_admin(actor).await?;
        let employee_id = self.parse(employee_id)?;
        let Versioned { value: mut entry, version } = self.require_entry(&employee_id).await?;

        entry.active = active;
        entry.updated_at = Utc::now();
        self.store
            .patch(
                Collection::Allowlist,
                employee_id.as_str(),
                json!({ "active": active, "updated_at": entry.updated_at }),
                Some(version),
            )
            .await?;
        info!(%employee_id, active, actor = %actor.id, "Allow-list entry updated");
        Ok(entry)
    }

    /// Remove an entry together with its admin record and linked profile.
    pub async fn delete_allowlist_entry(
        &self,
        actor: &Principal,
        employee_id: &str,
    ) -> OnboardResult<()> {
        self.require_admin(actor).await?;
        let employee_id = self.parse(employee_id)?;
        let entry = self.require_entry(&employee_id).await?;

        if let Some(profile) = profiles::find_by_employee_id(&self.store, &employee_id).await? {
            self.store
                .delete_document(Collection::Profiles, &profile.value.principal_id)
                .await?;
        }
        self.store
            .delete_document(Collection::AdminRecords, employee_id.as_str())
            .await?;
        self.store
            .delete_document(Collection::Allowlist, employee_id.as_str())
            .await?;

        info!(
            %employee_id,
            claimed_by = ?entry.value.claimed_by_principal_id,
            actor = %actor.id,
            "Allow-list entry deleted"
        );
        Ok(())
    }

    // -- onboarding records --

    /// The admin record for `employee_id`, created with default steps when
    /// it does not exist yet.
    pub async fn load_or_create_record(
        &self,
        actor: &Principal,
        employee_id: &str,
    ) -> OnboardResult<AdminRecord> {
        self.require_admin(actor).await?;
        let employee_id = self.parse(employee_id)?;
        Ok(self.record_or_new(&employee_id).await?.value)
    }

    pub async fn save_appointment(
        &self,
        actor: &Principal,
        employee_id: &str,
        appointment: AppointmentInfo,
    ) -> OnboardResult<AdminRecord> {
        self.require_admin(actor).await?;
        let employee_id = self.parse(employee_id)?;
        let record = self
            .update_record(&employee_id, |record| {
                record.appointment = appointment.clone();
                Ok(())
            })
            .await?;
        self.update_profile(&employee_id, |profile| {
            profile.appointment = appointment.clone();
            Ok(())
        })
        .await?;
        info!(%employee_id, actor = %actor.id, "Appointment saved");
        Ok(record)
    }

    /// Approve or reject the employee's current shift selection.
    pub async fn decide_shift(
        &self,
        actor: &Principal,
        employee_id: &str,
        approve: bool,
    ) -> OnboardResult<ShiftSelection> {
        self.require_admin(actor).await?;
        let employee_id = self.parse(employee_id)?;

        let profile = profiles::find_by_employee_id(&self.store, &employee_id).await?;
        let record = self
            .store
            .load::<AdminRecord>(Collection::AdminRecords, employee_id.as_str())
            .await?;
        let current = profile
            .map(|p| p.value.shift)
            .filter(ShiftSelection::is_selected)
            .or_else(|| record.map(|r| r.value.shift).filter(ShiftSelection::is_selected))
            .ok_or_else(|| OnboardError::Validation {
                message: format!("{employee_id} has no shift selection to decide"),
            })?;

        let decision = ShiftSelection {
            approved: approve,
            status: if approve {
                ShiftStatus::Approved
            } else {
                ShiftStatus::Rejected
            },
            decided_at: Some(Utc::now()),
            ..current
        };

        self.update_record(&employee_id, |record| {
            record.shift = decision.clone();
            Ok(())
        })
        .await?;
        self.update_profile(&employee_id, |profile| {
            if profile.shift.same_choice(&decision) {
                profile.shift = decision.clone();
            }
            Ok(())
        })
        .await?;
        info!(
            %employee_id,
            approve,
            position = %decision.position,
            shift = %decision.shift_code,
            actor = %actor.id,
            "Shift decided"
        );
        Ok(decision)
    }

    pub async fn send_notification(
        &self,
        actor: &Principal,
        employee_id: &str,
        title: &str,
        body: &str,
        kind: &str,
    ) -> OnboardResult<Notification> {
        self.require_admin(actor).await?;
        let employee_id = self.parse(employee_id)?;
        if title.trim().is_empty() || body.trim().is_empty() {
            return Err(OnboardError::Validation {
                message: "notification title and body are required".into(),
            });
        }

        let notification = Notification {
            id: Uuid::new_v4(),
            title: title.trim().to_string(),
            body: body.trim().to_string(),
            kind: kind.trim().to_string(),
            created_at: Utc::now(),
            read: false,
        };
        self.update_record(&employee_id, |record| {
            record.notifications.push(notification.clone());
            Ok(())
        })
        .await?;
        self.update_profile(&employee_id, |profile| {
            profile.notifications.push(notification.clone());
            Ok(())
        })
        .await?;
        info!(
            %employee_id,
            notification_id = %notification.id,
            actor = %actor.id,
            "Notification sent"
        );
        Ok(notification)
    }

    /// Force `step_id` and every step before it done.
    pub async fn override_step(
        &self,
        actor: &Principal,
        employee_id: &str,
        step_id: &str,
    ) -> OnboardResult<AdminRecord> {
        self.require_admin(actor).await?;
        let employee_id = self.parse(employee_id)?;
        let kind = canonical_step(step_id)?;

        let record = self
            .update_record(&employee_id, |record| {
                force_done_through(&mut record.steps, kind);
                Ok(())
            })
            .await?;
        self.update_profile(&employee_id, |profile| {
            force_done_through(&mut profile.steps, kind);
            Ok(())
        })
        .await?;
        info!(%employee_id, step = kind.id(), actor = %actor.id, "Step overridden");
        Ok(record)
    }

    /// Un-complete `step_id` and every step after it.
    pub async fn reset_step(
        &self,
        actor: &Principal,
        employee_id: &str,
        step_id: &str,
    ) -> OnboardResult<AdminRecord> {
        self.require_admin(actor).await?;
        let employee_id = self.parse(employee_id)?;
        let kind = canonical_step(step_id)?;

        let record = self
            .update_record(&employee_id, |record| {
                reset_from(&mut record.steps, kind);
                Ok(())
            })
            .await?;
        self.update_profile(&employee_id, |profile| {
            reset_from(&mut profile.steps, kind);
            Ok(())
        })
        .await?;
        warn!(%employee_id, step = kind.id(), actor = %actor.id, "Step reset");
        Ok(record)
    }

    pub async fn set_status(
        &self,
        actor: &Principal,
        employee_id: &str,
        status: ProfileStatus,
    ) -> OnboardResult<EmployeeProfile> {
        self.require_admin(actor).await?;
        let employee_id = self.parse(employee_id)?;
        let profile = self
            .update_profile(&employee_id, |profile| {
                profile.status = status;
                Ok(())
            })
            .await?
            .ok_or_else(|| StepError::NotLinked(employee_id.to_string()))?;
        info!(%employee_id, ?status, actor = %actor.id, "Profile status changed");
        Ok(profile)
    }

    /// The allow-list entry, admin record and merged profile for one id.
    pub async fn employee_view(
        &self,
        actor: &Principal,
        employee_id: &str,
    ) -> OnboardResult<EmployeeView> {
        self.require_admin(actor).await?;
        let employee_id = self.parse(employee_id)?;
        let entry = self.require_entry(&employee_id).await?.value;
        let record = self
            .store
            .load::<AdminRecord>(Collection::AdminRecords, employee_id.as_str())
            .await?
            .map(|r| r.value);
        let profile = profiles::find_by_employee_id(&self.store, &employee_id)
            .await?
            .map(|p| match &record {
                Some(record) => merge(&p.value, record),
                None => p.value,
            });
        Ok(EmployeeView { entry, record, profile })
    }

    // -- registry --

    pub async fn grant_admin(
        &self,
        actor: &Principal,
        principal_id: &str,
        email: &str,
    ) -> OnboardResult<()> {
        self.require_admin(actor).await?;
        self.register_admin(principal_id, email).await?;
        info!(principal_id, actor = %actor.id, "Administrator granted");
        Ok(())
    }

    /// Write a registry entry without an acting administrator. Used to
    /// seed the first administrators at deployment.
    pub async fn bootstrap_admin(&self, principal_id: &str, email: &str) -> OnboardResult<()> {
        self.register_admin(principal_id, email).await?;
        info!(principal_id, "Administrator seeded");
        Ok(())
    }

    async fn register_admin(&self, principal_id: &str, email: &str) -> OnboardResult<()> {
        if principal_id.trim().is_empty() {
            return Err(OnboardError::Validation {
                message: "principal id is required".into(),
            });
        }
        self.store
            .save(
                Collection::Admins,
                principal_id,
                &AdminRegistration::admin(email),
                None,
            )
            .await?;
        Ok(())
    }

    // -- helpers --

    async fn require_admin(&self, actor: &Principal) -> OnboardResult<()> {
        if is_registered_admin(&self.store, &actor.id).await? {
            Ok(())
        } else {
            warn!(principal_id = %actor.id, "Administrator operation refused");
            Err(OnboardError::AuthorizationDenied {
                reason: "administrator role required".into(),
            })
        }
    }

    fn parse(&self, employee_id: &str) -> OnboardResult<EmployeeId> {
        Ok(EmployeeId::parse(employee_id, &self.config.employee_id_prefix)?)
    }

    async fn require_entry(
        &self,
        employee_id: &EmployeeId,
    ) -> OnboardResult<Versioned<AllowlistEntry>> {
        self.store
            .load(Collection::Allowlist, employee_id.as_str())
            .await?
            .ok_or_else(|| OnboardError::not_found("allowlist", employee_id.as_str()))
    }

    async fn record_or_new(
        &self,
        employee_id: &EmployeeId,
    ) -> OnboardResult<Versioned<AdminRecord>> {
        if let Some(existing) = self
            .store
            .load::<AdminRecord>(Collection::AdminRecords, employee_id.as_str())
            .await?
        {
            return Ok(Versioned {
                value: normalize_record(existing.value),
                version: existing.version,
            });
        }
        let record = AdminRecord::new(employee_id.clone(), Utc::now());
        match self
            .store
            .save(Collection::AdminRecords, employee_id.as_str(), &record, Some(0))
            .await
        {
            Ok(doc) => Ok(Versioned {
                value: record,
                version: doc.version,
            }),
            Err(OnboardError::Conflict { .. }) => self
                .store
                .load::<AdminRecord>(Collection::AdminRecords, employee_id.as_str())
                .await?
                .map(|r| Versioned {
                    value: normalize_record(r.value),
                    version: r.version,
                })
                .ok_or_else(|| OnboardError::not_found("admin_record", employee_id.as_str())),
            Err(e) => Err(e),
        }
    }

    /// Read-modify-write of the admin record under its version, retried
    /// on conflict.
    async fn update_record<F>(
        &self,
        employee_id: &EmployeeId,
        mutate: F,
    ) -> OnboardResult<AdminRecord>
    where
        F: Fn(&mut AdminRecord) -> OnboardResult<()>,
    {
        let mutate = &mutate;
        with_retry(&self.config.retry, "update_record", || async move {
            let Versioned { value: mut record, version } = self.record_or_new(employee_id).await?;
            mutate(&mut record)?;
            recompute_locks(&mut record.steps);
            record.updated_at = Utc::now();
            self.store
                .save(Collection::AdminRecords, employee_id.as_str(), &record, Some(version))
                .await?;
            Ok::<_, OnboardError>(record)
        })
        .await
    }

    /// Read-modify-write of the linked profile, if there is one.
    async fn update_profile<F>(
        &self,
        employee_id: &EmployeeId,
        mutate: F,
    ) -> OnboardResult<Option<EmployeeProfile>>
    where
        F: Fn(&mut EmployeeProfile) -> OnboardResult<()>,
    {
        let mutate = &mutate;
        with_retry(&self.config.retry, "update_profile", || async move {
            let Some(Versioned { value: mut profile, version }) =
                profiles::find_by_employee_id(&self.store, employee_id).await?
            else {
                return Ok(None);
            };
            mutate(&mut profile)?;
            recompute_locks(&mut profile.steps);
            profile.stage = stage_for(&profile.steps);
            profile.updated_at = Utc::now();
            self.store
                .save(Collection::Profiles, &profile.principal_id, &profile, Some(version))
                .await?;
            Ok::<_, OnboardError>(Some(profile))
        })
        .await
    }
}

fn canonical_step(step_id: &str) -> OnboardResult<StepKind> {
    StepKind::from_id(step_id).ok_or_else(|| StepError::UnknownStep(step_id.to_string()).into())
}

fn normalize_record(mut record: AdminRecord) -> AdminRecord {
    record.steps = onboard_core::models::step::migrate_steps(&record.steps);
    record
}

fn force_done_through(steps: &mut [Step], kind: StepKind) {
    let now = Utc::now();
    for step in steps.iter_mut().take(kind.index() + 1) {
        if !step.done {
            step.done = true;
            step.completed_at = Some(now);
        }
    }
}

fn reset_from(steps: &mut [Step], kind: StepKind) {
    for step in steps.iter_mut().skip(kind.index()) {
        step.done = false;
        step.completed_at = None;
    }
}
