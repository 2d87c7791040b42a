//! Reconciling the employee's profile with the administrator's record.
//!
//! Both documents are written independently. [`merge`] folds the admin
//! record into the profile with monotonic rules (done flags and read
//! flags only ever turn on), so re-running it with the same inputs is a
//! no-op and concurrent writers converge.

use onboard_core::error::OnboardResult;
use onboard_core::models::admin_record::AdminRecord;
use onboard_core::models::employee_id::EmployeeId;
use onboard_core::models::notification::merge_notifications;
use onboard_core::models::profile::EmployeeProfile;
use onboard_core::models::shift::ShiftSelection;
use onboard_core::models::step::{Step, migrate_steps, stage_for};
use onboard_core::store::{Collection, DocumentStore, DocumentStoreExt, Versioned};
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RetryPolicy;
use crate::profiles;
use crate::retry::with_retry;

/// Fold `admin` into `employee`.
///
/// - Steps: union of `done`, earliest `completed_at`, locks recomputed.
///   Admin steps with unknown ids are ignored.
/// - Appointment: the admin's, only while the employee's is empty.
/// - Shift: the employee's selection wins; an admin decision on the same
///   position and shift (or any admin selection when the employee has
///   none) is applied.
/// - Notifications: union by id, read flags or-ed.
pub fn merge(employee: &EmployeeProfile, admin: &AdminRecord) -> EmployeeProfile {
    let mut merged = employee.clone();
    merged.steps = merge_steps(&employee.steps, &admin.steps);
    if merged.appointment.is_empty() {
        merged.appointment = admin.appointment.clone();
    }
    merged.shift = merge_shift(&employee.shift, &admin.shift);
    merged.notifications = merge_notifications(&employee.notifications, &admin.notifications);
    merged.stage = stage_for(&merged.steps);
    merged
}

fn merge_steps(employee: &[Step], admin: &[Step]) -> Vec<Step> {
    let combined: Vec<Step> = employee.iter().chain(admin).cloned().collect();
    migrate_steps(&combined)
}

fn merge_shift(employee: &ShiftSelection, admin: &ShiftSelection) -> ShiftSelection {
    if !employee.is_selected() {
        return admin.clone();
    }
    let mut shift = employee.clone();
    if admin.is_decided() && admin.same_choice(employee) {
        shift.approved = admin.approved;
        shift.status = admin.status;
        shift.decided_at = admin.decided_at;
    }
    shift
}

/// The subset of profile fields the reconciler owns.
fn reconciled_fields(profile: &EmployeeProfile) -> Value {
    json!({
        "steps": profile.steps,
        "stage": profile.stage,
        "shift": profile.shift,
        "appointment": profile.appointment,
        "notifications": profile.notifications,
    })
}

pub struct SyncReconciler<S: DocumentStore> {
    store: S,
    retry: RetryPolicy,
}

impl<S: DocumentStore> SyncReconciler<S> {
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Merge the admin record into the linked profile and persist the
    /// result. Conflicts and transient failures are retried with fresh
    /// reads.
    pub async fn sync(&self, employee_id: &EmployeeId) -> OnboardResult<EmployeeProfile> {
        with_retry(&self.retry, "sync", || self.try_sync(employee_id)).await
    }

    async fn try_sync(&self, employee_id: &EmployeeId) -> OnboardResult<EmployeeProfile> {
        let Versioned { value: profile, version } =
            profiles::require_linked(&self.store, employee_id).await?;
        let Some(record) = self
            .store
            .load::<AdminRecord>(Collection::AdminRecords, employee_id.as_str())
            .await?
        else {
            return Ok(profile);
        };

        let merged = merge(&profile, &record.value);
        let fields = reconciled_fields(&merged);
        if fields == reconciled_fields(&profile) {
            return Ok(merged);
        }

        self.store
            .patch(Collection::Profiles, &profile.principal_id, fields, Some(version))
            .await?;
        debug!(%employee_id, stage = %merged.stage, "Profile reconciled");
        Ok(merged)
    }
}

impl<S: DocumentStore + Clone + 'static> SyncReconciler<S> {
    /// Keep the employee's merged view current: every change to the
    /// profile or the admin record triggers a sync, and the result is
    /// published on the returned handle.
    pub async fn watch(&self, employee_id: &EmployeeId) -> OnboardResult<ReconcileHandle> {
        let initial = self.sync(employee_id).await?;
        let mut profile_sub = self
            .store
            .subscribe(Collection::Profiles, &initial.principal_id)
            .await?;
        let mut record_sub = self
            .store
            .subscribe(Collection::AdminRecords, employee_id.as_str())
            .await?;

        let (tx, rx) = watch::channel(initial);
        let reconciler = SyncReconciler::new(self.store.clone(), self.retry.clone());
        let employee_id = employee_id.clone();
        info!(%employee_id, "Watching onboarding record");

        let task = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    event = profile_sub.next() => event,
                    event = record_sub.next() => event,
                };
                if event.is_none() {
                    break;
                }
                match reconciler.sync(&employee_id).await {
                    Ok(view) => {
                        tx.send_if_modified(|current| {
                            if *current == view {
                                return false;
                            }
                            *current = view;
                            true
                        });
                    }
                    Err(e) => warn!(%employee_id, error = %e, "Reconciliation failed"),
                }
            }
            debug!(%employee_id, "Reconcile watcher stopped");
        });

        Ok(ReconcileHandle {
            view: rx,
            task: Some(task),
        })
    }
}

/// A running reconciliation. Closing or dropping the handle stops the
/// watcher and releases both store subscriptions.
pub struct ReconcileHandle {
    view: watch::Receiver<EmployeeProfile>,
    task: Option<JoinHandle<()>>,
}

impl ReconcileHandle {
    /// The latest merged view.
    pub fn current(&self) -> EmployeeProfile {
        self.view.borrow().clone()
    }

    /// Wait for the merged view to change. `None` once the watcher has
    /// stopped.
    pub async fn changed(&mut self) -> Option<EmployeeProfile> {
        self.view.changed().await.ok()?;
        Some(self.view.borrow_and_update().clone())
    }

    /// Another receiver of the merged view.
    pub fn subscribe(&self) -> watch::Receiver<EmployeeProfile> {
        self.view.clone()
    }

    /// Stop the watcher and wait until its subscriptions are released.
    pub async fn close(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for ReconcileHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
