//! Signed-in session context.
//!
//! A session is an explicit value handed to callers after sign-in; the
//! engine keeps no process-wide "current user".

use onboard_core::error::{OnboardError, OnboardResult, StepError};
use onboard_core::models::employee_id::EmployeeId;
use onboard_core::models::principal::Principal;
use onboard_core::models::profile::EmployeeProfile;
use onboard_core::models::step::{Progress, StepKind};
use onboard_core::store::DocumentStore;
use tracing::info;
use uuid::Uuid;

use crate::admin::AdminService;
use crate::config::EngineConfig;
use crate::linking::IdentityLinkingService;
use crate::profiles;
use crate::reconcile::{ReconcileHandle, SyncReconciler};
use crate::role::{Resolution, RoleResolver};
use crate::route::Route;
use crate::steps::{self, OnboardingStateMachine, StepInput};

/// Entry point after authentication: resolves the role and hands out the
/// matching session.
pub struct OnboardingSession<S: DocumentStore + Clone + 'static> {
    store: S,
    config: EngineConfig,
}

pub enum SignedIn<S: DocumentStore + Clone + 'static> {
    Admin(AdminSession<S>),
    Employee(EmployeeSession<S>),
}

impl<S: DocumentStore + Clone + 'static> OnboardingSession<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub async fn start(&self, principal: Principal) -> OnboardResult<SignedIn<S>> {
        let resolution = RoleResolver::new(self.store.clone())
            .resolve_role(&principal)
            .await?;

        match resolution {
            Resolution::Admin => {
                info!(principal_id = %principal.id, "Admin session started");
                Ok(SignedIn::Admin(AdminSession {
                    service: AdminService::new(self.store.clone(), self.config.clone()),
                    principal,
                }))
            }
            Resolution::Employee(_) => {
                let linking = IdentityLinkingService::new(self.store.clone(), self.config.clone());
                let employee_id = linking.reconcile_link(&principal).await?;
                info!(
                    principal_id = %principal.id,
                    linked = employee_id.is_some(),
                    "Employee session started"
                );
                Ok(SignedIn::Employee(EmployeeSession {
                    store: self.store.clone(),
                    machine: OnboardingStateMachine::new(
                        self.store.clone(),
                        self.config.retry.clone(),
                    ),
                    reconciler: SyncReconciler::new(self.store.clone(), self.config.retry.clone()),
                    linking,
                    principal,
                    employee_id,
                }))
            }
        }
    }
}

pub struct AdminSession<S: DocumentStore> {
    principal: Principal,
    service: AdminService<S>,
}

impl<S: DocumentStore> AdminSession<S> {
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Administrator operations; pass [`AdminSession::principal`] as the
    /// acting principal.
    pub fn service(&self) -> &AdminService<S> {
        &self.service
    }
}

pub struct EmployeeSession<S: DocumentStore + Clone + 'static> {
    principal: Principal,
    employee_id: Option<EmployeeId>,
    store: S,
    linking: IdentityLinkingService<S>,
    machine: OnboardingStateMachine<S>,
    reconciler: SyncReconciler<S>,
}

impl<S: DocumentStore + Clone + 'static> EmployeeSession<S> {
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn employee_id(&self) -> Option<&EmployeeId> {
        self.employee_id.as_ref()
    }

    pub async fn link(&mut self, claimed_employee_id: &str) -> OnboardResult<EmployeeId> {
        let employee_id = self
            .linking
            .link_identity(&self.principal, claimed_employee_id)
            .await?;
        self.employee_id = Some(employee_id.clone());
        Ok(employee_id)
    }

    pub async fn complete_step(
        &self,
        step_id: &str,
        input: StepInput,
    ) -> OnboardResult<EmployeeProfile> {
        let employee_id = self.linked()?;
        self.machine.complete_step(employee_id, step_id, input).await
    }

    /// The current profile, reconciled with the admin record once linked.
    pub async fn view(&self) -> OnboardResult<EmployeeProfile> {
        match &self.employee_id {
            Some(employee_id) => self.reconciler.sync(employee_id).await,
            None => profiles::load_profile(&self.store, &self.principal.id)
                .await?
                .map(|p| p.value)
                .ok_or_else(|| OnboardError::not_found("profile", &self.principal.id)),
        }
    }

    /// Live merged view of the linked record.
    pub async fn watch(&self) -> OnboardResult<ReconcileHandle> {
        let employee_id = self.linked()?;
        self.reconciler.watch(employee_id).await
    }

    pub async fn progress(&self) -> OnboardResult<Progress> {
        Ok(steps::progress(&self.view().await?))
    }

    pub async fn next_step(&self) -> OnboardResult<Option<StepKind>> {
        Ok(steps::next_step(&self.view().await?))
    }

    pub async fn is_onboarding_complete(&self) -> OnboardResult<bool> {
        Ok(steps::is_onboarding_complete(&self.view().await?))
    }

    /// Resolve a requested route against the current gating state.
    pub async fn open(&self, route: Route) -> OnboardResult<Route> {
        Ok(route.dispatch(&self.view().await?.steps))
    }

    pub async fn mark_notification_read(
        &self,
        notification_id: Uuid,
    ) -> OnboardResult<EmployeeProfile> {
        profiles::mark_notification_read(&self.store, &self.principal.id, notification_id).await
    }

    fn linked(&self) -> OnboardResult<&EmployeeId> {
        self.employee_id
            .as_ref()
            .ok_or_else(|| StepError::NotLinked(self.principal.id.clone()).into())
    }
}
