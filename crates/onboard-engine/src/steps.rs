//! The onboarding state machine.
//!
//! Steps complete strictly in order. Completing a step stamps it, unlocks
//! its successor and advances `stage`; the terminal step also activates
//! the profile. Writes carry the profile's version, and a conflicting
//! write is retried from a fresh read so a step completed concurrently in
//! another tab surfaces as [`StepError::AlreadyDone`].

use chrono::Utc;
use onboard_core::error::{OnboardResult, StepError};
use onboard_core::models::employee_id::EmployeeId;
use onboard_core::models::profile::{EmployeeProfile, FOOTWEAR_ACKNOWLEDGEMENTS, ProfileStatus};
use onboard_core::models::shift::ShiftSelection;
use onboard_core::models::step::{self, Progress, StepKind, recompute_locks, stage_for};
use onboard_core::store::{Collection, DocumentStore, DocumentStoreExt, Versioned};
use serde_json::json;
use tracing::{debug, info};

use crate::config::RetryPolicy;
use crate::profiles;
use crate::retry::with_retry;

/// What the employee submits to complete a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepInput {
    ShiftSelection { position: String, shift_code: String },
    Footwear { acknowledgements: [bool; FOOTWEAR_ACKNOWLEDGEMENTS] },
    I9 { acknowledged: bool },
    PhotoBadge,
    FirstDay,
}

impl StepInput {
    pub fn kind(&self) -> StepKind {
        match self {
            StepInput::ShiftSelection { .. } => StepKind::ShiftSelection,
            StepInput::Footwear { .. } => StepKind::Footwear,
            StepInput::I9 { .. } => StepKind::I9,
            StepInput::PhotoBadge => StepKind::PhotoBadge,
            StepInput::FirstDay => StepKind::FirstDay,
        }
    }

    fn validate(&self, kind: StepKind) -> Result<(), StepError> {
        let invalid = |reason: &str| StepError::InvalidInput {
            step: kind.id().to_string(),
            reason: reason.to_string(),
        };
        if self.kind() != kind {
            return Err(invalid(&format!("expected input for {}", kind.id())));
        }
        match self {
            StepInput::ShiftSelection { position, shift_code } => {
                if position.trim().is_empty() || shift_code.trim().is_empty() {
                    return Err(invalid("position and shift are required"));
                }
            }
            StepInput::Footwear { acknowledgements } => {
                if !acknowledgements.iter().all(|a| *a) {
                    return Err(invalid("every footwear statement must be acknowledged"));
                }
            }
            StepInput::I9 { acknowledged } => {
                if !acknowledged {
                    return Err(invalid("document readiness must be acknowledged"));
                }
            }
            StepInput::PhotoBadge | StepInput::FirstDay => {}
        }
        Ok(())
    }

    /// Record the input's side effects on the profile.
    fn apply(&self, profile: &mut EmployeeProfile) {
        let now = Utc::now();
        match self {
            StepInput::ShiftSelection { position, shift_code } => {
                profile.shift = ShiftSelection::submitted(position, shift_code, now);
            }
            StepInput::Footwear { acknowledgements } => {
                profile.acknowledgements.footwear = *acknowledgements;
            }
            StepInput::I9 { acknowledged } => {
                profile.acknowledgements.i9 = *acknowledged;
            }
            StepInput::PhotoBadge => {}
            StepInput::FirstDay => {
                profile.status = ProfileStatus::Active;
            }
        }
    }
}

pub fn is_onboarding_complete(profile: &EmployeeProfile) -> bool {
    step::is_complete(&profile.steps)
}

/// The next step the employee can act on, or `None` once onboarding is
/// complete.
pub fn next_step(profile: &EmployeeProfile) -> Option<StepKind> {
    step::next_step(&profile.steps).and_then(|s| s.kind())
}

pub fn progress(profile: &EmployeeProfile) -> Progress {
    Progress::of(&profile.steps)
}

pub struct OnboardingStateMachine<S: DocumentStore> {
    store: S,
    retry: RetryPolicy,
}

impl<S: DocumentStore> OnboardingStateMachine<S> {
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Complete `step_id` for the employee linked to `employee_id`.
    pub async fn complete_step(
        &self,
        employee_id: &EmployeeId,
        step_id: &str,
        input: StepInput,
    ) -> OnboardResult<EmployeeProfile> {
        let kind = StepKind::from_id(step_id)
            .ok_or_else(|| StepError::UnknownStep(step_id.to_string()))?;

        let profile = with_retry(&self.retry, "complete_step", || {
            self.try_complete(employee_id, kind, &input)
        })
        .await?;

        info!(
            %employee_id,
            step = kind.id(),
            stage = %profile.stage,
            "Onboarding step completed"
        );
        Ok(profile)
    }

    async fn try_complete(
        &self,
        employee_id: &EmployeeId,
        kind: StepKind,
        input: &StepInput,
    ) -> OnboardResult<EmployeeProfile> {
        let Versioned { value: mut profile, version } =
            profiles::require_linked(&self.store, employee_id).await?;

        if profile.status == ProfileStatus::Suspended {
            return Err(StepError::Suspended.into());
        }
        let index = kind.index();
        if profile.steps[index].locked {
            return Err(StepError::StepLocked(kind.id().to_string()).into());
        }
        if profile.steps[index].done {
            return Err(StepError::AlreadyDone(kind.id().to_string()).into());
        }
        input.validate(kind)?;

        let now = Utc::now();
        input.apply(&mut profile);
        let target = &mut profile.steps[index];
        target.done = true;
        target.completed_at = Some(now);
        recompute_locks(&mut profile.steps);
        profile.stage = stage_for(&profile.steps);
        profile.updated_at = now;

        let mut fields = json!({
            "steps": profile.steps,
            "stage": profile.stage,
            "status": profile.status,
            "updated_at": profile.updated_at,
        });
        match kind {
            StepKind::ShiftSelection => fields["shift"] = json!(profile.shift),
            StepKind::Footwear | StepKind::I9 => {
                fields["acknowledgements"] = json!(profile.acknowledgements)
            }
            _ => {}
        }

        self.store
            .patch(Collection::Profiles, &profile.principal_id, fields, Some(version))
            .await?;
        debug!(%employee_id, step = kind.id(), version = version + 1, "Profile updated");
        Ok(profile)
    }
}
