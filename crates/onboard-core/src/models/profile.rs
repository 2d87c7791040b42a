//! Employee profile model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::appointment::AppointmentInfo;
use super::employee_id::EmployeeId;
use super::notification::Notification;
use super::principal::Principal;
use super::shift::ShiftSelection;
use super::step::{Step, default_steps, stage_for};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Employee,
    Admin,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
    #[default]
    Pending,
    Active,
    Suspended,
}

/// Number of safety-footwear statements an employee must accept.
pub const FOOTWEAR_ACKNOWLEDGEMENTS: usize = 5;

/// Statements the employee accepted while completing steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgements {
    #[serde(default)]
    pub footwear: [bool; FOOTWEAR_ACKNOWLEDGEMENTS],
    #[serde(default)]
    pub i9: bool,
}

/// Per-principal onboarding state.
///
/// Created unlinked on first sign-in; `employee_id` is set exactly once by
/// the identity-linking service and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub principal_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "fullName")]
    pub display_name: String,
    #[serde(default)]
    pub employee_id: Option<EmployeeId>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub status: ProfileStatus,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub shift: ShiftSelection,
    #[serde(default)]
    pub appointment: AppointmentInfo,
    #[serde(default)]
    pub acknowledgements: Acknowledgements,
    #[serde(default)]
    pub notifications: Vec<Notification>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl EmployeeProfile {
    /// An unlinked profile for a principal signing in for the first time.
    pub fn new(principal: &Principal, now: DateTime<Utc>) -> Self {
        let steps = default_steps();
        Self {
            principal_id: principal.id.clone(),
            email: principal.email.clone(),
            display_name: principal.display_name.clone(),
            employee_id: None,
            role: Role::Employee,
            verified: false,
            status: ProfileStatus::Pending,
            stage: stage_for(&steps),
            steps,
            shift: ShiftSelection::default(),
            appointment: AppointmentInfo::default(),
            acknowledgements: Acknowledgements::default(),
            notifications: Vec::new(),
            created_at: now,
            updated_at: now,
            last_login_at: Some(now),
        }
    }

    pub fn is_linked(&self) -> bool {
        self.employee_id.is_some()
    }
}
