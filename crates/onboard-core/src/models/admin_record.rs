//! Administrator-side onboarding record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::appointment::AppointmentInfo;
use super::employee_id::EmployeeId;
use super::notification::Notification;
use super::shift::ShiftSelection;
use super::step::{Step, default_steps};

/// A second writable view of onboarding state, keyed by employee id, that
/// administrators can edit before the employee has ever signed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRecord {
    pub employee_id: EmployeeId,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub shift: ShiftSelection,
    #[serde(default)]
    pub appointment: AppointmentInfo,
    #[serde(default)]
    pub notifications: Vec<Notification>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AdminRecord {
    pub fn new(employee_id: EmployeeId, now: DateTime<Utc>) -> Self {
        Self {
            employee_id,
            steps: default_steps(),
            shift: ShiftSelection::default(),
            appointment: AppointmentInfo::default(),
            notifications: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
