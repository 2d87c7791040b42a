//! Shift selection model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// The employee's preferred position and shift, plus the administrator's
/// decision on it. `approved` is only ever set by an administrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftSelection {
    #[serde(default)]
    pub position: String,
    #[serde(default, alias = "shift")]
    pub shift_code: String,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub status: ShiftStatus,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "approvedAt")]
    pub decided_at: Option<DateTime<Utc>>,
}

impl ShiftSelection {
    /// A fresh, undecided selection.
    pub fn submitted(position: &str, shift_code: &str, at: DateTime<Utc>) -> Self {
        Self {
            position: position.trim().to_string(),
            shift_code: shift_code.trim().to_string(),
            approved: false,
            status: ShiftStatus::Pending,
            submitted_at: Some(at),
            decided_at: None,
        }
    }

    pub fn is_selected(&self) -> bool {
        !self.position.is_empty()
    }

    pub fn is_decided(&self) -> bool {
        self.status != ShiftStatus::Pending
    }

    /// Whether both selections name the same position and shift.
    pub fn same_choice(&self, other: &ShiftSelection) -> bool {
        self.position == other.position && self.shift_code == other.shift_code
    }
}
