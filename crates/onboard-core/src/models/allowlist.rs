//! Allow-list registry model.
//!
//! The allow-list is the source of truth for which employee identifiers
//! may be claimed. Entries are created by administrators and mutated by
//! the identity-linking service when a claim succeeds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::employee_id::EmployeeId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllowlistStatus {
    #[default]
    Unclaimed,
    /// Reserved for a specific email but not yet claimed.
    Assigned,
    Verified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowlistEntry {
    pub employee_id: EmployeeId,
    #[serde(default)]
    pub full_name: Option<String>,
    /// Expected email of the claimant, when HR recorded one.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default, alias = "uid")]
    pub claimed_by_principal_id: Option<String>,
    #[serde(default)]
    pub status: AllowlistStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, alias = "registeredAt")]
    pub claimed_at: Option<DateTime<Utc>>,
}

impl AllowlistEntry {
    pub fn new(input: CreateAllowlistEntry, now: DateTime<Utc>) -> Self {
        let email = input
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        let status = if email.is_some() {
            AllowlistStatus::Assigned
        } else {
            AllowlistStatus::Unclaimed
        };
        Self {
            employee_id: input.employee_id,
            full_name: Some(input.full_name.trim().to_string()),
            email,
            active: true,
            claimed_by_principal_id: None,
            status,
            created_at: now,
            updated_at: now,
            claimed_at: None,
        }
    }

    /// Case-insensitive comparison against the expected email. Entries
    /// without an expected email accept anyone.
    pub fn email_matches(&self, email: &str) -> bool {
        self.email
            .as_deref()
            .is_none_or(|expected| expected.trim().eq_ignore_ascii_case(email.trim()))
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed_by_principal_id
            .as_deref()
            .is_some_and(|id| !id.is_empty())
    }

    pub fn is_claimed_by(&self, principal_id: &str) -> bool {
        self.claimed_by_principal_id.as_deref() == Some(principal_id)
    }
}

/// Fields an administrator supplies when registering an identifier.
#[derive(Debug, Clone)]
pub struct CreateAllowlistEntry {
    pub employee_id: EmployeeId,
    pub full_name: String,
    pub email: Option<String>,
}
