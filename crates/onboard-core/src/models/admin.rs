//! Administrator registry entries.

use serde::{Deserialize, Serialize};

/// A document in the `admins` collection, keyed by principal id.
///
/// Older registrations used either `role: "admin"` or `is_admin: true`;
/// both are honoured and anything else means "not an administrator".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRegistration {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, alias = "isAdmin")]
    pub is_admin: Option<bool>,
}

impl AdminRegistration {
    pub fn admin(email: &str) -> Self {
        Self {
            email: email.to_string(),
            role: Some("admin".into()),
            is_admin: Some(true),
        }
    }

    pub fn grants_admin(&self) -> bool {
        self.role.as_deref() == Some("admin") || self.is_admin == Some(true)
    }
}
