//! HR-issued employee identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LinkError;

/// Prefix used by HR for every issued identifier.
pub const DEFAULT_PREFIX: &str = "SP";

/// A normalized employee identifier such as `SP001`.
///
/// Values are only constructed through [`EmployeeId::parse`], so every
/// instance is uppercase, separator-free and `prefix + digits`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(String);

impl EmployeeId {
    /// Normalize user input into an identifier.
    ///
    /// Uppercases, drops whitespace, `-` and `_`, then requires `prefix`
    /// followed by at least one ASCII digit.
    pub fn parse(input: &str, prefix: &str) -> Result<Self, LinkError> {
        let normalized: String = input
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .flat_map(char::to_uppercase)
            .collect();

        let prefix = prefix.to_uppercase();
        let digits = normalized
            .strip_prefix(prefix.as_str())
            .filter(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
            .ok_or_else(|| LinkError::InvalidFormat {
                input: input.to_string(),
            })?;

        Ok(Self(format!("{prefix}{digits}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EmployeeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
