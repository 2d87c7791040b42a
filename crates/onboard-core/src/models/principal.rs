//! Authenticated identity model.

use serde::{Deserialize, Serialize};

/// An identity returned by the identity provider. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable, provider-issued identifier.
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
}
