//! Error types for the onboarding engine.

use thiserror::Error;

/// Reasons an identity link can be refused.
///
/// All of these are recoverable by the user (correct the input or ask an
/// administrator) and are never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("employee id is malformed: {input:?}")]
    InvalidFormat { input: String },

    #[error("employee id {0} is not registered")]
    NotFound(String),

    #[error("employee id {0} is inactive")]
    Inactive(String),

    #[error("employee id {0} is registered to a different email")]
    IdentityMismatch(String),

    #[error("employee id {0} is already registered to another account")]
    AlreadyClaimed(String),

    #[error("account is already linked to employee id {0}")]
    AlreadyLinked(String),
}

/// Misuse of the onboarding state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("unknown onboarding step: {0}")]
    UnknownStep(String),

    #[error("step {0} is locked until its predecessor is done")]
    StepLocked(String),

    #[error("step {0} is already done")]
    AlreadyDone(String),

    #[error("invalid input for step {step}: {reason}")]
    InvalidInput { step: String, reason: String },

    #[error("account is suspended")]
    Suspended,

    #[error("employee id {0} is not linked to an account")]
    NotLinked(String),
}

#[derive(Debug, Error)]
pub enum OnboardError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity} with id {id}")]
    AlreadyExists { entity: String, id: String },

    #[error("Write conflict on {collection}/{key}")]
    Conflict { collection: String, key: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Step(#[from] StepError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OnboardError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Whether retrying the same operation with fresh reads may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Unavailable(_))
    }
}

pub type OnboardResult<T> = Result<T, OnboardError>;
