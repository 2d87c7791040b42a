//! Local identity provider error types.

use onboard_core::error::OnboardError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("an account with this email already exists")]
    EmailTaken,

    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<IdentityError> for OnboardError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidCredentials => OnboardError::AuthenticationFailed {
                reason: err.to_string(),
            },
            IdentityError::EmailTaken => OnboardError::AlreadyExists {
                entity: "credential".into(),
                id: "email".into(),
            },
            IdentityError::WeakPassword { .. } => OnboardError::Validation {
                message: err.to_string(),
            },
            IdentityError::Crypto(msg) => OnboardError::Internal(msg),
        }
    }
}
