//! Email/password identity provider backed by the document store.

use onboard_core::error::{OnboardError, OnboardResult};
use onboard_core::identity::{Credentials, IdentityProvider};
use onboard_core::models::principal::Principal;
use onboard_core::store::{Collection, DocumentStore, DocumentStoreExt};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::IdentityError;
use crate::password::{hash_password, verify_password};

/// A stored account in the `credentials` collection, keyed by the
/// lower-cased email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub principal_id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    pub password_hash: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct LocalIdentityProvider<S: DocumentStore> {
    store: S,
    pepper: Option<String>,
    min_password_length: usize,
    state: watch::Sender<Option<Principal>>,
}

impl<S: DocumentStore> LocalIdentityProvider<S> {
    pub fn new(store: S, config: &EngineConfig) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            store,
            pepper: config.pepper.clone(),
            min_password_length: config.min_password_length,
            state,
        }
    }

    /// Create an account and return its new principal. Does not sign in.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> OnboardResult<Principal> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(OnboardError::Validation {
                message: "a valid email is required".into(),
            });
        }
        if password.chars().count() < self.min_password_length {
            return Err(IdentityError::WeakPassword {
                min: self.min_password_length,
            }
            .into());
        }

        let credential = Credential {
            principal_id: Uuid::new_v4().to_string(),
            email: email.clone(),
            display_name: display_name.trim().to_string(),
            password_hash: hash_password(password, self.pepper.as_deref())?,
        };
        match self
            .store
            .save(Collection::Credentials, &email, &credential, Some(0))
            .await
        {
            Ok(_) => {}
            Err(OnboardError::Conflict { .. }) => return Err(IdentityError::EmailTaken.into()),
            Err(e) => return Err(e),
        }

        info!(principal_id = %credential.principal_id, "Account registered");
        Ok(principal_of(credential))
    }

    /// The signed-in principal, if any.
    pub fn current(&self) -> Option<Principal> {
        self.state.borrow().clone()
    }
}

fn principal_of(credential: Credential) -> Principal {
    Principal {
        id: credential.principal_id,
        email: credential.email,
        display_name: credential.display_name,
    }
}

impl<S: DocumentStore> IdentityProvider for LocalIdentityProvider<S> {
    async fn sign_in(&self, credentials: Credentials) -> OnboardResult<Principal> {
        let email = normalize_email(&credentials.email);
        let Some(stored) = self
            .store
            .load::<Credential>(Collection::Credentials, &email)
            .await?
        else {
            warn!("Sign-in for unknown account");
            return Err(IdentityError::InvalidCredentials.into());
        };

        let valid = verify_password(
            &credentials.password,
            &stored.value.password_hash,
            self.pepper.as_deref(),
        )?;
        if !valid {
            warn!(principal_id = %stored.value.principal_id, "Sign-in with wrong password");
            return Err(IdentityError::InvalidCredentials.into());
        }

        let principal = principal_of(stored.value);
        info!(principal_id = %principal.id, "Signed in");
        self.state.send_replace(Some(principal.clone()));
        Ok(principal)
    }

    async fn sign_out(&self) -> OnboardResult<()> {
        if let Some(previous) = self.state.send_replace(None) {
            info!(principal_id = %previous.id, "Signed out");
        }
        Ok(())
    }

    fn auth_state(&self) -> watch::Receiver<Option<Principal>> {
        self.state.subscribe()
    }
}
