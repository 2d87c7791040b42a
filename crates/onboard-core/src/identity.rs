//! Identity provider abstraction.

use tokio::sync::watch;

use crate::error::OnboardResult;
use crate::models::principal::Principal;

/// Email/password credentials presented at sign-in.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Authenticates principals. Implementations own the credential store;
/// the engine only sees the resulting [`Principal`].
pub trait IdentityProvider: Send + Sync {
    /// Fails with `AuthenticationFailed` on unknown accounts and wrong
    /// passwords alike.
    fn sign_in(
        &self,
        credentials: Credentials,
    ) -> impl Future<Output = OnboardResult<Principal>> + Send;

    fn sign_out(&self) -> impl Future<Output = OnboardResult<()>> + Send;

    /// Current sign-in state. The receiver observes every change, with
    /// `None` meaning signed out.
    fn auth_state(&self) -> watch::Receiver<Option<Principal>>;
}
