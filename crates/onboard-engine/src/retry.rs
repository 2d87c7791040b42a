//! Retrying store operations under a [`RetryPolicy`].

use onboard_core::error::OnboardResult;
use tracing::warn;

use crate::config::RetryPolicy;

/// Run `op` until it succeeds, fails with a non-transient error, or the
/// policy's attempts are used up. Every attempt starts from fresh reads,
/// so `op` must not capture state loaded by a previous attempt.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> OnboardResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = OnboardResult<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < attempts => {
                let delay = policy.backoff(attempt);
                warn!(operation, attempt, ?delay, error = %e, "Transient store error, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
