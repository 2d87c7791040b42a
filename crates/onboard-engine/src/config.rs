//! Engine configuration.

use std::time::Duration;

use onboard_core::models::employee_id::DEFAULT_PREFIX;

/// Exponential backoff for store writes that hit a version conflict or a
/// transient outage.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first (default: 5).
    pub max_attempts: u32,
    /// Delay before the second attempt (default: 25 ms).
    pub initial_backoff: Duration,
    /// Upper bound for any single delay (default: 1 s).
    pub max_backoff: Duration,
    /// Growth factor between consecutive delays (default: 2.0).
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as i32;
        let delay = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_backoff.as_secs_f64()))
    }

    /// A policy that retries immediately; handy in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(25),
            max_backoff: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Prefix every HR-issued employee id carries (default: `SP`).
    pub employee_id_prefix: String,
    pub retry: RetryPolicy,
    /// Optional pepper prepended to passwords before Argon2id hashing.
    pub pepper: Option<String>,
    /// Minimum password length accepted at registration (default: 8).
    pub min_password_length: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            employee_id_prefix: DEFAULT_PREFIX.into(),
            retry: RetryPolicy::default(),
            pepper: None,
            min_password_length: 8,
        }
    }
}
