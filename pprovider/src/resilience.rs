//! Retry with exponential backoff around opening a provider stream.
//!
//! Only the open is retried. Once deltas have reached the client a failure is
//! terminal, since replaying would duplicate text already delivered.
//!
//! ```rust
//! use std::time::Duration;
//! use pprovider::{ProviderError, RetryPolicy};
//!
//! let policy = RetryPolicy::new(3).with_initial_backoff(Duration::from_millis(50));
//! assert!(policy.should_retry(1, &ProviderError::rate_limited("slow down")));
//! assert!(!policy.should_retry(1, &ProviderError::authentication("bad key")));
//! assert_eq!(policy.backoff_for_attempt(2), Duration::from_millis(100));
//! ```

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{ProviderError, ProviderId};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never below one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(8),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self::new(1)
    }

    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Values below 1.0 (and NaN) fall back to a flat backoff.
    pub fn with_backoff_multiplier(mut self, backoff_multiplier: f64) -> Self {
        self.backoff_multiplier = if backoff_multiplier.is_nan() {
            1.0
        } else {
            backoff_multiplier.max(1.0)
        };
        self
    }

    pub fn should_retry(&self, attempt: u32, error: &ProviderError) -> bool {
        error.retryable && !error.is_cancelled() && attempt < self.max_attempts
    }

    /// Delay after the given (1-based) failed attempt, capped at `max_backoff`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let steps = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(steps);
        let capped = scaled.min(self.max_backoff.as_secs_f64());
        if capped.is_finite() {
            Duration::from_secs_f64(capped)
        } else {
            self.max_backoff
        }
    }
}

/// Observes each provider operation. Every method defaults to a no-op.
pub trait ProviderOperationHooks: Send + Sync {
    fn on_attempt_start(&self, _provider: ProviderId, _operation: &str, _attempt: u32) {}

    fn on_retry_scheduled(
        &self,
        _provider: ProviderId,
        _operation: &str,
        _attempt: u32,
        _delay: Duration,
        _error: &ProviderError,
    ) {
    }

    fn on_success(&self, _provider: ProviderId, _operation: &str, _attempts: u32) {}

    fn on_failure(
        &self,
        _provider: ProviderId,
        _operation: &str,
        _attempts: u32,
        _error: &ProviderError,
    ) {
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOperationHooks;

impl ProviderOperationHooks for NoopOperationHooks {}

/// Runs `execute` until it succeeds, fails permanently, or `cancellation` trips.
///
/// `sleep` is injected so tests can observe the schedule without waiting.
/// A cancellation, whether before an attempt or during a backoff, yields a
/// [`ProviderErrorKind::Cancelled`](crate::ProviderErrorKind::Cancelled) error.
pub async fn execute_with_retry<T, Op, OpFuture, Sleep, SleepFuture>(
    provider: ProviderId,
    operation: &str,
    policy: &RetryPolicy,
    hooks: &dyn ProviderOperationHooks,
    cancellation: &CancellationToken,
    mut execute: Op,
    mut sleep: Sleep,
) -> Result<T, ProviderError>
where
    Op: FnMut(u32) -> OpFuture,
    OpFuture: Future<Output = Result<T, ProviderError>>,
    Sleep: FnMut(Duration) -> SleepFuture,
    SleepFuture: Future<Output = ()>,
{
    let mut attempt = 1;

    loop {
        if cancellation.is_cancelled() {
            let error = ProviderError::cancelled(format!("{operation} cancelled before attempt {attempt}"));
            hooks.on_failure(provider, operation, attempt - 1, &error);
            return Err(error);
        }

        hooks.on_attempt_start(provider, operation, attempt);
        let error = tokio::select! {
            biased;
            _ = cancellation.cancelled() => ProviderError::cancelled(format!("{operation} cancelled")),
            result = execute(attempt) => match result {
                Ok(value) => {
                    hooks.on_success(provider, operation, attempt);
                    return Ok(value);
                }
                Err(error) => error,
            },
        };

        if !policy.should_retry(attempt, &error) {
            hooks.on_failure(provider, operation, attempt, &error);
            return Err(error);
        }

        let delay = policy.backoff_for_attempt(attempt);
        hooks.on_retry_scheduled(provider, operation, attempt, delay, &error);
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => {}
            _ = sleep(delay) => {}
        }
        attempt += 1;
    }
}
