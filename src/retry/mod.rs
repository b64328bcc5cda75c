//! Retry coordinator: per-key attempt ledger with exponential backoff.
//!
//! The ledger is never evicted automatically. Callers reset a key after a
//! successful operation, or call [`RetryCoordinator::clear_all`] to bound growth.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bon::Builder;
use tokio_util::sync::CancellationToken;

use crate::classify::StructuredError;
use crate::error::{ErrorKind, ReloginError};

/// Retry policy configuration.
#[derive(Debug, Clone, Builder)]
pub struct RetryConfig {
    /// Global switch; when false `should_retry` always answers no.
    #[builder(default = true)]
    pub enabled: bool,
    /// Permitted retries per key before `should_retry` answers no.
    #[builder(default = 3)]
    pub max_retries: u32,
    /// Delay before the first retry.
    #[builder(default = Duration::from_millis(1000))]
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    #[builder(default = Duration::from_millis(10_000))]
    pub max_delay: Duration,
    #[builder(default = 2.0)]
    pub backoff_multiplier: f64,
    /// Kinds eligible for retry, on top of each error's own retryability.
    #[builder(default = ErrorKind::retryable_kinds())]
    pub retryable_kinds: HashSet<ErrorKind>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryConfig {
    /// Backoff before a retry when `attempts` retries were already consumed.
    pub fn delay_for_attempt(&self, attempts: u32) -> Duration {
        let exponent = i32::try_from(attempts).unwrap_or(i32::MAX);
        let secs = (self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent))
            .min(self.max_delay.as_secs_f64())
            .max(0.0);
        Duration::from_secs_f64(secs)
    }
}

/// Decides whether failed operations may be retried and runs the retries.
#[derive(Debug, Default)]
pub struct RetryCoordinator {
    config: RetryConfig,
    ledger: Mutex<HashMap<String, u32>>,
}

impl RetryCoordinator {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            ledger: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    fn ledger(&self) -> MutexGuard<'_, HashMap<String, u32>> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `error` may be retried under `key`.
    ///
    /// Every call that gets past the eligibility checks consumes one attempt,
    /// whether or not the caller goes on to retry.
    pub fn should_retry(&self, error: &StructuredError, key: &str) -> bool {
        if !self.config.enabled
            || !error.is_retryable()
            || !self.config.retryable_kinds.contains(&error.kind())
        {
            return false;
        }

        let mut ledger = self.ledger();
        let attempts = ledger.entry(key.to_string()).or_insert(0);
        let allowed = *attempts < self.config.max_retries;
        *attempts = attempts.saturating_add(1);

        tracing::debug!(
            key,
            kind = %error.kind(),
            attempts = *attempts,
            max_retries = self.config.max_retries,
            allowed,
            "retry check"
        );
        allowed
    }

    pub fn reset_retry_attempts(&self, key: &str) {
        self.ledger().remove(key);
    }

    /// Current attempt count for `key` (0 if untracked).
    pub fn attempts(&self, key: &str) -> u32 {
        self.ledger().get(key).copied().unwrap_or(0)
    }

    pub fn tracked_keys(&self) -> Vec<String> {
        self.ledger().keys().cloned().collect()
    }

    pub fn clear_all(&self) {
        self.ledger().clear();
    }

    pub fn delay_for_attempt(&self, attempts: u32) -> Duration {
        self.config.delay_for_attempt(attempts)
    }

    /// Record an attempt and return the delay owed before running it.
    fn consume_attempt(&self, key: &str) -> (u32, Duration) {
        let mut ledger = self.ledger();
        let attempts = ledger.entry(key.to_string()).or_insert(0);
        let before = *attempts;
        *attempts = attempts.saturating_add(1);
        (before, self.config.delay_for_attempt(before))
    }

    /// Wait out the backoff for `key`, then run `operation`.
    ///
    /// The operation's output (including any `Err`) is returned unchanged.
    pub async fn execute_retry<F, Fut, T>(
        &self,
        key: &str,
        error: &StructuredError,
        operation: F,
    ) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let (attempt, delay) = self.consume_attempt(key);
        tracing::warn!(
            key,
            kind = %error.kind(),
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "Retrying after error"
        );
        tokio::time::sleep(delay).await;
        operation().await
    }

    /// Like [`execute_retry`](Self::execute_retry), but gives up without running
    /// the operation if `cancel` fires during the backoff.
    pub async fn execute_retry_with_cancel<F, Fut, T>(
        &self,
        key: &str,
        error: &StructuredError,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T, ReloginError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let (attempt, delay) = self.consume_attempt(key);
        tracing::warn!(
            key,
            kind = %error.kind(),
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "Retrying after error"
        );
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(key, "retry cancelled during backoff");
                Err(ReloginError::Cancelled)
            }
            _ = tokio::time::sleep(delay) => Ok(operation().await),
        }
    }

    /// Run `operation`, retrying while the coordinator allows it.
    ///
    /// `to_error` classifies each failure. On success the key is reset; on a
    /// non-retryable failure or exhaustion the last error is returned.
    pub async fn run<F, Fut, T, E>(
        &self,
        key: &str,
        mut operation: F,
        to_error: impl Fn(&E) -> StructuredError,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut result = operation().await;
        loop {
            let failure = match result {
                Ok(value) => {
                    self.reset_retry_attempts(key);
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            let error = to_error(&failure);
            if !self.should_retry(&error, key) {
                return Err(failure);
            }
            // `should_retry` consumed an attempt; the backoff uses the count before it.
            let attempts = self.attempts(key).saturating_sub(1);
            let delay = self.config.delay_for_attempt(attempts);
            tracing::warn!(
                key,
                kind = %error.kind(),
                attempt = attempts + 1,
                delay_ms = delay.as_millis() as u64,
                "Retrying after error"
            );
            tokio::time::sleep(delay).await;
            result = operation().await;
        }
    }
}
