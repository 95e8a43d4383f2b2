//! Bounded retry with linear backoff.
//!
//! [`RetryPolicy`] runs an async operation until a success predicate accepts
//! its result or the attempt budget is spent. Exhaustion is not an error: the
//! last result is handed back as-is. Only cancellation produces an `Err`.

use std::future::Future;
use std::time::Duration;

use durasync_types::models::BackendReliabilityConfig;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ensure_not_cancelled, CoreError, CoreResult};

/// Snapshot handed to the retry hook after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    /// 1-based number of the attempt that just failed.
    pub attempt: u32,
    pub max_attempts: u32,
    /// Wait before the next attempt starts.
    pub next_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    enabled: bool,
    max_attempts: u32,
    initial_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&BackendReliabilityConfig::default())
    }
}

impl RetryPolicy {
    /// `max_attempts < 1` clamps to 1, negative delays clamp to 0.
    pub fn new(enabled: bool, max_attempts: i32, initial_delay_ms: i64) -> Self {
        Self {
            enabled,
            max_attempts: u32::try_from(max_attempts.max(1)).unwrap_or(1),
            initial_delay_ms: u64::try_from(initial_delay_ms.max(0)).unwrap_or(0),
        }
    }

    pub fn from_config(config: &BackendReliabilityConfig) -> Self {
        Self {
            enabled: config.enable_retry,
            max_attempts: config.max_attempts(),
            initial_delay_ms: config.initial_delay_ms(),
        }
    }

    /// Single attempt, no waiting.
    pub fn disabled() -> Self {
        Self::new(false, 1, 0)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn initial_delay_ms(&self) -> u64 {
        self.initial_delay_ms
    }

    /// Attempt budget actually used by [`execute`](Self::execute).
    pub fn effective_max_attempts(&self) -> u32 {
        if self.enabled {
            self.max_attempts
        } else {
            1
        }
    }

    /// Wait before the 1-based `attempt`: `initial_delay * (attempt - 1)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 || self.initial_delay_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.initial_delay_ms.saturating_mul(u64::from(attempt - 1)))
    }

    pub async fn execute<T, F, Fut, P>(
        &self,
        cancel: &CancellationToken,
        operation: F,
        is_success: P,
    ) -> CoreResult<T>
    where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = T>,
        P: Fn(&T) -> bool,
    {
        self.execute_with_hook(cancel, operation, is_success, |_| {}).await
    }

    /// Like [`execute`](Self::execute), calling `on_retry` after every failed
    /// attempt that will be followed by another one.
    pub async fn execute_with_hook<T, F, Fut, P, R>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
        is_success: P,
        mut on_retry: R,
    ) -> CoreResult<T>
    where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = T>,
        P: Fn(&T) -> bool,
        R: FnMut(RetryAttempt),
    {
        let max_attempts = self.effective_max_attempts();
        let mut attempt: u32 = 1;

        loop {
            ensure_not_cancelled(cancel)?;
            let result = operation(cancel.clone()).await;

            if is_success(&result) || attempt >= max_attempts {
                return Ok(result);
            }

            let next_delay = self.delay_for_attempt(attempt + 1);
            on_retry(RetryAttempt { attempt, max_attempts, next_delay });
            debug!(
                "Retrying after attempt {}/{} in {}ms",
                attempt,
                max_attempts,
                next_delay.as_millis()
            );

            if !next_delay.is_zero() {
                tokio::select! {
                    () = cancel.cancelled() => return Err(CoreError::Cancelled),
                    () = sleep(next_delay) => {},
                }
            }

            attempt += 1;
        }
    }
}
