//! Bounded retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use fdrdict_shared::{FdrError, FetchConfig};

use crate::cancel::CancelToken;

/// How often and how patiently to retry a transient failure.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero means one attempt total.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

/// The last error of an operation that ran out of attempts (or hit a
/// non-retryable error), together with how many attempts were made.
#[derive(Debug)]
pub struct RetryExhausted {
    pub error: FdrError,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_retries: config.max_detail_retries,
            base_delay: config.retry_base_delay,
            multiplier: config.retry_multiplier,
            max_delay: config.retry_max_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based): `base * multiplier^(retry-1)`,
    /// capped at `max_delay`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }

    /// Delay after a failed attempt, honouring a server-provided hint.
    fn delay_after(&self, retry: u32, error: &FdrError) -> Duration {
        match error {
            FdrError::Transport {
                retry_after: Some(hint),
                ..
            } => (*hint).min(self.max_delay),
            _ => self.delay_for_retry(retry),
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out. Cancellation is checked before every attempt and
    /// interrupts a backoff sleep.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancelToken,
        mut op: F,
    ) -> std::result::Result<T, RetryExhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = fdrdict_shared::Result<T>>,
    {
        let mut attempts = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryExhausted {
                    error: FdrError::Cancelled,
                    attempts,
                });
            }

            attempts += 1;
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !error.is_retryable() || attempts >= self.max_attempts() {
                return Err(RetryExhausted { error, attempts });
            }

            let delay = self.delay_after(attempts, &error);
            debug!(attempt = attempts, delay_ms = delay.as_millis() as u64, error = %error, "retrying");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {}
            }
        }
    }
}
